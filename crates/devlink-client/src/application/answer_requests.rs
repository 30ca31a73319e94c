//! Use case: answer the server's data requests.
//!
//! The bundled agent understands requests of the form
//! `{"dataType": "<reading>", "id": "<correlation id>"}` and answers each with
//! a `recieveData` envelope carrying the same `dataType` and `id`.
//!
//! | `dataType` | Answer                                         |
//! |------------|------------------------------------------------|
//! | `uptime`   | Whole seconds since the agent started          |
//! | `polls`    | Number of `poll()` calls made so far           |
//!
//! Unknown data types are logged and left unanswered.

use devlink_core::{decode_data_request, DataRequest, InboundMessage, ResponseData};
use tracing::{debug, warn};

use crate::application::clock::{Clock, MonotonicClock};
use crate::application::device_link::{DeviceLink, LinkError};
use crate::application::transport::LinkTransport;

pub const READING_UPTIME: &str = "uptime";
pub const READING_POLLS: &str = "polls";

/// The values the agent can report about itself.
#[derive(Debug, Clone)]
pub struct AgentReadings<C = MonotonicClock> {
    clock: C,
    polls: u64,
}

impl AgentReadings<MonotonicClock> {
    /// Starts counting uptime from now.
    pub fn new() -> Self {
        Self::with_clock(MonotonicClock::new())
    }
}

impl Default for AgentReadings<MonotonicClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> AgentReadings<C> {
    /// Uses `clock` as the uptime source; its epoch is the agent's start.
    pub fn with_clock(clock: C) -> Self {
        Self { clock, polls: 0 }
    }

    pub fn record_poll(&mut self) {
        self.polls += 1;
    }

    pub fn polls(&self) -> u64 {
        self.polls
    }

    pub fn uptime_secs(&self) -> u64 {
        self.clock.now_ms() / 1000
    }

    /// Returns the current value of `data_type`, or `None` if unknown.
    pub fn reading(&self, data_type: &str) -> Option<ResponseData> {
        match data_type {
            READING_UPTIME => Some(self.uptime_secs().into()),
            READING_POLLS => Some(self.polls.into()),
            _ => None,
        }
    }
}

/// Extracts a [`DataRequest`] from an inbound message.
///
/// Binary messages and text that is not a request are logged and ignored.
pub fn parse_request(message: &InboundMessage) -> Option<DataRequest> {
    let Some(text) = message.as_text() else {
        debug!("ignoring binary message ({} bytes)", message.data().len());
        return None;
    };
    match decode_data_request(text) {
        Ok(request) => Some(request),
        Err(e) => {
            warn!("ignoring inbound text that is not a data request: {e}");
            None
        }
    }
}

/// Answers one request over `link`.
///
/// Returns `Ok(false)` when the requested data type is unknown and nothing was
/// sent.
///
/// # Errors
///
/// Propagates the [`LinkError`] from [`DeviceLink::send_response`].
pub async fn answer_request<T, C, R>(
    link: &mut DeviceLink<T, C>,
    readings: &AgentReadings<R>,
    request: &DataRequest,
) -> Result<bool, LinkError>
where
    T: LinkTransport,
    C: Clock,
    R: Clock,
{
    let Some(value) = readings.reading(&request.data_type) else {
        warn!("no reading named {:?}; request left unanswered", request.data_type);
        return Ok(false);
    };

    let id = request.id.as_deref().unwrap_or("");
    link.send_response(value, &request.data_type, id).await?;
    Ok(true)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::clock::ManualClock;
    use crate::application::device_link::LinkConfig;
    use crate::infrastructure::transport::mock::MockTransport;

    fn readings_at(ms: u64) -> AgentReadings<ManualClock> {
        let clock = ManualClock::new();
        clock.set(ms);
        AgentReadings::with_clock(clock)
    }

    #[test]
    fn test_uptime_is_whole_seconds() {
        let readings = readings_at(12_999);
        assert_eq!(readings.reading("uptime"), Some(ResponseData::Integer(12)));
    }

    #[test]
    fn test_polls_counts_recorded_polls() {
        let mut readings = readings_at(0);
        readings.record_poll();
        readings.record_poll();
        assert_eq!(readings.reading("polls"), Some(ResponseData::Integer(2)));
    }

    #[test]
    fn test_unknown_reading_is_none() {
        assert_eq!(readings_at(0).reading("humidity"), None);
    }

    #[test]
    fn test_parse_request_accepts_request_text() {
        let msg = InboundMessage::Text(r#"{"dataType":"uptime","id":"q1"}"#.to_string());
        let request = parse_request(&msg).expect("request");
        assert_eq!(request.data_type, "uptime");
        assert_eq!(request.id.as_deref(), Some("q1"));
    }

    #[test]
    fn test_parse_request_ignores_binary_and_garbage() {
        assert!(parse_request(&InboundMessage::Binary(vec![0x7b])).is_none());
        assert!(parse_request(&InboundMessage::Text("hello".to_string())).is_none());
    }

    #[tokio::test]
    async fn test_answer_request_echoes_data_type_and_id() {
        // Arrange
        let mut link = DeviceLink::with_parts(
            "ws://x",
            false,
            LinkConfig::default(),
            MockTransport::new(),
            ManualClock::new(),
        );
        link.initialize("agent", "a1").await;
        let readings = readings_at(65_000);
        let request = DataRequest {
            data_type: "uptime".to_string(),
            id: Some("q9".to_string()),
        };

        // Act
        let answered = answer_request(&mut link, &readings, &request).await.unwrap();

        // Assert
        assert!(answered);
        assert_eq!(
            link.transport().sent.last().map(String::as_str),
            Some(r#"{"action":"recieveData","dataType":"uptime","data":65,"id":"q9"}"#)
        );
    }

    #[tokio::test]
    async fn test_answer_request_for_unknown_type_sends_nothing() {
        let mut link = DeviceLink::with_parts(
            "ws://x",
            false,
            LinkConfig::default(),
            MockTransport::new(),
            ManualClock::new(),
        );
        link.initialize("agent", "a1").await;
        let request = DataRequest {
            data_type: "voltage".to_string(),
            id: None,
        };

        let answered = answer_request(&mut link, &readings_at(0), &request)
            .await
            .unwrap();

        assert!(!answered);
        assert_eq!(link.transport().sent.len(), 1);
    }
}
