//! `devlink-agent`: a reference device built on `DeviceLink`.
//!
//! Connects to a DevLink server, announces its identity, answers `uptime` and
//! `polls` data requests, and optionally reports its uptime on a timer.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ Cli::parse() + load_config()   -- file values, then CLI/env overrides
//!  └─ ws_device_link()               -- WebSocket-backed DeviceLink
//!  └─ link.initialize(type, name)
//!  └─ loop every poll_interval
//!       ├─ link.poll()               -- liveness check + inbound dispatch
//!       ├─ answer queued requests
//!       └─ periodic uptime report
//!  └─ link.shutdown()                -- on Ctrl-C
//! ```
//!
//! # Configuration
//!
//! | Flag                   | Env var                      | Default                   |
//! |------------------------|------------------------------|---------------------------|
//! | `--config`             | `DEVLINK_CONFIG`             | platform `agent.toml`     |
//! | `--url`                | `DEVLINK_URL`                | `ws://127.0.0.1:8080`     |
//! | `--device-type`        | `DEVLINK_DEVICE_TYPE`        | `generic`                 |
//! | `--name`               | `DEVLINK_DEVICE_NAME`        | `<type>-<random>`         |
//! | `--debug`              | `DEVLINK_DEBUG`              | off                       |
//! | `--poll-interval-ms`   | `DEVLINK_POLL_INTERVAL_MS`   | `50`                      |
//! | `--report-interval-ms` | `DEVLINK_REPORT_INTERVAL_MS` | `0` (no periodic report)  |
//!
//! `--save-config` writes the merged configuration back to the config file
//! and exits.

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use devlink_client::application::answer_requests::{
    answer_request, parse_request, AgentReadings, READING_UPTIME,
};
use devlink_client::infrastructure::storage::config::{
    config_file_path, load_config_from, save_config_to, AgentConfig,
};
use devlink_client::infrastructure::transport::{ws_device_link, WsDeviceLink};
use devlink_core::{DataRequest, LinkEvent};

// ── CLI ───────────────────────────────────────────────────────────────────────

/// Command-line arguments.  Every value left unset falls back to the config
/// file.
#[derive(Debug, Parser)]
#[command(
    name = "devlink-agent",
    about = "Reference DevLink device: announces itself and answers data requests",
    version
)]
struct Cli {
    /// Path of the TOML config file.
    #[arg(long, env = "DEVLINK_CONFIG")]
    config: Option<PathBuf>,

    /// Server URL (`ws://` or `wss://`).
    #[arg(long, env = "DEVLINK_URL")]
    url: Option<String>,

    #[arg(long, env = "DEVLINK_DEVICE_TYPE")]
    device_type: Option<String>,

    #[arg(long, env = "DEVLINK_DEVICE_NAME")]
    name: Option<String>,

    /// Log every frame at `info` instead of `debug`.
    #[arg(long, env = "DEVLINK_DEBUG")]
    debug: bool,

    #[arg(long, env = "DEVLINK_POLL_INTERVAL_MS")]
    poll_interval_ms: Option<u64>,

    /// Send an unsolicited uptime report this often; `0` disables it.
    #[arg(long, env = "DEVLINK_REPORT_INTERVAL_MS")]
    report_interval_ms: Option<u64>,

    /// Write the merged configuration to the config file and exit.
    #[arg(long)]
    save_config: bool,
}

impl Cli {
    /// Resolves the config file this run reads (and `--save-config` writes).
    fn config_path(&self) -> anyhow::Result<PathBuf> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => config_file_path().context("no --config given"),
        }
    }

    /// Applies the CLI overrides on top of `base` and validates the result.
    fn into_agent_config(self, mut base: AgentConfig) -> anyhow::Result<AgentConfig> {
        if let Some(url) = self.url {
            base.link.url = url;
        }
        if let Some(device_type) = self.device_type {
            base.device.device_type = device_type;
        }
        if let Some(name) = self.name {
            base.device.name = name;
        }
        if self.debug {
            base.link.debug = true;
        }
        if let Some(ms) = self.poll_interval_ms {
            base.agent.poll_interval_ms = ms;
        }
        if let Some(ms) = self.report_interval_ms {
            base.agent.report_interval_ms = ms;
        }

        if !(base.link.url.starts_with("ws://") || base.link.url.starts_with("wss://")) {
            bail!("server URL must start with ws:// or wss://, got '{}'", base.link.url);
        }
        if base.device.device_type.is_empty() {
            bail!("device type must not be empty");
        }
        if base.agent.poll_interval_ms == 0 {
            bail!("poll interval must be at least 1 ms");
        }
        if base.device.name.is_empty() {
            base.device.name = generated_name(&base.device.device_type);
        }
        Ok(base)
    }
}

/// `<type>-<first 8 hex digits of a random UUID>`.
fn generated_name(device_type: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{device_type}-{}", &id[..8])
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config_path()?;
    let save = cli.save_config;
    let file_config = load_config_from(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let config = cli.into_agent_config(file_config)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.agent.log_level)),
        )
        .init();

    if save {
        save_config_to(&config_path, &config)
            .with_context(|| format!("saving {}", config_path.display()))?;
        info!("configuration written to {}", config_path.display());
        return Ok(());
    }

    info!(
        "devlink-agent starting: {}/{} -> {}",
        config.device.device_type, config.device.name, config.link.url
    );

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C; shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => tracing::error!("failed to listen for Ctrl+C signal: {e}"),
        }
    });

    let link = ws_device_link(
        config.link.url.clone(),
        config.link.debug,
        config.to_link_config(),
    );
    run_agent(link, &config, &running).await;

    info!("devlink-agent stopped");
    Ok(())
}

/// Drives the link until `running` is cleared, then shuts it down.
async fn run_agent(mut link: WsDeviceLink, config: &AgentConfig, running: &AtomicBool) {
    let (request_tx, mut request_rx) = mpsc::unbounded_channel::<DataRequest>();
    link.on_message(move |message| {
        if let Some(request) = parse_request(message) {
            if request_tx.send(request).is_err() {
                debug!("request queue closed; dropping request");
            }
        }
    });
    link.on_event(|event| {
        if *event == LinkEvent::ConnectionClosed {
            warn!("server connection lost; will reconnect at the next liveness check");
        }
    });

    link.initialize(&config.device.device_type, &config.device.name)
        .await;

    let mut readings = AgentReadings::new();
    let report_every = (config.agent.report_interval_ms > 0)
        .then(|| Duration::from_millis(config.agent.report_interval_ms));
    let mut last_report = Instant::now();

    let mut ticker = tokio::time::interval(Duration::from_millis(config.agent.poll_interval_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    while running.load(Ordering::Relaxed) {
        ticker.tick().await;

        link.poll().await;
        readings.record_poll();

        while let Ok(request) = request_rx.try_recv() {
            if let Err(e) = answer_request(&mut link, &readings, &request).await {
                warn!("could not answer {:?} request: {e}", request.data_type);
            }
        }

        if let Some(period) = report_every {
            if last_report.elapsed() >= period {
                last_report = Instant::now();
                report_uptime(&mut link, &readings).await;
            }
        }
    }

    link.shutdown().await;
    info!("final link status: {:?}", link.status());
}

async fn report_uptime(link: &mut WsDeviceLink, readings: &AgentReadings) {
    if let Err(e) = link
        .send_response(readings.uptime_secs(), READING_UPTIME, "")
        .await
    {
        debug!("uptime report not sent: {e}");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
