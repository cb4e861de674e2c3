//! # iotsimd: IoT simulator daemon
//!
//! Composition root that wires the MQTT adapter into the simulation engine.
//!
//! ## Responsibilities
//! - Parse configuration (CLI args, env vars, config file)
//! - Initialise `tracing` with the configured filter
//! - Resolve the host identity for system-status announcements
//! - Run the engine until Ctrl-C, then shut down gracefully
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer; no simulation logic belongs here.

mod config;
mod host;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use iotsim_adapter_mqtt::MqttBus;
use iotsim_app::devices::HostIdentity;
use iotsim_app::engine::{EngineReport, EngineState, SimulationEngine};
use iotsim_domain::topic;

use crate::config::{Config, DEFAULT_FILTER, Overrides};

/// Simulate a household of IoT devices over MQTT.
#[derive(Debug, Parser)]
#[command(name = "iotsimd", version, about)]
struct Cli {
    /// Broker host (overrides config and `IOTSIM_HOST`).
    #[arg(long)]
    host: Option<String>,

    /// Broker port (overrides config and `IOTSIM_PORT`).
    #[arg(long)]
    port: Option<u16>,

    /// Path to the TOML configuration file.
    #[arg(long, default_value = "iotsim.toml")]
    config: PathBuf,

    /// Seed every random draw for a reproducible run.
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let overrides = Overrides {
        host: cli.host,
        port: cli.port,
        seed: cli.seed,
    };
    let config = Config::load(&cli.config, overrides)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    let filter = EnvFilter::try_new(&config.logging.filter)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let identity = host::identity();
    let port = config.mqtt.broker_port;
    let bus = MqttBus::new(config.mqtt.clone());
    tracing::info!(
        host = %config.mqtt.broker_host,
        port,
        client_id = %bus.client_id(),
        "starting IoT simulator"
    );

    let mut session = bus.watch_state();
    let session_log = tokio::spawn(async move {
        while session.changed().await.is_ok() {
            let current = *session.borrow_and_update();
            tracing::debug!(state = %current, "MQTT session state changed");
        }
    });

    let engine = SimulationEngine::new(bus, config.engine_config(identity.clone()));
    let mut state = engine.watch_state();
    let banner = tokio::spawn(async move {
        if state.wait_for(|s| *s == EngineState::Running).await.is_ok() {
            log_banner(&identity, port);
        }
    });

    let result = engine.run(shutdown_signal()).await;
    banner.abort();
    session_log.abort();
    let report = result.context("simulator stopped")?;
    log_report(&report);
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutting down"),
        Err(err) => tracing::error!(%err, "unable to listen for Ctrl-C, shutting down"),
    }
}

fn log_banner(identity: &HostIdentity, port: u16) {
    tracing::info!(
        hostname = %identity.hostname,
        "simulator running, connect your app to {}:{port}",
        identity.ip
    );
    tracing::info!(topic = topic::CHAT_REPLY, "chat room");
    tracing::info!(filter = "home/+/+", "subscribe to this filter to see every device");
}

fn log_report(report: &EngineReport) {
    for sim in &report.simulators {
        tracing::info!(
            kind = %sim.kind,
            published = sim.published,
            failed = sim.failed,
            commands = sim.commands,
            "simulator stopped"
        );
    }
    tracing::info!(inbound = report.inbound, "simulator shut down");
}
