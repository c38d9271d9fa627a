//! Daikin Smart AC bridge
//!
//! Main entry point: exposes the air conditioners of a Daikin Smart AC
//! account to Home Assistant over MQTT.

use anyhow::{Context, Result};
use daikinbr_config::Settings;
use daikinbr_discovery::{MdnsDiscoverer, DISCOVERY_TIMEOUT};
use daikinbr_mqtt::MqttBus;
use daikinbr_server::{
    prepare_config, startup_hint, HttpDeviceFactory, IotalabsConnector, Orchestrator,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting Daikin Smart AC bridge");

    let settings = Settings::from_env();
    let config = prepare_config(
        &settings,
        &IotalabsConnector,
        &MdnsDiscoverer::new(),
        DISCOVERY_TIMEOUT,
    )
    .await
    .with_context(startup_hint)?;

    let bus = MqttBus::connect(&config.mqtt)
        .await
        .context("failed to connect to the MQTT broker")?;

    let mut orchestrator = Orchestrator::new(Arc::new(bus), Arc::new(HttpDeviceFactory), &config);
    orchestrator.start(&config.devices).await;

    info!("Bridge is running");

    wait_for_signal().await?;
    info!("signal caught - exiting");

    orchestrator.shutdown().await;
    info!("shutdown complete");

    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
