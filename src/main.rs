use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;

use uplink::{api, Engine, MonitorConfig, Reporter};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_ansi(true)
        .init();

    let config_path = "config.json";
    let config_content = std::fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read {}", config_path))?;
    let config: MonitorConfig =
        serde_json::from_str(&config_content).with_context(|| "Failed to parse config")?;

    let target = config.target()?;
    let interval = Duration::from_secs(config.check_interval);

    let reporter = Reporter::new(config.event_buffer);
    let mut events = reporter.subscribe();
    let engine = Arc::new(Engine::new(config.clone(), reporter));

    let api_port = config.api_port;
    let engine_for_api = Arc::clone(&engine);
    tokio::spawn(async move {
        api::start_server(api_port, engine_for_api).await;
    });

    // Stand-in for a UI listener: mirror the status feed into the log.
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            info!("{}", event.message);
        }
    });

    engine.start(target, interval).await?;

    signal::ctrl_c().await?;
    info!("Shutdown signal received. Closing uplink engine...");
    engine.stop().await;

    Ok(())
}
