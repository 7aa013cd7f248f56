mod app;
mod sim;

use anyhow::Result;
use std::fs::{self, OpenOptions};

use fluidport_core::config::{self, AppConfig};
use tokio::sync::mpsc;
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;

    let config_path = config::ensure_default_config()?;
    let config = AppConfig::load()?;
    tracing::info!(path = %config_path.display(), tick_rate_ms = config.tick_rate_ms, "configuration loaded");

    let (command_tx, command_rx) = mpsc::channel(32);
    let (frame_tx, frame_rx) = mpsc::channel(64);
    let simulation = sim::Simulation::new(config.clone());
    let sim_task = tokio::spawn(async move {
        if let Err(err) = simulation.run(command_rx, frame_tx).await {
            tracing::error!("Simulation task error: {err}");
        }
    });

    let mut app = app::PortApp::new(&config, command_tx);
    app.attach_frames(frame_rx);
    let result = app.run().await;

    drop(app);
    let _ = sim_task.await;
    result
}

fn init_logging() -> Result<()> {
    let log_dir = std::env::current_dir()?.join("logs");
    fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join("fluidport.log");
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .compact()
        .with_writer(std::sync::Mutex::new(log_file));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .init();

    Ok(())
}
