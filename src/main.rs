use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Arg, Command};
use harvester_config::AppConfig;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod app;
mod shutdown;

use app::Application;
use shutdown::ShutdownManager;

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("harvester")
        .version("1.0.0")
        .about("Channel collection scheduler")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Path to the TOML configuration file"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level")
                .value_parser(["trace", "debug", "info", "warn", "error"]),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("Log output format")
                .value_parser(["json", "pretty"]),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config");

    let config = AppConfig::load(config_path.map(String::as_str))
        .context("failed to load configuration")?;

    // CLI flags override the file
    let log_level = matches
        .get_one::<String>("log-level")
        .unwrap_or(&config.logging.level);
    let log_format = matches
        .get_one::<String>("log-format")
        .unwrap_or(&config.logging.format);

    init_logging(log_level, log_format)?;

    info!("starting harvester scheduler");
    if let Some(path) = config_path {
        info!(config = %path, "configuration loaded");
    }

    PrometheusBuilder::new()
        .install()
        .context("failed to install the Prometheus metrics exporter")?;

    let app = Application::new(config).await?;

    let shutdown_manager = ShutdownManager::new();
    let shutdown_rx = shutdown_manager.subscribe().await;

    let app_handle = tokio::spawn(async move {
        if let Err(e) = app.run(shutdown_rx).await {
            error!("scheduler exited with error: {e}");
        }
    });

    wait_for_shutdown_signal().await;
    info!("shutdown signal received");

    shutdown_manager.shutdown().await;

    match tokio::time::timeout(Duration::from_secs(30), app_handle).await {
        Ok(result) => {
            if let Err(e) = result {
                error!("scheduler task failed during shutdown: {e}");
            } else {
                info!("scheduler stopped cleanly");
            }
        }
        Err(_) => {
            warn!("shutdown timed out, exiting anyway");
        }
    }

    Ok(())
}

fn init_logging(log_level: &str, log_format: &str) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match log_format {
        "json" => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
                .context("failed to initialize json logging")?;
        }
        "pretty" => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()
                .context("failed to initialize pretty logging")?;
        }
        _ => {
            return Err(anyhow::anyhow!("unsupported log format: {log_format}"));
        }
    }

    Ok(())
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("received Ctrl+C");
        },
        _ = terminate => {
            info!("received SIGTERM");
        },
    }
}
