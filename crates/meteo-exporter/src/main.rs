//! Weather telemetry exporter.
//!
//! Polls the Open-Meteo forecast API for a fixed set of cities and
//! serves the readings as Prometheus gauges on an HTTP scrape endpoint.

use argh::FromArgs;
use meteo_exporter::api::OpenMeteoClient;
use meteo_exporter::config::ExporterConfig;
use meteo_exporter::http_server::run_http_server;
use meteo_exporter::metrics::WeatherMetrics;
use meteo_exporter::poller;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(FromArgs)]
/// Prometheus exporter for Open-Meteo weather telemetry
struct Args {
    /// path to the configuration file (optional, uses built-in defaults)
    #[argh(option, short = 'c')]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    let env = env_logger::Env::default().default_filter_or("info");
    env_logger::init_from_env(env);

    let args: Args = argh::from_env();

    // Load configuration (or use defaults)
    let config = if let Some(config_path) = &args.config {
        match ExporterConfig::from_file(config_path) {
            Ok(c) => c,
            Err(e) => {
                log::error!("Failed to load config from '{}': {}", config_path, e);
                std::process::exit(1);
            }
        }
    } else {
        log::info!("No config file specified, using built-in defaults");
        ExporterConfig::default()
    };

    log::info!(
        "Polling {} targets: {}",
        config.targets.len(),
        config
            .targets
            .iter()
            .map(|t| t.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    // Create shutdown channel
    let (shutdown_tx, shutdown_rx) = watch::channel(());

    // Set up Ctrl+C handler
    ctrlc::set_handler({
        let shutdown_tx = shutdown_tx.clone();
        move || {
            log::info!("Received Ctrl+C, shutting down gracefully...");
            shutdown_tx.send(()).ok();
        }
    })?;

    // Registry shared between the poll loop and the scrape endpoint
    let metrics = Arc::new(WeatherMetrics::new()?);
    let client = OpenMeteoClient::new(&config)?;

    // Serve scrapes from their own task so they never wait on a poll cycle
    let server_metrics = metrics.clone();
    let port = config.port;
    let server_task = tokio::spawn(async move {
        if let Err(e) = run_http_server(server_metrics, port).await {
            log::error!("HTTP server error: {}", e);
        }
    });

    log::info!("Exporter running on port {}. Press Ctrl+C to exit.", port);

    // Run the poll loop (blocks until shutdown)
    poller::run(
        &client,
        &metrics,
        &config.targets,
        config.poll_interval(),
        shutdown_rx,
    )
    .await;

    // Stop serving scrapes
    server_task.abort();

    log::info!("Exporter stopped.");

    Ok(())
}
