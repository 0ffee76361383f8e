//! Prometheus exporter for Open-Meteo weather telemetry.
//!
//! Polls the Open-Meteo forecast API for a configured set of cities and
//! publishes per-city gauges:
//! - Current temperature and wind speed
//! - Hourly humidity, pressure, cloud cover, visibility, UV index and
//!   precipitation, aligned to the current-weather timestamp
//! - An API health gauge and a static exporter info record
//!
//! The poll loop and the scrape endpoint run as independent tasks over
//! a shared registry, so scrapes never block on upstream fetches.

pub mod align;
pub mod api;
pub mod config;
pub mod http_server;
pub mod metrics;
pub mod poller;

pub use api::{ApiError, Forecast, Observation, OpenMeteoClient, WeatherSource};
pub use config::{ConfigError, ExporterConfig, Target};
pub use metrics::WeatherMetrics;
pub use poller::TickSummary;
