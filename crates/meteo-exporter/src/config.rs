//! Exporter configuration: polled targets and runtime settings.
//!
//! Configuration is fixed at startup. The built-in defaults poll the
//! five reference cities; a YAML file can override any field:
//!
//! ```yaml
//! port: 8000
//! poll_interval_seconds: 20
//! targets:
//!   - name: Astana
//!     country: Kazakhstan
//!     latitude: 51.1694
//!     longitude: 71.4491
//! ```

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// A city to poll. The `name` doubles as the `city` metric label, so it
/// must be unique across the target list.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Target {
    pub name: String,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Root exporter configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ExporterConfig {
    /// Cities to poll each tick, in publish order.
    #[serde(default = "default_targets")]
    pub targets: Vec<Target>,

    /// Forecast endpoint.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Timezone the hourly series is requested in.
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Listen port for the scrape endpoint.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Seconds between poll cycles.
    #[serde(default = "default_poll_interval_seconds")]
    pub poll_interval_seconds: u64,

    /// Per-request timeout for forecast fetches.
    #[serde(default = "default_fetch_timeout_seconds")]
    pub fetch_timeout_seconds: u64,
}

fn default_targets() -> Vec<Target> {
    let cities = [
        ("Astana", 51.1694, 71.4491),
        ("Almaty", 43.2220, 76.8512),
        ("Karaganda", 49.8047, 73.1094),
        ("Semey", 50.4166, 80.2329),
        ("Shymkent", 42.3000, 69.6000),
    ];
    cities
        .into_iter()
        .map(|(name, latitude, longitude)| Target {
            name: name.to_string(),
            country: "Kazakhstan".to_string(),
            latitude,
            longitude,
        })
        .collect()
}

fn default_api_url() -> String {
    "https://api.open-meteo.com/v1/forecast".to_string()
}

fn default_timezone() -> String {
    "Asia/Almaty".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_poll_interval_seconds() -> u64 {
    20
}

fn default_fetch_timeout_seconds() -> u64 {
    10
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            targets: default_targets(),
            api_url: default_api_url(),
            timezone: default_timezone(),
            port: default_port(),
            poll_interval_seconds: default_poll_interval_seconds(),
            fetch_timeout_seconds: default_fetch_timeout_seconds(),
        }
    }
}

impl ExporterConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the poller cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.targets.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one target is required".to_string(),
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for target in &self.targets {
            if !seen.insert(target.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate target name: {}",
                    target.name
                )));
            }
        }
        if self.poll_interval_seconds == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_seconds must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_seconds)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Invalid config: {0}")]
    Invalid(String),
}
