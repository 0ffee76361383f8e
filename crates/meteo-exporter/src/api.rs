//! Open-Meteo forecast client and snapshot extraction.
//!
//! Fetches one forecast per target per tick and reduces it to the single
//! observation published to the metrics registry: the current temperature
//! and windspeed plus the hourly fields aligned to the current-weather
//! timestamp.

use crate::align;
use crate::config::{ExporterConfig, Target};
use chrono::NaiveDateTime;
use serde::Deserialize;

// ── Constants ───────────────────────────────────────────────────────

/// Hourly variables requested from the forecast endpoint.
const HOURLY_FIELDS: &str =
    "relativehumidity_2m,pressure_msl,cloudcover,visibility,uv_index,precipitation";

// ── Errors ──────────────────────────────────────────────────────────

/// Errors from a single forecast fetch.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Incomplete forecast: {0}")]
    Incomplete(String),
}

pub type Result<T> = std::result::Result<T, ApiError>;

// ── Wire format ─────────────────────────────────────────────────────

/// Forecast response from the Open-Meteo API.
///
/// Only the fields the exporter publishes are decoded; anything else in
/// the response body is ignored. A response missing one of these keys
/// (or carrying the wrong type) fails the whole fetch.
#[derive(Debug, Clone, Deserialize)]
pub struct Forecast {
    pub current_weather: CurrentWeather,
    pub hourly: HourlySeries,
}

/// The `current_weather` block: instantaneous conditions plus the
/// timestamp they were observed at.
#[derive(Debug, Clone, Deserialize)]
pub struct CurrentWeather {
    pub temperature: f64,
    pub windspeed: f64,
    pub time: String,
}

/// The `hourly` block: parallel arrays indexed by the `time` series.
///
/// Each variable array is bounds-checked independently when extracting
/// an observation; the API occasionally truncates individual series.
#[derive(Debug, Clone, Deserialize)]
pub struct HourlySeries {
    pub time: Vec<String>,
    pub relativehumidity_2m: Vec<f64>,
    pub pressure_msl: Vec<f64>,
    pub cloudcover: Vec<f64>,
    pub visibility: Vec<f64>,
    pub uv_index: Vec<f64>,
    pub precipitation: Vec<f64>,
}

// ── Observation ─────────────────────────────────────────────────────

/// One fully-extracted weather snapshot, ready to publish.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// °C, from `current_weather`.
    pub temperature: f64,
    /// km/h, from `current_weather`.
    pub windspeed: f64,
    /// %, hourly series.
    pub humidity: f64,
    /// hPa (mean sea level), hourly series.
    pub pressure: f64,
    /// %, hourly series.
    pub cloud_cover: f64,
    /// km, converted from the API's metres.
    pub visibility_km: f64,
    /// UV index, hourly series.
    pub uv_index: f64,
    /// mm, hourly series.
    pub precipitation: f64,
}

impl Forecast {
    /// Extract the observation for the current-weather timestamp.
    ///
    /// The hourly index is resolved once: an exact timestamp match wins,
    /// otherwise the entry nearest in absolute time is used. All six
    /// hourly fields are read at that same index so the observation is
    /// internally consistent.
    pub fn observation(&self) -> Result<Observation> {
        let hourly = &self.hourly;
        if hourly.time.is_empty() {
            return Err(ApiError::Incomplete("hourly time series is empty".into()));
        }

        let current_time = parse_time(&self.current_weather.time)?;
        let times = hourly
            .time
            .iter()
            .map(|raw| parse_time(raw))
            .collect::<Result<Vec<NaiveDateTime>>>()?;

        let idx = match times.iter().position(|t| *t == current_time) {
            Some(exact) => exact,
            None => align::nearest_index(&times, current_time),
        };

        Ok(Observation {
            temperature: self.current_weather.temperature,
            windspeed: self.current_weather.windspeed,
            humidity: series_at(&hourly.relativehumidity_2m, idx, "relativehumidity_2m")?,
            pressure: series_at(&hourly.pressure_msl, idx, "pressure_msl")?,
            cloud_cover: series_at(&hourly.cloudcover, idx, "cloudcover")?,
            visibility_km: series_at(&hourly.visibility, idx, "visibility")? / 1000.0,
            uv_index: series_at(&hourly.uv_index, idx, "uv_index")?,
            precipitation: series_at(&hourly.precipitation, idx, "precipitation")?,
        })
    }
}

/// Read one hourly variable at `idx`, failing if that series is shorter
/// than the time axis.
fn series_at(series: &[f64], idx: usize, name: &str) -> Result<f64> {
    series
        .get(idx)
        .copied()
        .ok_or_else(|| ApiError::Incomplete(format!("no {} entry at index {}", name, idx)))
}

/// Parse an Open-Meteo timestamp (zone-less local ISO-8601).
///
/// The API emits minute resolution ("2024-01-01T10:45"); second
/// resolution is accepted too.
fn parse_time(raw: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .map_err(|_| ApiError::InvalidTimestamp(raw.to_string()))
}

// ── WeatherSource trait ─────────────────────────────────────────────

/// Abstraction over the upstream forecast service.
///
/// The poller calls this trait instead of `OpenMeteoClient` directly,
/// making tick behavior testable with scripted sources.
pub trait WeatherSource: Send + Sync + 'static {
    fn fetch_forecast(
        &self,
        target: &Target,
    ) -> impl std::future::Future<Output = Result<Forecast>> + Send;
}

// ── Client ──────────────────────────────────────────────────────────

/// Open-Meteo HTTP client with a bounded per-request timeout.
#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    client: reqwest::Client,
    base_url: String,
    timezone: String,
}

impl OpenMeteoClient {
    /// Build a client from the exporter configuration.
    pub fn new(config: &ExporterConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.fetch_timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_url.clone(),
            timezone: config.timezone.clone(),
        })
    }
}

impl WeatherSource for OpenMeteoClient {
    async fn fetch_forecast(&self, target: &Target) -> Result<Forecast> {
        let query = [
            ("latitude", target.latitude.to_string()),
            ("longitude", target.longitude.to_string()),
            ("current_weather", "true".to_string()),
            ("hourly", HOURLY_FIELDS.to_string()),
            ("timezone", self.timezone.clone()),
        ];

        let response = self
            .client
            .get(&self.base_url)
            .query(&query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(ApiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let forecast: Forecast = response.json().await?;
        Ok(forecast)
    }
}

// ── Tests ───────────────────────────────────────────────────────────
