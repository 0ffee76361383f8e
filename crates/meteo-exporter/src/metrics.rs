//! Prometheus registry facade for the weather gauges.
//!
//! Owns the registry and every metric family the exporter publishes:
//! eight per-city gauges labeled `{city, country}`, the unlabeled
//! `weather_api_status` health gauge, and a constant
//! `weather_exporter_info` record. The registry is injected into the
//! HTTP layer rather than living in a global, so tests can build as
//! many isolated instances as they need.

use crate::api::Observation;
use crate::config::Target;
use prometheus::{Gauge, GaugeVec, IntGauge, Opts, Registry, TextEncoder};

/// Label dimensions shared by all per-city gauges.
const TARGET_LABELS: &[&str] = &["city", "country"];

/// Data source advertised by the info record.
const SOURCES: &str = "open-meteo";

/// All gauge families published by the exporter.
pub struct WeatherMetrics {
    registry: Registry,
    temperature: GaugeVec,
    windspeed: GaugeVec,
    humidity: GaugeVec,
    pressure: GaugeVec,
    cloud_cover: GaugeVec,
    visibility: GaugeVec,
    uv_index: GaugeVec,
    precipitation: GaugeVec,
    api_status: IntGauge,
}

impl WeatherMetrics {
    /// Create a fresh registry with every family registered.
    ///
    /// The info record is set to 1 here and never touched again; all
    /// other gauges hold no samples until the first successful poll.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let temperature = target_gauge(
            &registry,
            "weather_temperature_celsius",
            "Current temperature in Celsius",
        )?;
        let windspeed = target_gauge(
            &registry,
            "weather_windspeed_kmh",
            "Current wind speed in km/h",
        )?;
        let humidity = target_gauge(
            &registry,
            "weather_humidity_percent",
            "Current relative humidity in percent",
        )?;
        let pressure = target_gauge(
            &registry,
            "weather_pressure_hpa",
            "Current mean sea level pressure in hPa",
        )?;
        let cloud_cover = target_gauge(
            &registry,
            "weather_cloudcover_percent",
            "Current cloud cover in percent",
        )?;
        let visibility = target_gauge(
            &registry,
            "weather_visibility_km",
            "Current visibility in km",
        )?;
        let uv_index = target_gauge(&registry, "weather_uv_index", "Current UV index")?;
        let precipitation = target_gauge(
            &registry,
            "weather_precipitation_mm",
            "Current precipitation in mm",
        )?;

        let api_status = IntGauge::new(
            "weather_api_status",
            "Weather API status (1 = OK, 0 = error)",
        )?;
        registry.register(Box::new(api_status.clone()))?;

        let info = Gauge::with_opts(
            Opts::new("weather_exporter_info", "Exporter build metadata")
                .const_label("version", env!("CARGO_PKG_VERSION"))
                .const_label("author", env!("CARGO_PKG_AUTHORS"))
                .const_label("sources", SOURCES),
        )?;
        info.set(1.0);
        registry.register(Box::new(info))?;

        Ok(Self {
            registry,
            temperature,
            windspeed,
            humidity,
            pressure,
            cloud_cover,
            visibility,
            uv_index,
            precipitation,
            api_status,
        })
    }

    /// Publish one observation under the target's `{city, country}` labels.
    ///
    /// Re-recording the same target overwrites the previous sample, so
    /// repeated polls with unchanged data are idempotent.
    pub fn record(&self, target: &Target, observation: &Observation) {
        let labels = [target.name.as_str(), target.country.as_str()];
        self.temperature
            .with_label_values(&labels)
            .set(observation.temperature);
        self.windspeed
            .with_label_values(&labels)
            .set(observation.windspeed);
        self.humidity
            .with_label_values(&labels)
            .set(observation.humidity);
        self.pressure
            .with_label_values(&labels)
            .set(observation.pressure);
        self.cloud_cover
            .with_label_values(&labels)
            .set(observation.cloud_cover);
        self.visibility
            .with_label_values(&labels)
            .set(observation.visibility_km);
        self.uv_index
            .with_label_values(&labels)
            .set(observation.uv_index);
        self.precipitation
            .with_label_values(&labels)
            .set(observation.precipitation);
    }

    /// Set the health gauge: 1 when the last cycle reached the API for
    /// at least one target, 0 otherwise.
    pub fn set_api_status(&self, up: bool) {
        self.api_status.set(if up { 1 } else { 0 });
    }

    /// Render the registry in the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = String::new();
        let encoder = TextEncoder::new();
        encoder.encode_utf8(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }

    /// The underlying registry (read access for tests and handlers).
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

/// Register one `{city, country}`-labeled gauge family.
fn target_gauge(registry: &Registry, name: &str, help: &str) -> Result<GaugeVec, prometheus::Error> {
    let gauge = GaugeVec::new(Opts::new(name, help), TARGET_LABELS)?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}
