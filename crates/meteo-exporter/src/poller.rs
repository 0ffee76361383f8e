//! Poll loop: fetch every target each cycle and publish the results.
//!
//! Failures are isolated per target, so one unreachable city never
//! stops the others from updating. The `weather_api_status` gauge
//! summarises each cycle: 1 when at least one target was refreshed,
//! 0 when the whole cycle failed.

use crate::api::{ApiError, WeatherSource};
use crate::config::Target;
use crate::metrics::WeatherMetrics;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// Outcome of one poll cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickSummary {
    pub ok: usize,
    pub failed: usize,
}

impl TickSummary {
    /// True when at least one target was refreshed this cycle.
    pub fn any_succeeded(&self) -> bool {
        self.ok > 0
    }
}

/// Fetch one target and publish its observation.
///
/// Nothing is published unless the whole fetch-and-extract chain
/// succeeds, so a failing target keeps its previous samples.
pub async fn fetch_target<S: WeatherSource>(
    source: &S,
    metrics: &WeatherMetrics,
    target: &Target,
) -> Result<(), ApiError> {
    let forecast = source.fetch_forecast(target).await?;
    let observation = forecast.observation()?;
    metrics.record(target, &observation);
    Ok(())
}

/// Run one poll cycle over every target, in configured order.
///
/// A failed target is logged and skipped; the cycle always runs to the
/// end and finishes by updating the health gauge.
pub async fn tick<S: WeatherSource>(
    source: &S,
    metrics: &WeatherMetrics,
    targets: &[Target],
) -> TickSummary {
    let mut summary = TickSummary::default();

    for target in targets {
        match fetch_target(source, metrics, target).await {
            Ok(()) => {
                summary.ok += 1;
                log::debug!("[Poller] updated {} ({})", target.name, target.country);
            }
            Err(e) => {
                summary.failed += 1;
                log::error!("[Poller] failed to update {}: {}", target.name, e);
            }
        }
    }

    metrics.set_api_status(summary.any_succeeded());
    summary
}

/// Run the poll loop until the shutdown signal fires.
///
/// The first cycle runs immediately so gauges are populated before the
/// first scrape. A cycle that overruns the period delays the next tick
/// instead of bursting to catch up.
pub async fn run<S: WeatherSource>(
    source: &S,
    metrics: &WeatherMetrics,
    targets: &[Target],
    period: Duration,
    mut shutdown: watch::Receiver<()>,
) {
    log::info!(
        "[Poller] starting loop ({}s interval, {} targets)",
        period.as_secs(),
        targets.len()
    );

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let summary = tick(source, metrics, targets).await;
                if summary.failed == 0 {
                    log::info!("[Poller] cycle complete: all {} targets updated", summary.ok);
                } else {
                    log::warn!(
                        "[Poller] cycle complete: {} updated, {} failed",
                        summary.ok,
                        summary.failed
                    );
                }
            }
            _ = shutdown.changed() => {
                log::info!("[Poller] shutdown signal received, exiting");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{CurrentWeather, Forecast, HourlySeries};
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    /// Source that records call order and fails for scripted targets.
    /// Successful fetches report the target's latitude as temperature so
    /// assertions can tell cities apart.
    struct ScriptedSource {
        failing: HashSet<String>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedSource {
        fn new(failing: &[&str]) -> Self {
            Self {
                failing: failing.iter().map(|name| name.to_string()).collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl WeatherSource for ScriptedSource {
        async fn fetch_forecast(&self, target: &Target) -> crate::api::Result<Forecast> {
            self.calls.lock().unwrap().push(target.name.clone());
            if self.failing.contains(&target.name) {
                Err(ApiError::Api {
                    status: 500,
                    message: "scripted failure".to_string(),
                })
            } else {
                Ok(forecast(target.latitude))
            }
        }
    }

    fn forecast(temperature: f64) -> Forecast {
        Forecast {
            current_weather: CurrentWeather {
                temperature,
                windspeed: 10.0,
                time: "2024-01-01T10:45".to_string(),
            },
            hourly: HourlySeries {
                time: vec!["2024-01-01T10:00".to_string(), "2024-01-01T11:00".to_string()],
                relativehumidity_2m: vec![40.0, 50.0],
                pressure_msl: vec![1000.0, 1001.0],
                cloudcover: vec![10.0, 20.0],
                visibility: vec![8000.0, 9000.0],
                uv_index: vec![1.0, 2.0],
                precipitation: vec![0.0, 0.1],
            },
        }
    }

    fn target(name: &str, latitude: f64) -> Target {
        Target {
            name: name.to_string(),
            country: "Kazakhstan".to_string(),
            latitude,
            longitude: 71.0,
        }
    }

    fn city_temperature(metrics: &WeatherMetrics, city: &str) -> Option<f64> {
        metrics
            .registry()
            .gather()
            .into_iter()
            .find(|family| family.get_name() == "weather_temperature_celsius")?
            .get_metric()
            .iter()
            .find(|m| {
                m.get_label()
                    .iter()
                    .any(|l| l.get_name() == "city" && l.get_value() == city)
            })
            .map(|m| m.get_gauge().get_value())
    }

    fn api_status(metrics: &WeatherMetrics) -> i64 {
        metrics
            .registry()
            .gather()
            .into_iter()
            .find(|family| family.get_name() == "weather_api_status")
            .map(|family| family.get_metric()[0].get_gauge().get_value() as i64)
            .unwrap()
    }

    #[tokio::test]
    async fn tick_updates_every_target() {
        let source = ScriptedSource::new(&[]);
        let metrics = WeatherMetrics::new().unwrap();
        let targets = vec![
            target("Astana", 51.0),
            target("Almaty", 43.0),
            target("Semey", 50.0),
        ];

        let summary = tick(&source, &metrics, &targets).await;

        assert_eq!(summary, TickSummary { ok: 3, failed: 0 });
        assert_eq!(api_status(&metrics), 1);
        assert_eq!(city_temperature(&metrics, "Astana"), Some(51.0));
        assert_eq!(city_temperature(&metrics, "Almaty"), Some(43.0));
        assert_eq!(city_temperature(&metrics, "Semey"), Some(50.0));
    }

    #[tokio::test]
    async fn tick_isolates_per_target_failures() {
        let source = ScriptedSource::new(&["Almaty", "Semey"]);
        let metrics = WeatherMetrics::new().unwrap();
        let targets = vec![
            target("Astana", 51.0),
            target("Almaty", 43.0),
            target("Karaganda", 49.0),
            target("Semey", 50.0),
            target("Shymkent", 42.0),
        ];

        let summary = tick(&source, &metrics, &targets).await;

        // Targets after a failing one still update, and one success is
        // enough to report the API as up.
        assert_eq!(summary, TickSummary { ok: 3, failed: 2 });
        assert_eq!(api_status(&metrics), 1);
        assert_eq!(city_temperature(&metrics, "Astana"), Some(51.0));
        assert_eq!(city_temperature(&metrics, "Karaganda"), Some(49.0));
        assert_eq!(city_temperature(&metrics, "Shymkent"), Some(42.0));
        assert_eq!(city_temperature(&metrics, "Almaty"), None);
        assert_eq!(city_temperature(&metrics, "Semey"), None);
        assert_eq!(source.calls().len(), 5);
    }

    #[tokio::test]
    async fn tick_reports_down_when_every_target_fails() {
        let source = ScriptedSource::new(&["Astana", "Almaty"]);
        let metrics = WeatherMetrics::new().unwrap();
        let targets = vec![target("Astana", 51.0), target("Almaty", 43.0)];

        let summary = tick(&source, &metrics, &targets).await;

        assert_eq!(summary, TickSummary { ok: 0, failed: 2 });
        assert!(!summary.any_succeeded());
        assert_eq!(api_status(&metrics), 0);
        assert_eq!(city_temperature(&metrics, "Astana"), None);
    }

    #[tokio::test]
    async fn api_status_recovers_after_an_outage() {
        let metrics = WeatherMetrics::new().unwrap();
        let targets = vec![target("Astana", 51.0)];

        tick(&ScriptedSource::new(&["Astana"]), &metrics, &targets).await;
        assert_eq!(api_status(&metrics), 0);

        tick(&ScriptedSource::new(&[]), &metrics, &targets).await;
        assert_eq!(api_status(&metrics), 1);
    }

    #[tokio::test]
    async fn tick_is_idempotent_for_unchanged_data() {
        let source = ScriptedSource::new(&[]);
        let metrics = WeatherMetrics::new().unwrap();
        let targets = vec![target("Astana", 51.0)];

        let first = tick(&source, &metrics, &targets).await;
        let second = tick(&source, &metrics, &targets).await;

        assert_eq!(first, second);
        assert_eq!(city_temperature(&metrics, "Astana"), Some(51.0));
        let family = metrics
            .registry()
            .gather()
            .into_iter()
            .find(|f| f.get_name() == "weather_temperature_celsius")
            .unwrap();
        assert_eq!(family.get_metric().len(), 1);
    }

    #[tokio::test]
    async fn tick_processes_targets_in_configured_order() {
        let source = ScriptedSource::new(&["Almaty"]);
        let metrics = WeatherMetrics::new().unwrap();
        let targets = vec![
            target("Astana", 51.0),
            target("Almaty", 43.0),
            target("Karaganda", 49.0),
        ];

        tick(&source, &metrics, &targets).await;

        assert_eq!(source.calls(), ["Astana", "Almaty", "Karaganda"]);
    }

    #[tokio::test]
    async fn run_polls_immediately_and_stops_on_shutdown() {
        let source = Arc::new(ScriptedSource::new(&[]));
        let metrics = Arc::new(WeatherMetrics::new().unwrap());
        let targets = vec![target("Astana", 51.0)];
        let (shutdown_tx, shutdown_rx) = watch::channel(());

        let handle = tokio::spawn({
            let source = source.clone();
            let metrics = metrics.clone();
            let targets = targets.clone();
            async move {
                run(
                    &*source,
                    &metrics,
                    &targets,
                    Duration::from_millis(5),
                    shutdown_rx,
                )
                .await
            }
        });

        tokio::time::sleep(Duration::from_millis(40)).await;
        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("poller did not stop on shutdown")
            .unwrap();

        // Immediate first cycle plus at least one periodic cycle.
        assert!(source.calls().len() >= 2, "calls: {:?}", source.calls());
        assert_eq!(city_temperature(&metrics, "Astana"), Some(51.0));
    }
}
