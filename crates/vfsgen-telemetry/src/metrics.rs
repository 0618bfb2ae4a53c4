//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes only the counters the overlay generator reports.

use std::convert::TryFrom;
use std::sync::Arc;
use std::time::Duration;

use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{TelemetryError, TelemetryResult};

/// Prometheus-backed metrics registry shared across services.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    generations_total: IntCounterVec,
    links_total: IntCounterVec,
    cache_lookups_total: IntCounterVec,
    last_generation_ms: IntGauge,
}

/// Snapshot of selected gauges and counters for health reporting.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Generation passes that completed.
    pub generations_succeeded: u64,
    /// Generation passes that failed.
    pub generations_failed: u64,
    /// Path cache hits.
    pub cache_hits: u64,
    /// Path cache misses.
    pub cache_misses: u64,
    /// Duration of the latest generation pass in milliseconds.
    pub last_generation_ms: i64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// built or registered.
    pub fn new() -> TelemetryResult<Self> {
        let registry = Registry::new();

        let generations_total = counter_vec(
            "overlay_generations_total",
            "Overlay generation passes by scope and outcome",
            &["scope", "outcome"],
        )?;
        let links_total = counter_vec(
            "overlay_links_total",
            "Overlay entries processed by kind and action",
            &["kind", "action"],
        )?;
        let cache_lookups_total = counter_vec(
            "overlay_cache_lookups_total",
            "Path cache lookups by result",
            &["result"],
        )?;
        let last_generation_ms = IntGauge::with_opts(Opts::new(
            "overlay_last_generation_ms",
            "Duration of the latest generation pass (ms)",
        ))
        .map_err(|source| TelemetryError::Collector {
            operation: "build",
            name: "overlay_last_generation_ms",
            source,
        })?;

        register(&registry, "overlay_generations_total", &generations_total)?;
        register(&registry, "overlay_links_total", &links_total)?;
        register(&registry, "overlay_cache_lookups_total", &cache_lookups_total)?;
        register(&registry, "overlay_last_generation_ms", &last_generation_ms)?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                generations_total,
                links_total,
                cache_lookups_total,
                last_generation_ms,
            }),
        })
    }

    /// Count a finished generation pass.
    pub fn inc_generation(&self, scope: &str, outcome: &str) {
        self.inner
            .generations_total
            .with_label_values(&[scope, outcome])
            .inc();
    }

    /// Add processed entries for a kind (`video`, `subtitle`, `nfo`) and action.
    pub fn add_links(&self, kind: &str, action: &str, count: u64) {
        if count > 0 {
            self.inner
                .links_total
                .with_label_values(&[kind, action])
                .inc_by(count);
        }
    }

    /// Count a path cache lookup (`hit` or `miss`).
    pub fn inc_cache_lookup(&self, result: &str) {
        self.inner
            .cache_lookups_total
            .with_label_values(&[result])
            .inc();
    }

    /// Record the duration of the latest generation pass.
    pub fn observe_generation(&self, duration: Duration) {
        self.inner
            .last_generation_ms
            .set(Self::duration_to_ms(duration));
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> TelemetryResult<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Take a point-in-time snapshot of the most relevant gauges and counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let generations = |outcome: &str| -> u64 {
            ["library", "show", "season", "movie", "episode"]
                .iter()
                .map(|&scope| {
                    self.inner
                        .generations_total
                        .with_label_values(&[scope, outcome])
                        .get()
                })
                .sum()
        };
        let lookups = |result: &str| {
            self.inner
                .cache_lookups_total
                .with_label_values(&[result])
                .get()
        };
        MetricsSnapshot {
            generations_succeeded: generations("success"),
            generations_failed: generations("failure"),
            cache_hits: lookups("hit"),
            cache_misses: lookups("miss"),
            last_generation_ms: self.inner.last_generation_ms.get(),
        }
    }

    /// Convert a duration to milliseconds saturating at `i64::MAX`.
    pub(crate) fn duration_to_ms(duration: Duration) -> i64 {
        i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
    }
}

fn counter_vec(name: &'static str, help: &str, labels: &[&str]) -> TelemetryResult<IntCounterVec> {
    IntCounterVec::new(Opts::new(name, help), labels)
        .map_err(|source| TelemetryError::Collector {
            operation: "build",
            name,
            source,
        })
}

fn register<C>(registry: &Registry, name: &'static str, collector: &C) -> TelemetryResult<()>
where
    C: prometheus::core::Collector + Clone + 'static,
{
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::Collector {
            operation: "register",
            name,
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_to_ms_saturates_on_large_values() {
        let duration = Duration::from_secs(u64::MAX / 2);
        assert_eq!(Metrics::duration_to_ms(duration), i64::MAX);
    }

    #[test]
    fn metrics_snapshot_reflects_updates() -> TelemetryResult<()> {
        let metrics = Metrics::new()?;
        metrics.inc_generation("library", "success");
        metrics.inc_generation("season", "success");
        metrics.inc_generation("show", "failure");
        metrics.add_links("video", "created", 3);
        metrics.add_links("subtitle", "removed", 0);
        metrics.inc_cache_lookup("hit");
        metrics.inc_cache_lookup("hit");
        metrics.inc_cache_lookup("miss");
        metrics.observe_generation(Duration::from_millis(120));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.generations_succeeded, 2);
        assert_eq!(snapshot.generations_failed, 1);
        assert_eq!(snapshot.cache_hits, 2);
        assert_eq!(snapshot.cache_misses, 1);
        assert_eq!(snapshot.last_generation_ms, 120);

        let rendered = metrics.render()?;
        assert!(rendered.contains("overlay_generations_total"));
        assert!(rendered.contains("overlay_links_total{action=\"created\",kind=\"video\"} 3"));
        assert!(!rendered.contains("kind=\"subtitle\""));
        Ok(())
    }
}
