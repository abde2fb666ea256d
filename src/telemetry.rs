//! Logging, timing and quality signals
//!
//! The engines emit `tracing` events and `metrics` counters; installing a
//! subscriber or recorder is left to the host, with [`init_tracing`] as the
//! stock setup.

use std::collections::HashSet;
use std::time::Instant;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::catalog::CatalogItem;
#[cfg(feature = "metrics")]
use crate::error::{Error, Result};

/// Install the default tracing subscriber.
///
/// `RUST_LOG` overrides the filter and `LOG_FORMAT=json` switches to JSON
/// lines. Returns false if a global subscriber was already set.
pub fn init_tracing() -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("catalog_discovery=debug,info"));

    let json = std::env::var("LOG_FORMAT").map_or(false, |v| v.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if json {
        registry.with(fmt::layer().json().with_target(true)).try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .with_ansi(std::env::var("NO_COLOR").is_err()),
            )
            .try_init()
    };
    installed.is_ok()
}

/// Install a Prometheus recorder for the engine counters and render through the returned handle
#[cfg(feature = "metrics")]
pub fn install_prometheus_recorder() -> Result<metrics_exporter_prometheus::PrometheusHandle> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| Error::config(format!("installing metrics recorder: {}", e)))
}

/// Logs how long an operation took when dropped
pub struct PerformanceTimer {
    start: Instant,
    label: String,
}

impl PerformanceTimer {
    pub fn new(label: &str) -> Self {
        Self {
            start: Instant::now(),
            label: label.to_string(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    pub fn log_if_slow(&self, threshold_ms: u64) {
        let elapsed = self.elapsed_ms();
        if elapsed > threshold_ms {
            tracing::warn!(
                "Slow operation: {} took {}ms (threshold: {}ms)",
                self.label,
                elapsed,
                threshold_ms
            );
        }
    }
}

impl Drop for PerformanceTimer {
    fn drop(&mut self) {
        tracing::debug!("{} completed in {}ms", self.label, self.elapsed_ms());
    }
}

/// Variety of a recommendation list in `[0, 1]`, higher is more varied.
///
/// Creator variety dominates; category variety only counts in proportion to it.
pub fn diversity_score(items: &[CatalogItem]) -> f64 {
    if items.is_empty() {
        return 0.0;
    }
    let total = items.len() as f64;

    let creators: HashSet<&str> = items.iter().map(|i| i.creator.as_str()).collect();
    let categories: HashSet<&str> = items.iter().map(|i| i.category.as_str()).collect();

    let creator_diversity = creators.len() as f64 / total;
    let category_diversity = (categories.len() as f64 / total).min(1.0) * creator_diversity;

    creator_diversity * 0.7 + category_diversity * 0.3
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, creator: &str, category: &str) -> CatalogItem {
        CatalogItem {
            creator: creator.to_string(),
            category: category.to_string(),
            ..CatalogItem::new(id, id)
        }
    }

    #[test]
    fn test_diversity_score() {
        assert_eq!(diversity_score(&[]), 0.0);

        let varied: Vec<CatalogItem> = (0..4)
            .map(|i| item(&i.to_string(), &format!("c{}", i), &format!("k{}", i)))
            .collect();
        assert!((diversity_score(&varied) - 1.0).abs() < 1e-9);

        let samey: Vec<CatalogItem> = (0..4).map(|i| item(&i.to_string(), "c", "k")).collect();
        assert!(diversity_score(&samey) < 0.3);
    }

    #[test]
    fn test_timer_elapsed() {
        let timer = PerformanceTimer::new("noop");
        assert!(timer.elapsed_ms() < 1_000);
        timer.log_if_slow(10_000);
    }

    #[test]
    fn test_init_tracing_is_idempotent() {
        init_tracing();
        assert!(!init_tracing());
    }
}
