// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Prometheus counters for reload attempts.

use prometheus::{IntCounterVec, Opts};
use std::sync::LazyLock;
use tracing::warn;

static RELOADS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "reloader_reload_executed_total",
            "Total reload attempts partitioned by outcome and namespace",
        ),
        &["success", "namespace"],
    )
    .expect("Failed to create RELOADS_TOTAL metric - this should never happen")
});

/// Register the reload counters with the default registry. Safe to call once
/// at startup; a duplicate registration is logged and ignored.
pub fn register() {
    if let Err(e) = prometheus::register(Box::new(RELOADS_TOTAL.clone())) {
        warn!("Failed to register reload metrics: {}", e);
    }
}

/// Record one reload attempt against a workload in `namespace`.
pub fn record_reload(namespace: &str, success: bool) {
    let outcome = if success { "true" } else { "false" };
    RELOADS_TOTAL.with_label_values(&[outcome, namespace]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_reload_counts_by_outcome() {
        record_reload("test-ns", true);
        record_reload("test-ns", true);
        record_reload("test-ns", false);

        assert_eq!(RELOADS_TOTAL.with_label_values(&["true", "test-ns"]).get(), 2);
        assert_eq!(RELOADS_TOTAL.with_label_values(&["false", "test-ns"]).get(), 1);
    }
}
