//! Engine telemetry for observability and user feedback.
//!
//! Lock-free atomic counters updated from the engine's hot paths, with a
//! point-in-time [`TelemetrySnapshot`] for display layers.
//!
//! ```text
//! Engine handlers ─────► EngineMetrics ─────► TelemetrySnapshot ─────► Views
//!                        (atomic counters)    (point-in-time copy)
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use tracing_subscriber::EnvFilter;

/// Initialize tracing for binaries and tests.
///
/// Reads the filter from `RUST_LOG`; safe to call more than once (later
/// calls are no-ops).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

/// Lock-free counters for the engine's operations.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    markers_created: AtomicU64,
    markers_removed: AtomicU64,
    icon_loads: AtomicU64,
    icon_failures: AtomicU64,
    cluster_passes: AtomicU64,
    touches_document: AtomicU64,
    touches_native: AtomicU64,
}

impl EngineMetrics {
    /// Create zeroed metrics.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn marker_created(&self) {
        self.markers_created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn marker_removed(&self) {
        self.markers_removed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn icon_loaded(&self) {
        self.icon_loads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn icon_failed(&self) {
        self.icon_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn icons_loaded(&self, count: u64) {
        self.icon_loads.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn icons_failed(&self, count: u64) {
        self.icon_failures.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn cluster_pass(&self) {
        self.cluster_passes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn touch_document(&self) {
        self.touches_document.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn touch_native(&self) {
        self.touches_native.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time copy of all counters.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            markers_created: self.markers_created.load(Ordering::Relaxed),
            markers_removed: self.markers_removed.load(Ordering::Relaxed),
            icon_loads: self.icon_loads.load(Ordering::Relaxed),
            icon_failures: self.icon_failures.load(Ordering::Relaxed),
            cluster_passes: self.cluster_passes.load(Ordering::Relaxed),
            touches_document: self.touches_document.load(Ordering::Relaxed),
            touches_native: self.touches_native.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the engine counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    /// Markers created over the engine's lifetime.
    pub markers_created: u64,
    /// Markers explicitly removed.
    pub markers_removed: u64,
    /// Icon URLs resolved successfully.
    pub icon_loads: u64,
    /// Icon URLs that failed to resolve.
    pub icon_failures: u64,
    /// Clustering passes executed.
    pub cluster_passes: u64,
    /// Pointer events routed to the document surface.
    pub touches_document: u64,
    /// Pointer events routed to a native element.
    pub touches_native: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let metrics = EngineMetrics::new();
        metrics.marker_created();
        metrics.marker_created();
        metrics.marker_removed();
        metrics.icon_loaded();
        metrics.icon_failed();
        metrics.cluster_pass();
        metrics.touch_document();
        metrics.touch_native();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.markers_created, 2);
        assert_eq!(snapshot.markers_removed, 1);
        assert_eq!(snapshot.icon_loads, 1);
        assert_eq!(snapshot.icon_failures, 1);
        assert_eq!(snapshot.cluster_passes, 1);
        assert_eq!(snapshot.touches_document, 1);
        assert_eq!(snapshot.touches_native, 1);
    }

    #[test]
    fn test_snapshot_default_is_zeroed() {
        assert_eq!(EngineMetrics::new().snapshot(), TelemetrySnapshot::default());
    }
}
