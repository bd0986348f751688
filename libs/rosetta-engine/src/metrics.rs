use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Running per-process tallies of pipeline outcomes.
///
/// Counters only grow. A packet counts once toward `received` and once
/// toward the outcome it reached; a packet that transforms but fails to
/// forward counts toward both `transformed` and `errors`.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    received: AtomicU64,
    transformed: AtomicU64,
    forwarded: AtomicU64,
    errors: AtomicU64,
    manual_sends: AtomicU64,
    manual_failures: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub received: u64,
    pub transformed: u64,
    pub forwarded: u64,
    pub errors: u64,
    pub manual_sends: u64,
    pub manual_failures: u64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transformed(&self) {
        self.transformed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_forwarded(&self) {
        self.forwarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_manual_send(&self, delivered: bool) {
        if delivered {
            self.manual_sends.fetch_add(1, Ordering::Relaxed);
        } else {
            self.manual_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            transformed: self.transformed.load(Ordering::Relaxed),
            forwarded: self.forwarded.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            manual_sends: self.manual_sends.load(Ordering::Relaxed),
            manual_failures: self.manual_failures.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_each_outcome() {
        let m = PipelineMetrics::new();
        m.record_received();
        m.record_received();
        m.record_transformed();
        m.record_forwarded();
        m.record_error();
        m.record_manual_send(true);
        m.record_manual_send(false);
        m.record_manual_send(false);

        assert_eq!(
            m.snapshot(),
            MetricsSnapshot {
                received: 2,
                transformed: 1,
                forwarded: 1,
                errors: 1,
                manual_sends: 1,
                manual_failures: 2,
            }
        );
    }

    #[test]
    fn snapshot_serializes_flat() {
        let json = serde_json::to_value(PipelineMetrics::new().snapshot()).unwrap();
        assert_eq!(json["received"], 0);
        assert_eq!(json["manual_failures"], 0);
    }
}
