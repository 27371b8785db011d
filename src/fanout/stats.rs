//! Fan-out statistics

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use super::FanoutReport;

/// Running fan-out counters, shared between the fan-out and its sinks
#[derive(Debug)]
pub struct FanoutStats {
    started_at: Instant,
    samples: AtomicU64,
    bytes: AtomicU64,
    deliveries: AtomicU64,
    failures: AtomicU64,
    skipped: AtomicU64,
    dropped: AtomicU64,
}

impl Default for FanoutStats {
    fn default() -> Self {
        Self::new()
    }
}

impl FanoutStats {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            samples: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
            deliveries: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Record one broadcast pass
    pub(crate) fn record(&self, report: &FanoutReport, sample_len: usize) {
        self.samples.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(sample_len as u64, Ordering::Relaxed);
        self.deliveries
            .fetch_add(report.delivered as u64, Ordering::Relaxed);
        self.failures.fetch_add(report.failed as u64, Ordering::Relaxed);
        self.skipped.fetch_add(report.skipped as u64, Ordering::Relaxed);
    }

    /// Record a sample dropped before fan-out
    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> FanoutSnapshot {
        FanoutSnapshot {
            uptime: self.started_at.elapsed(),
            samples: self.samples.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Copy of the fan-out counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutSnapshot {
    /// Time since the stats were created
    pub uptime: Duration,
    /// Samples broadcast
    pub samples: u64,
    /// Bytes broadcast, counted once per sample
    pub bytes: u64,
    /// Successful per-session sends
    pub deliveries: u64,
    /// Failed per-session sends
    pub failures: u64,
    /// Sessions passed over because they were not ready
    pub skipped: u64,
    /// Samples dropped by a full sink
    pub dropped: u64,
}

impl FanoutSnapshot {
    /// Ingest bitrate in bits per second
    pub fn bitrate(&self) -> u64 {
        let secs = self.uptime.as_secs();
        if secs > 0 {
            (self.bytes * 8) / secs
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let snapshot = FanoutStats::new().snapshot();
        assert_eq!(snapshot.samples, 0);
        assert_eq!(snapshot.deliveries, 0);
        assert_eq!(snapshot.dropped, 0);
    }

    #[test]
    fn test_stats_record() {
        let stats = FanoutStats::new();
        let report = FanoutReport {
            delivered: 3,
            failed: 1,
            skipped: 2,
        };

        stats.record(&report, 1200);
        stats.record(&report, 800);
        stats.record_dropped();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.samples, 2);
        assert_eq!(snapshot.bytes, 2000);
        assert_eq!(snapshot.deliveries, 6);
        assert_eq!(snapshot.failures, 2);
        assert_eq!(snapshot.skipped, 4);
        assert_eq!(snapshot.dropped, 1);
    }

    #[test]
    fn test_bitrate() {
        let snapshot = FanoutSnapshot {
            uptime: Duration::from_secs(10),
            bytes: 1_000_000,
            ..Default::default()
        };
        // 1,000,000 bytes * 8 bits / 10 seconds
        assert_eq!(snapshot.bitrate(), 800_000);

        let snapshot = FanoutSnapshot {
            bytes: 1_000_000,
            ..Default::default()
        };
        assert_eq!(snapshot.bitrate(), 0);
    }
}
