//! Periodic counters: per-second series of received, timed-out, and
//! completed requests, plus a running histogram of payload sizes.

use std::mem;

use crate::units::{Bytes, Millis};

/// Interval between flushes of the per-second counters.
pub const FLUSH_INTERVAL: Millis = Millis::new(1000);

/// Live counters and the flushed time series they feed.
///
/// The buffers accumulate between flushes; every flush closes out one
/// one-second window and appends it to the corresponding series. The totals
/// are never reset except by [`Metrics::default`].
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct Metrics {
    received_buffer: u64,
    timeout_buffer: u64,
    completion_buffer: u64,
    received_series: Vec<u64>,
    timeout_series: Vec<u64>,
    completion_series: Vec<u64>,
    histogram: SizeHistogram,
    received_total: u64,
    routed_total: u64,
    timed_out_total: u64,
    completed_total: u64,
}

impl Metrics {
    pub(crate) fn record_received(&mut self) {
        self.received_buffer += 1;
        self.received_total += 1;
    }

    pub(crate) fn record_routed(&mut self) {
        self.routed_total += 1;
    }

    pub(crate) fn record_timeout(&mut self) {
        self.timeout_buffer += 1;
        self.timed_out_total += 1;
    }

    pub(crate) fn record_completion(&mut self) {
        self.completion_buffer += 1;
        self.completed_total += 1;
    }

    pub(crate) fn record_size(&mut self, size: Bytes) {
        self.histogram.record(size);
    }

    /// Closes out the current one-second window.
    pub(crate) fn flush(&mut self) {
        self.received_series.push(mem::take(&mut self.received_buffer));
        self.timeout_series.push(mem::take(&mut self.timeout_buffer));
        self.completion_series.push(mem::take(&mut self.completion_buffer));
    }

    /// Read-only view of the aggregated series and totals.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_per_sec: self.received_series.clone(),
            timeouts_per_sec: self.timeout_series.clone(),
            completions_per_sec: self.completion_series.clone(),
            size_histogram: self.histogram.counts().to_vec(),
            received_total: self.received_total,
            routed_total: self.routed_total,
            timed_out_total: self.timed_out_total,
            completed_total: self.completed_total,
        }
    }
}

/// A growable counter array indexed by payload size in bytes.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct SizeHistogram {
    counts: Vec<u64>,
}

impl SizeHistogram {
    /// Bumps the counter for `size`, growing the array on demand.
    pub fn record(&mut self, size: Bytes) {
        let idx = size.into_u64() as usize;
        if self.counts.len() <= idx {
            self.counts.resize(idx + 1, 0);
        }
        self.counts[idx] += 1;
    }

    /// The counter for one exact size.
    pub fn count(&self, size: Bytes) -> u64 {
        self.counts
            .get(size.into_u64() as usize)
            .copied()
            .unwrap_or(0)
    }

    /// Total number of recorded samples.
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// The raw counters, one slot per byte size.
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }
}

/// Snapshot of every observable series.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct MetricsSnapshot {
    pub requests_per_sec: Vec<u64>,
    pub timeouts_per_sec: Vec<u64>,
    pub completions_per_sec: Vec<u64>,
    pub size_histogram: Vec<u64>,
    pub received_total: u64,
    pub routed_total: u64,
    pub timed_out_total: u64,
    pub completed_total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flush_closes_one_second_windows() {
        let mut metrics = Metrics::default();
        metrics.record_received();
        metrics.record_received();
        metrics.flush();
        metrics.flush();
        metrics.record_received();
        metrics.record_completion();
        metrics.flush();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests_per_sec, vec![2, 0, 1]);
        assert_eq!(snapshot.completions_per_sec, vec![0, 0, 1]);
        assert_eq!(snapshot.timeouts_per_sec, vec![0, 0, 0]);
        assert_eq!(snapshot.received_total, 3);
        assert_eq!(snapshot.completed_total, 1);
    }

    #[test]
    fn totals_survive_flushes() {
        let mut metrics = Metrics::default();
        for _ in 0..5 {
            metrics.record_timeout();
            metrics.flush();
        }
        assert_eq!(metrics.snapshot().timed_out_total, 5);
        assert_eq!(metrics.snapshot().timeouts_per_sec, vec![1; 5]);
    }

    #[test]
    fn histogram_grows_lazily() {
        let mut histogram = SizeHistogram::default();
        histogram.record(Bytes::new(3));
        histogram.record(Bytes::new(3));
        histogram.record(Bytes::new(5));
        insta::assert_yaml_snapshot!(histogram.counts(), @r###"
        ---
        - 0
        - 0
        - 0
        - 2
        - 0
        - 1
        "###);
        assert_eq!(histogram.count(Bytes::new(3)), 2);
        assert_eq!(histogram.count(Bytes::new(4)), 0);
        assert_eq!(histogram.count(Bytes::new(999)), 0);
        assert_eq!(histogram.total(), 3);
    }

    #[test]
    fn histogram_accepts_zero_sized_payloads() {
        let mut histogram = SizeHistogram::default();
        histogram.record(Bytes::ZERO);
        assert_eq!(histogram.count(Bytes::ZERO), 1);
        assert_eq!(histogram.counts().len(), 1);
    }
}
