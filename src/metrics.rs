//! In-process counters (SPEC_FULL.md §4.7), grounded on
//! `original_source/convert.cpp`'s `Metrics` struct and throughput
//! calculation. No external metrics emission — `tracing::info!` is the
//! only sink, matching the ambient observability the rest of this crate
//! uses.

use std::time::Duration;

/// Running counters for one ingest run (or one file, at the driver's
/// discretion).
#[derive(Debug, Default, Clone, Copy)]
pub struct IngestMetrics {
    pub records_processed: u64,
    pub records_failed: u64,
    pub data_in_bytes: u64,
    pub data_out_bytes: u64,
}

/// Derived, point-in-time summary of an `IngestMetrics` snapshot.
#[derive(Debug, Clone, Copy)]
pub struct MetricsSummary {
    pub records_processed: u64,
    pub records_failed: u64,
    pub data_in_bytes: u64,
    pub data_out_bytes: u64,
    pub mib_per_second: f64,
}

impl IngestMetrics {
    pub fn record_ok(&mut self, in_bytes: u64, out_bytes: u64) {
        self.records_processed += 1;
        self.data_in_bytes += in_bytes;
        self.data_out_bytes += out_bytes;
    }

    pub fn record_failure(&mut self, in_bytes: u64) {
        self.records_failed += 1;
        self.data_in_bytes += in_bytes;
    }

    /// Compute throughput in MiB/s over `elapsed`, the same formula as
    /// `ProcessFile`'s `data_in / 1024 / 1024 / elapsed_seconds`. Guarded
    /// against division by zero for runs too fast to measure.
    pub fn finish(&self, elapsed: Duration) -> MetricsSummary {
        let seconds = elapsed.as_secs_f64();
        let mib_per_second = if seconds > 0.0 { (self.data_in_bytes as f64 / 1024.0 / 1024.0) / seconds } else { 0.0 };

        MetricsSummary {
            records_processed: self.records_processed,
            records_failed: self.records_failed,
            data_in_bytes: self.data_in_bytes,
            data_out_bytes: self.data_out_bytes,
            mib_per_second,
        }
    }
}

impl MetricsSummary {
    pub fn log(&self, label: &str) {
        tracing::info!(
            label,
            records_processed = self.records_processed,
            records_failed = self.records_failed,
            data_in_bytes = self.data_in_bytes,
            data_out_bytes = self.data_out_bytes,
            mib_per_second = self.mib_per_second,
            "ingest run complete"
        );
    }
}
