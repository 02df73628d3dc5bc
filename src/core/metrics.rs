//! Operation counters
//!
//! Counters are relaxed atomics updated on the hot path; a
//! [`MetricsSnapshot`] is a consistent-enough copy for reporting.

use crate::error::{GridError, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Kind of operation being recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Alloc,
    Free,
    Write,
    Read,
    Codec,
    Transition,
    Sync,
}

#[derive(Debug, Default)]
pub struct Metrics {
    operations: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    allocations: AtomicU64,
    frees: AtomicU64,
    writes: AtomicU64,
    reads: AtomicU64,
    bytes_written: AtomicU64,
    bytes_read: AtomicU64,
    checksum_failures: AtomicU64,
    ecc_failures: AtomicU64,
    marker_failures: AtomicU64,
    syncs: AtomicU64,
    validation_failures: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count an operation's outcome and pass the result through
    pub fn record<T>(&self, kind: OpKind, result: Result<T>) -> Result<T> {
        self.operations.fetch_add(1, Ordering::Relaxed);
        match &result {
            Ok(_) => {
                self.successes.fetch_add(1, Ordering::Relaxed);
                let counter = match kind {
                    OpKind::Alloc => Some(&self.allocations),
                    OpKind::Free => Some(&self.frees),
                    OpKind::Write => Some(&self.writes),
                    OpKind::Read => Some(&self.reads),
                    OpKind::Sync => Some(&self.syncs),
                    OpKind::Codec | OpKind::Transition => None,
                };
                if let Some(counter) = counter {
                    counter.fetch_add(1, Ordering::Relaxed);
                }
            }
            Err(err) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                self.record_error(err);
            }
        }
        result
    }

    fn record_error(&self, err: &GridError) {
        let counter = match err {
            GridError::ChecksumMismatch { .. } => &self.checksum_failures,
            GridError::EccMismatch { .. } => &self.ecc_failures,
            GridError::MarkerMismatch { .. } | GridError::CorruptUnit { .. } => {
                &self.marker_failures
            }
            _ => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_bytes_written(&self, bytes: usize) {
        self.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn add_bytes_read(&self, bytes: usize) {
        self.bytes_read.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Background sync that ran outside a caller's operation
    pub fn record_background_sync(&self) {
        self.syncs.fetch_add(1, Ordering::Relaxed);
    }

    /// Replica consistency check that failed
    pub fn record_validation_failure(&self) {
        self.validation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            operations: self.operations.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            allocations: self.allocations.load(Ordering::Relaxed),
            frees: self.frees.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            reads: self.reads.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            checksum_failures: self.checksum_failures.load(Ordering::Relaxed),
            ecc_failures: self.ecc_failures.load(Ordering::Relaxed),
            marker_failures: self.marker_failures.load(Ordering::Relaxed),
            syncs: self.syncs.load(Ordering::Relaxed),
            validation_failures: self.validation_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`Metrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub operations: u64,
    pub successes: u64,
    pub failures: u64,
    pub allocations: u64,
    pub frees: u64,
    pub writes: u64,
    pub reads: u64,
    pub bytes_written: u64,
    pub bytes_read: u64,
    pub checksum_failures: u64,
    pub ecc_failures: u64,
    pub marker_failures: u64,
    pub syncs: u64,
    pub validation_failures: u64,
}

impl MetricsSnapshot {
    /// Fraction of operations that succeeded (1.0 when nothing ran)
    pub fn success_rate(&self) -> f64 {
        if self.operations == 0 {
            1.0
        } else {
            self.successes as f64 / self.operations as f64
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
