//! Write/read integrity validation
//!
//! Every payload written through `MemoryContext` is sealed into an
//! [`IntegrityRecord`] holding a checksum and a redundancy code. Reads
//! recompute both and report the first disagreement.
//!
//! The strategy is pluggable. [`PlaceholderIntegrity`] (CRC-32 plus
//! Fletcher-32) detects accidental corruption only; it is not a
//! cryptographic hash, cannot correct errors and offers no protection
//! against deliberate tampering.

pub mod merkle;

use crate::error::{GridError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;
use tracing::warn;

/// Checksum and redundancy code computation
pub trait IntegrityStrategy: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    /// Primary checksum over the payload
    fn checksum(&self, data: &[u8]) -> u32;

    /// Secondary code, checked only when the checksum agrees
    fn redundancy_code(&self, data: &[u8]) -> u32;
}

/// CRC-32 checksum with a Fletcher-32 redundancy code
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderIntegrity;

impl IntegrityStrategy for PlaceholderIntegrity {
    fn name(&self) -> &'static str {
        "crc32+fletcher32"
    }

    fn checksum(&self, data: &[u8]) -> u32 {
        crc32fast::hash(data)
    }

    fn redundancy_code(&self, data: &[u8]) -> u32 {
        fletcher32(data)
    }
}

/// Fletcher-32 over 16-bit little-endian words (odd tail zero-padded)
pub fn fletcher32(data: &[u8]) -> u32 {
    let mut sum1: u32 = 0;
    let mut sum2: u32 = 0;
    for word in data.chunks(2) {
        let lo = word[0] as u32;
        let hi = word.get(1).copied().unwrap_or(0) as u32;
        sum1 = (sum1 + (lo | (hi << 8))) % 0xFFFF;
        sum2 = (sum2 + sum1) % 0xFFFF;
    }
    (sum2 << 16) | sum1
}

/// Integrity data stored with an allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityRecord {
    pub checksum: u32,
    pub redundancy: u32,

    /// Payload length in bytes
    pub len: usize,

    pub timestamp: DateTime<Utc>,

    /// Incremented on every write to the allocation
    pub version: u64,

    pub valid: bool,
}

/// Seals payloads on write and verifies them on read
#[derive(Debug, Clone)]
pub struct IntegrityValidator {
    strategy: Arc<dyn IntegrityStrategy>,
}

impl IntegrityValidator {
    pub fn new(strategy: Arc<dyn IntegrityStrategy>) -> Self {
        IntegrityValidator { strategy }
    }

    pub fn placeholder() -> Self {
        Self::new(Arc::new(PlaceholderIntegrity))
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Build the record for a payload about to be written
    pub fn seal(&self, data: &[u8], previous: Option<&IntegrityRecord>) -> IntegrityRecord {
        IntegrityRecord {
            checksum: self.strategy.checksum(data),
            redundancy: self.strategy.redundancy_code(data),
            len: data.len(),
            timestamp: Utc::now(),
            version: previous.map_or(1, |r| r.version + 1),
            valid: true,
        }
    }

    /// Check a payload read back from the grid against its record
    pub fn verify(&self, data: &[u8], record: &IntegrityRecord) -> Result<()> {
        let computed = self.strategy.checksum(data);
        if computed != record.checksum {
            warn!(
                "Checksum mismatch over {} bytes (v{}): stored {:#010x}, computed {:#010x}",
                data.len(),
                record.version,
                record.checksum,
                computed
            );
            return Err(GridError::ChecksumMismatch {
                stored: record.checksum,
                computed,
            });
        }

        let computed = self.strategy.redundancy_code(data);
        if computed != record.redundancy {
            warn!(
                "Redundancy code mismatch over {} bytes (v{}): stored {:#010x}, computed {:#010x}",
                data.len(),
                record.version,
                record.redundancy,
                computed
            );
            return Err(GridError::EccMismatch {
                stored: record.redundancy,
                computed,
            });
        }

        Ok(())
    }
}

impl Default for IntegrityValidator {
    fn default() -> Self {
        Self::placeholder()
    }
}
