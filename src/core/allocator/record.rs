use crate::address::Address;
use crate::error::{GridError, Result};
use crate::integrity::IntegrityRecord;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Allocation label, bounded in length
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Label(String);

impl Label {
    /// Validate a label against `max_len` bytes
    pub fn new(label: impl Into<String>, max_len: usize) -> Result<Self> {
        let label = label.into();
        if label.len() > max_len {
            return Err(GridError::InvalidLabel(format!(
                "label '{}' is {} bytes (max {})",
                label,
                label.len(),
                max_len
            )));
        }
        Ok(Label(label))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One allocation slot's bookkeeping
#[derive(Debug, Clone, Serialize)]
pub struct AllocationRecord {
    /// Address of the first byte's footprint
    pub address: Address,

    /// Linear byte index of the first byte
    pub base_unit: usize,

    /// Reserved size in bytes
    pub size: usize,

    pub label: Label,

    /// Checksum of the last payload written (0 until first write)
    pub checksum: u32,

    pub created: DateTime<Utc>,

    pub active: bool,

    /// Integrity data for the last payload written
    pub integrity: Option<IntegrityRecord>,
}

impl AllocationRecord {
    /// One past the last byte index of the region
    pub fn end_unit(&self) -> usize {
        self.base_unit + self.size
    }

    /// Whether `base..base + size` intersects this record's region
    pub fn overlaps(&self, base: usize, size: usize) -> bool {
        base < self.end_unit() && self.base_unit < base.saturating_add(size)
    }
}
