//! Grid memory configuration
//!
//! Configuration can be built in code, through
//! [`GridMemoryBuilder`](crate::GridMemoryBuilder), or loaded from TOML:
//!
//! ```toml
//! width = 1920
//! buffer_size = 65536      # or: height = 1080
//! horizontal_spacing = 10
//! vertical_spacing = 1
//! slot_capacity = 1024
//! spacing_factor = 128
//! mode = "redundant"
//! sync_interval_ms = 50
//! ```

use crate::address::{Layout, Position};
use crate::error::{GridError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_WIDTH: u32 = 1920;
pub const DEFAULT_HEIGHT: u32 = 1080;
pub const DEFAULT_SLOT_CAPACITY: usize = 1024;
pub const DEFAULT_SPACING_FACTOR: usize = 128;
pub const DEFAULT_MAX_PROBES: usize = 64;
pub const DEFAULT_LABEL_MAX_LEN: usize = 32;

/// How the persistent side of the store is organised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    /// One persistent grid
    #[default]
    Standard,
    /// Primary and secondary replicas kept in sync
    Redundant,
}

/// Configuration consumed by `MemoryContext::init`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Grid width in visual units
    pub width: u32,

    /// Grid height in visual units. Mutually exclusive with `buffer_size`;
    /// when both are unset [`DEFAULT_HEIGHT`] is used.
    pub height: Option<u32>,

    /// Raw byte capacity to size the grid for (height is derived)
    pub buffer_size: Option<usize>,

    pub origin_x: u32,
    pub origin_y: u32,

    /// Cells between the starts of neighbouring bytes on a row (≥ 10)
    pub horizontal_spacing: u32,

    /// Rows between consecutive byte rows
    pub vertical_spacing: u32,

    /// Number of allocation slots
    pub slot_capacity: usize,

    /// Byte distance between the candidate regions of consecutive slots
    pub spacing_factor: usize,

    /// Candidate regions tried before an allocation gives up
    pub max_probes: usize,

    /// Maximum label length in bytes
    pub label_max_len: usize,

    pub mode: StorageMode,

    /// Background replica sync period (redundant mode only)
    pub sync_interval_ms: Option<u64>,
}

impl Default for GridConfig {
    fn default() -> Self {
        GridConfig {
            width: DEFAULT_WIDTH,
            height: None,
            buffer_size: None,
            origin_x: 0,
            origin_y: 0,
            horizontal_spacing: crate::codec::UNITS_PER_BYTE,
            vertical_spacing: 1,
            slot_capacity: DEFAULT_SLOT_CAPACITY,
            spacing_factor: DEFAULT_SPACING_FACTOR,
            max_probes: DEFAULT_MAX_PROBES,
            label_max_len: DEFAULT_LABEL_MAX_LEN,
            mode: StorageMode::Standard,
            sync_interval_ms: None,
        }
    }
}

impl GridConfig {
    /// An 80x24 character grid
    pub fn terminal() -> Self {
        GridConfig {
            width: 80,
            height: Some(24),
            spacing_factor: 16,
            ..GridConfig::default()
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: GridConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| GridError::InvalidConfig(e.to_string()))
    }

    /// Grid height after resolving `height` / `buffer_size`
    pub fn resolved_height(&self) -> Result<u32> {
        match (self.height, self.buffer_size) {
            (Some(_), Some(_)) => Err(GridError::InvalidConfig(
                "set either height or buffer_size, not both".to_string(),
            )),
            (Some(height), None) => Ok(height),
            (None, None) => Ok(DEFAULT_HEIGHT),
            (None, Some(buffer_size)) => {
                let per_row = self.bytes_per_row();
                if per_row == 0 {
                    return Err(GridError::InvalidConfig(format!(
                        "width {} cannot hold a single byte",
                        self.width
                    )));
                }
                let too_tall = || {
                    GridError::InvalidConfig(format!(
                        "buffer_size {} needs a grid taller than u32::MAX",
                        buffer_size
                    ))
                };
                let rows = buffer_size.max(1).div_ceil(per_row) as u64;
                let height = (rows - 1)
                    .checked_mul(self.vertical_spacing as u64)
                    .and_then(|span| span.checked_add(self.origin_y as u64 + 1))
                    .ok_or_else(too_tall)?;
                u32::try_from(height).map_err(|_| too_tall())
            }
        }
    }

    fn bytes_per_row(&self) -> usize {
        let usable = self.width.saturating_sub(self.origin_x);
        if usable < crate::codec::UNITS_PER_BYTE || self.horizontal_spacing == 0 {
            return 0;
        }
        ((usable - crate::codec::UNITS_PER_BYTE) / self.horizontal_spacing + 1) as usize
    }

    /// Byte layout described by this configuration
    pub fn layout(&self) -> Result<Layout> {
        Layout::new(
            self.width,
            self.resolved_height()?,
            Position::new(self.origin_x, self.origin_y),
            self.horizontal_spacing,
            self.vertical_spacing,
        )
    }

    pub fn sync_interval(&self) -> Option<Duration> {
        self.sync_interval_ms.map(Duration::from_millis)
    }

    /// Validate all fields
    ///
    /// Checks dimensions, spacings (through [`Layout::new`]) and table limits.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 {
            return Err(GridError::InvalidConfig("width must be non-zero".to_string()));
        }
        if self.resolved_height()? == 0 {
            return Err(GridError::InvalidConfig("height must be non-zero".to_string()));
        }
        self.layout()?;

        if self.slot_capacity == 0 {
            return Err(GridError::InvalidConfig(
                "slot_capacity must be non-zero".to_string(),
            ));
        }
        if self.spacing_factor == 0 {
            return Err(GridError::InvalidConfig(
                "spacing_factor must be non-zero".to_string(),
            ));
        }
        if self.max_probes == 0 {
            return Err(GridError::InvalidConfig("max_probes must be non-zero".to_string()));
        }
        if self.label_max_len == 0 {
            return Err(GridError::InvalidConfig(
                "label_max_len must be non-zero".to_string(),
            ));
        }
        if self.sync_interval_ms == Some(0) {
            return Err(GridError::InvalidConfig(
                "sync_interval_ms must be non-zero when set".to_string(),
            ));
        }
        if self.sync_interval_ms.is_some() && self.mode != StorageMode::Redundant {
            tracing::warn!("sync_interval_ms ignored outside redundant mode");
        }
        Ok(())
    }
}
