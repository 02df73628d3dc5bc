//! # pixmem - Grid-Backed Persistent Memory
//!
//! `pixmem` stores bytes in a 2-D grid of visual units (characters or
//! pixels) instead of ordinary heap memory:
//!
//! - **Visual codec**: each byte becomes `[` + 8 bit symbols + `]`
//! - **Address translation**: linear byte indices map row-major onto the grid
//! - **Allocation table**: fixed slots, free-list, bounded collision probing
//! - **Staging → persistent transition**: bootstrap in a heap buffer, then
//!   release it for good
//! - **Redundancy**: optional dual replicas with a background sync worker
//! - **Integrity**: checksum and redundancy code on every write
//!
//! ## Quick Start
//!
//! ```rust
//! use pixmem::{GridConfig, MemoryContext, Result};
//!
//! # fn main() -> Result<()> {
//! let ctx = MemoryContext::init(GridConfig::terminal())?;
//!
//! let addr = ctx.alloc(16, "greeting")?;
//! ctx.write_str(addr, "HELLO")?;
//!
//! // Drop the staging buffer; the grid is now the only copy
//! ctx.enter_autonomous_mode()?;
//! assert_eq!(ctx.read_string(addr)?, "HELLO");
//! # Ok(())
//! # }
//! ```
//!
//! ## Advanced Usage
//!
//! ```rust
//! use pixmem::{GridMemoryBuilder, Result};
//! use std::time::Duration;
//!
//! # fn main() -> Result<()> {
//! let ctx = GridMemoryBuilder::new()
//!     .width(160)
//!     .buffer_size(4096)
//!     .redundant()
//!     .sync_interval(Duration::from_millis(20))
//!     .build()?;
//!
//! let addr = ctx.alloc(64, "state")?;
//! ctx.write(addr, &[1, 2, 3])?;
//! ctx.failover()?;
//! assert_eq!(ctx.read_vec(addr, 3)?, vec![1, 2, 3]);
//! # Ok(())
//! # }
//! ```

pub mod core;

// Re-export core modules internally so crate:: paths in core still work
#[allow(unused_imports)]
pub(crate) use crate::core::{
    address, allocator, codec, config, context, error, grid, integrity, lifecycle, metrics, sync,
    unit,
};

pub use crate::core::{
    address::{Address, Layout, Position},
    allocator::{AllocationRecord, TableStats},
    codec::UNITS_PER_BYTE,
    config::{GridConfig, StorageMode},
    context::MemoryContext,
    error::{GridError, Result},
    grid::Grid,
    integrity::{
        merkle::{Digest32, MerkleTree},
        IntegrityRecord, IntegrityStrategy, PlaceholderIntegrity,
    },
    lifecycle::LifecycleState,
    metrics::MetricsSnapshot,
    sync::Replica,
    unit::VisualUnit,
};

use std::sync::Arc;
use std::time::Duration;

/// Builder for customizing a [`MemoryContext`]
///
/// Provides a fluent API over [`GridConfig`].
///
/// # Examples
///
/// ```rust
/// use pixmem::GridMemoryBuilder;
///
/// # fn main() -> pixmem::Result<()> {
/// let ctx = GridMemoryBuilder::new()
///     .width(80)
///     .height(24)
///     .spacing_factor(16)
///     .build()?;
/// assert_eq!(ctx.layout().capacity(), 192);
/// # Ok(())
/// # }
/// ```
pub struct GridMemoryBuilder {
    config: GridConfig,
    strategy: Option<Arc<dyn IntegrityStrategy>>,
}

impl GridMemoryBuilder {
    /// Start from the default 1920x1080 configuration
    pub fn new() -> Self {
        GridMemoryBuilder {
            config: GridConfig::default(),
            strategy: None,
        }
    }

    /// Start from an existing configuration
    pub fn from_config(config: GridConfig) -> Self {
        GridMemoryBuilder {
            config,
            strategy: None,
        }
    }

    pub fn width(mut self, width: u32) -> Self {
        self.config.width = width;
        self
    }

    /// Set the grid height (clears any `buffer_size`)
    pub fn height(mut self, height: u32) -> Self {
        self.config.height = Some(height);
        self.config.buffer_size = None;
        self
    }

    /// Size the grid to hold `bytes` bytes (clears any explicit height)
    pub fn buffer_size(mut self, bytes: usize) -> Self {
        self.config.buffer_size = Some(bytes);
        self.config.height = None;
        self
    }

    pub fn origin(mut self, x: u32, y: u32) -> Self {
        self.config.origin_x = x;
        self.config.origin_y = y;
        self
    }

    /// Horizontal and vertical byte spacing in cells
    pub fn spacing(mut self, horizontal: u32, vertical: u32) -> Self {
        self.config.horizontal_spacing = horizontal;
        self.config.vertical_spacing = vertical;
        self
    }

    pub fn slot_capacity(mut self, slots: usize) -> Self {
        self.config.slot_capacity = slots;
        self
    }

    pub fn spacing_factor(mut self, factor: usize) -> Self {
        self.config.spacing_factor = factor;
        self
    }

    pub fn max_probes(mut self, probes: usize) -> Self {
        self.config.max_probes = probes;
        self
    }

    pub fn label_max_len(mut self, len: usize) -> Self {
        self.config.label_max_len = len;
        self
    }

    /// Keep two persistent replicas
    pub fn redundant(mut self) -> Self {
        self.config.mode = StorageMode::Redundant;
        self
    }

    /// Run a background sync at this interval (redundant mode only)
    pub fn sync_interval(mut self, interval: Duration) -> Self {
        self.config.sync_interval_ms = Some(interval.as_millis().max(1) as u64);
        self
    }

    /// Replace the placeholder integrity strategy
    pub fn integrity(mut self, strategy: Arc<dyn IntegrityStrategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    /// Validate the configuration and initialize the context
    pub fn build(self) -> Result<MemoryContext> {
        match self.strategy {
            Some(strategy) => MemoryContext::with_integrity(self.config, strategy),
            None => MemoryContext::init(self.config),
        }
    }
}

impl Default for GridMemoryBuilder {
    fn default() -> Self {
        Self::new()
    }
}
