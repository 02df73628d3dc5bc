//! Allocation bookkeeping for the grid
//!
//! Strategy:
//! - Fixed number of slots, each handing out one region of the grid
//! - Slot `n` prefers the region starting at byte `n × spacing_factor`
//! - Collisions shift by one spacing unit, re-validated against every active
//!   region, for a bounded number of probes

pub mod record;
pub mod table;

pub use record::{AllocationRecord, Label};
pub use table::{AllocationTable, TableStats};
