//! Address translation between grid positions and scalar addresses
//!
//! An [`Address`] packs a 2-D position into a `u64` with `y` in the high
//! half and `x` in the low half, so every cell of a `u32 × u32` grid is
//! addressable without overflow. A [`Layout`] maps linear byte indices onto
//! the grid row-major from a configurable origin.

use crate::codec::UNITS_PER_BYTE;
use crate::error::{GridError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A cell position in the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: u32,
    pub y: u32,
}

impl Position {
    pub const fn new(x: u32, y: u32) -> Self {
        Position { x, y }
    }

    /// Position `dx` cells to the right on the same row
    pub const fn offset(self, dx: u32) -> Self {
        Position {
            x: self.x.saturating_add(dx),
            y: self.y,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Packed scalar address of a grid position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(u64);

impl Address {
    /// Pack a position into an address
    pub const fn from_position(position: Position) -> Self {
        Address(((position.y as u64) << 32) | position.x as u64)
    }

    pub const fn from_xy(x: u32, y: u32) -> Self {
        Self::from_position(Position::new(x, y))
    }

    /// Wrap a raw scalar (e.g. one received from a caller)
    pub const fn from_raw(raw: u64) -> Self {
        Address(raw)
    }

    /// Unpack the address back into its position
    pub const fn position(self) -> Position {
        Position {
            x: (self.0 & 0xFFFF_FFFF) as u32,
            y: (self.0 >> 32) as u32,
        }
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<Position> for Address {
    fn from(position: Position) -> Self {
        Address::from_position(position)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// Row-major placement of encoded bytes on the grid
///
/// Byte `i` starts at
/// `origin + ((i % bytes_per_row) × h_spacing, (i / bytes_per_row) × v_spacing)`
/// and occupies [`UNITS_PER_BYTE`] cells to the right of that start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Layout {
    width: u32,
    height: u32,
    origin: Position,
    h_spacing: u32,
    v_spacing: u32,
    bytes_per_row: usize,
    rows: usize,
}

impl Layout {
    /// Build a layout, rejecting spacings that would overlap encoded bytes
    pub fn new(
        width: u32,
        height: u32,
        origin: Position,
        h_spacing: u32,
        v_spacing: u32,
    ) -> Result<Self> {
        if h_spacing < UNITS_PER_BYTE {
            return Err(GridError::InvalidConfig(format!(
                "horizontal spacing {} is narrower than a byte footprint ({} units)",
                h_spacing, UNITS_PER_BYTE
            )));
        }
        if v_spacing == 0 {
            return Err(GridError::InvalidConfig(
                "vertical spacing must be at least 1".to_string(),
            ));
        }
        if origin.x >= width || origin.y >= height {
            return Err(GridError::InvalidConfig(format!(
                "origin {} lies outside the {}x{} grid",
                origin, width, height
            )));
        }

        // The last byte on a row only needs its footprint to fit, not the
        // trailing gap.
        let usable_width = width - origin.x;
        let bytes_per_row = if usable_width < UNITS_PER_BYTE {
            0
        } else {
            ((usable_width - UNITS_PER_BYTE) / h_spacing + 1) as usize
        };
        let rows = ((height - origin.y - 1) / v_spacing + 1) as usize;

        if bytes_per_row == 0 {
            return Err(GridError::InvalidConfig(format!(
                "grid width {} leaves no room for a byte after origin x {}",
                width, origin.x
            )));
        }

        Ok(Layout {
            width,
            height,
            origin,
            h_spacing,
            v_spacing,
            bytes_per_row,
            rows,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn origin(&self) -> Position {
        self.origin
    }

    pub fn bytes_per_row(&self) -> usize {
        self.bytes_per_row
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of bytes the grid can hold
    pub fn capacity(&self) -> usize {
        self.bytes_per_row * self.rows
    }

    /// Start position of the footprint for byte `index`
    pub fn byte_index_to_position(&self, index: usize) -> Result<Position> {
        let row = (index / self.bytes_per_row) as u64;
        let col = (index % self.bytes_per_row) as u64;
        let x = self.origin.x as u64 + col * self.h_spacing as u64;
        let y = (self.origin.y as u64).saturating_add(row.saturating_mul(self.v_spacing as u64));

        if x + UNITS_PER_BYTE as u64 > self.width as u64 || y >= self.height as u64 {
            return Err(GridError::OutOfBounds {
                x,
                y,
                width: self.width,
                height: self.height,
            });
        }

        Ok(Position::new(x as u32, y as u32))
    }

    /// Byte index whose footprint starts at `position`, if any
    pub fn position_to_byte_index(&self, position: Position) -> Option<usize> {
        if position.x < self.origin.x || position.y < self.origin.y {
            return None;
        }
        let dx = position.x - self.origin.x;
        let dy = position.y - self.origin.y;
        if dx % self.h_spacing != 0 || dy % self.v_spacing != 0 {
            return None;
        }

        let col = (dx / self.h_spacing) as usize;
        let row = (dy / self.v_spacing) as usize;
        if col >= self.bytes_per_row || row >= self.rows {
            return None;
        }
        Some(row * self.bytes_per_row + col)
    }

    /// Check that bytes `start..start + len` all fit on the grid
    pub fn check_range(&self, start: usize, len: usize) -> Result<()> {
        if len == 0 {
            return Ok(());
        }
        let last = start.checked_add(len - 1).ok_or(GridError::OutOfBounds {
            x: u64::MAX,
            y: u64::MAX,
            width: self.width,
            height: self.height,
        })?;
        // Positions grow monotonically with the index
        self.byte_index_to_position(last).map(|_| ())
    }
}
