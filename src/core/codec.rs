//! Byte ↔ visual pattern codec
//!
//! Each byte is laid out horizontally as
//!
//! ```text
//! [ b7 b6 b5 b4 b3 b2 b1 b0 ]
//! ^ StartMarker            ^ EndMarker
//! ```
//!
//! with bits written most-significant first as `Bit0`/`Bit1` units.
//!
//! These functions are not self-synchronizing: callers must ensure no two
//! threads touch the same footprint at once. `MemoryContext` does this by
//! holding its buffer lock around every call.

use crate::address::Layout;
use crate::error::{GridError, Result};
use crate::grid::Grid;
use crate::unit::VisualUnit;

/// Bits encoded per byte
pub const BITS_PER_BYTE: u32 = 8;

/// Cells occupied by one encoded byte (start marker + bits + end marker)
pub const UNITS_PER_BYTE: u32 = BITS_PER_BYTE + 2;

/// Encode `value` as the byte at `index`
///
/// The whole footprint is bounds-checked before any cell is written, so an
/// out-of-bounds call leaves the grid untouched.
pub fn encode(grid: &mut Grid, layout: &Layout, index: usize, value: u8) -> Result<()> {
    let base = layout.byte_index_to_position(index)?;
    grid.check_span(base, UNITS_PER_BYTE)?;

    grid.set(base, VisualUnit::StartMarker)?;
    for bit in 0..BITS_PER_BYTE {
        let set = value & (0x80 >> bit) != 0;
        grid.set(base.offset(1 + bit), VisualUnit::from_bit(set))?;
    }
    grid.set(base.offset(UNITS_PER_BYTE - 1), VisualUnit::EndMarker)
}

/// Decode the byte at `index`
///
/// A footprint without valid sentinels yields `MarkerMismatch`, never a
/// silent zero.
pub fn decode(grid: &Grid, layout: &Layout, index: usize) -> Result<u8> {
    let base = layout.byte_index_to_position(index)?;
    grid.check_span(base, UNITS_PER_BYTE)?;

    if grid.get(base)? != VisualUnit::StartMarker
        || grid.get(base.offset(UNITS_PER_BYTE - 1))? != VisualUnit::EndMarker
    {
        return Err(GridError::MarkerMismatch {
            index,
            position: base,
        });
    }

    let mut value = 0u8;
    for bit in 0..BITS_PER_BYTE {
        let position = base.offset(1 + bit);
        let unit = grid.get(position)?;
        match unit.as_bit() {
            Some(set) => value = (value << 1) | set as u8,
            None => {
                return Err(GridError::CorruptUnit {
                    position,
                    found: unit as u8,
                })
            }
        }
    }
    Ok(value)
}

/// Encode `data` at consecutive byte indices starting from `start`
pub fn encode_bytes(grid: &mut Grid, layout: &Layout, start: usize, data: &[u8]) -> Result<()> {
    layout.check_range(start, data.len())?;
    for (offset, &byte) in data.iter().enumerate() {
        encode(grid, layout, start + offset, byte)?;
    }
    Ok(())
}

/// Decode `out.len()` bytes starting from byte index `start`
pub fn decode_bytes(grid: &Grid, layout: &Layout, start: usize, out: &mut [u8]) -> Result<()> {
    layout.check_range(start, out.len())?;
    for (offset, slot) in out.iter_mut().enumerate() {
        *slot = decode(grid, layout, start + offset)?;
    }
    Ok(())
}

/// Encode `len` copies of `value` starting from byte index `start`
pub fn fill_bytes(grid: &mut Grid, layout: &Layout, start: usize, len: usize, value: u8) -> Result<()> {
    layout.check_range(start, len)?;
    for index in start..start + len {
        encode(grid, layout, index, value)?;
    }
    Ok(())
}

/// `text` as bytes followed by a `\0` terminator
pub fn terminated(text: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(text.len() + 1);
    bytes.extend_from_slice(text.as_bytes());
    bytes.push(0);
    bytes
}

/// String up to the first `\0` (or the whole slice when there is none)
pub fn until_terminator(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
