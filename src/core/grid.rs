//! Grid buffers: the backing medium for all encoded data
//!
//! A [`Grid`] is a dense row-major array of [`VisualUnit`]s. Buffers are
//! reserved fallibly so that an oversized configuration fails `init`
//! instead of aborting the process.

use crate::address::Position;
use crate::error::{GridError, Result};
use crate::integrity::merkle::{Digest32, MerkleTree};
use crate::unit::VisualUnit;

/// A 2-D buffer of visual units
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    width: u32,
    height: u32,
    cells: Vec<VisualUnit>,
}

impl Grid {
    /// Reserve a `width × height` grid filled with `fill`
    pub fn new(width: u32, height: u32, fill: VisualUnit) -> Result<Self> {
        let units = (width as usize)
            .checked_mul(height as usize)
            .ok_or(GridError::BufferAllocation { units: usize::MAX })?;

        let mut cells = Vec::new();
        cells
            .try_reserve_exact(units)
            .map_err(|_| GridError::BufferAllocation { units })?;
        cells.resize(units, fill);

        Ok(Grid {
            width,
            height,
            cells,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Total number of cells
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    fn out_of_bounds(&self, x: u64, y: u64) -> GridError {
        GridError::OutOfBounds {
            x,
            y,
            width: self.width,
            height: self.height,
        }
    }

    fn index(&self, position: Position) -> Result<usize> {
        if position.x >= self.width || position.y >= self.height {
            return Err(self.out_of_bounds(position.x as u64, position.y as u64));
        }
        Ok(position.y as usize * self.width as usize + position.x as usize)
    }

    pub fn get(&self, position: Position) -> Result<VisualUnit> {
        Ok(self.cells[self.index(position)?])
    }

    pub fn set(&mut self, position: Position, unit: VisualUnit) -> Result<()> {
        let idx = self.index(position)?;
        self.cells[idx] = unit;
        Ok(())
    }

    /// Check that a horizontal run of `len` cells starting at `start` fits
    pub fn check_span(&self, start: Position, len: u32) -> Result<()> {
        let end = start.x as u64 + len as u64;
        if end > self.width as u64 || start.y >= self.height {
            return Err(self.out_of_bounds(end.saturating_sub(1), start.y as u64));
        }
        Ok(())
    }

    /// Cells of row `y`
    pub fn row(&self, y: u32) -> Option<&[VisualUnit]> {
        if y >= self.height {
            return None;
        }
        let start = y as usize * self.width as usize;
        Some(&self.cells[start..start + self.width as usize])
    }

    pub fn fill(&mut self, unit: VisualUnit) {
        self.cells.fill(unit);
    }

    /// Overwrite this grid with the contents of `source`, cell by cell
    pub fn copy_from(&mut self, source: &Grid) -> Result<()> {
        if self.width != source.width || self.height != source.height {
            return Err(GridError::InvalidConfig(format!(
                "cannot copy a {}x{} grid into a {}x{} grid",
                source.width, source.height, self.width, self.height
            )));
        }
        self.cells.copy_from_slice(&source.cells);
        Ok(())
    }

    /// Merkle tree over the unit tags of each row
    pub fn merkle_tree(&self) -> MerkleTree {
        let width = self.width as usize;
        MerkleTree::build(self.cells.chunks(width.max(1)).map(|row| {
            row.iter().map(|unit| *unit as u8).collect::<Vec<u8>>()
        }))
    }

    /// Merkle root over all rows
    pub fn digest(&self) -> Option<Digest32> {
        self.merkle_tree().root()
    }

    /// Render the first `rows` rows as text, one line per row
    pub fn render_rows(&self, rows: u32) -> String {
        let rows = rows.min(self.height);
        let mut out = String::with_capacity((self.width as usize + 1) * rows as usize);
        for y in 0..rows {
            if let Some(row) = self.row(y) {
                out.extend(row.iter().map(|unit| unit.glyph()));
                out.push('\n');
            }
        }
        out
    }
}
