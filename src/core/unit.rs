use crate::error::{GridError, Result};
use serde::{Deserialize, Serialize};

/// Symbols a grid cell can hold
///
/// A visual unit is a symbol, not a color. [`VisualUnit::glyph`] gives the
/// character used when the grid is dumped for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum VisualUnit {
    /// Untouched cell
    Background = 0,
    /// Encoded `0` bit
    Bit0 = 1,
    /// Encoded `1` bit
    Bit1 = 2,
    /// Opens an encoded byte
    StartMarker = 3,
    /// Closes an encoded byte
    EndMarker = 4,
    /// Marks an address anchor
    AddressMarker = 5,
    /// Cell available for encoding (initial buffer fill)
    #[default]
    Free = 6,
    /// Cell withheld from encoding
    Reserved = 7,
}

impl VisualUnit {
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(VisualUnit::Background),
            1 => Ok(VisualUnit::Bit0),
            2 => Ok(VisualUnit::Bit1),
            3 => Ok(VisualUnit::StartMarker),
            4 => Ok(VisualUnit::EndMarker),
            5 => Ok(VisualUnit::AddressMarker),
            6 => Ok(VisualUnit::Free),
            7 => Ok(VisualUnit::Reserved),
            _ => Err(GridError::InvalidUnit(value)),
        }
    }

    /// Canonical symbol for a single bit
    pub const fn from_bit(bit: bool) -> Self {
        if bit {
            VisualUnit::Bit1
        } else {
            VisualUnit::Bit0
        }
    }

    /// Bit value carried by this unit, if it is a bit symbol
    pub const fn as_bit(self) -> Option<bool> {
        match self {
            VisualUnit::Bit0 => Some(false),
            VisualUnit::Bit1 => Some(true),
            _ => None,
        }
    }

    /// Rendering character for terminal dumps
    pub const fn glyph(self) -> char {
        match self {
            VisualUnit::Background => '.',
            VisualUnit::Bit0 => '0',
            VisualUnit::Bit1 => '1',
            VisualUnit::StartMarker => '[',
            VisualUnit::EndMarker => ']',
            VisualUnit::AddressMarker => '@',
            VisualUnit::Free => ' ',
            VisualUnit::Reserved => '#',
        }
    }
}
