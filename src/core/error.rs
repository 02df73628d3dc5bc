use crate::core::address::Position;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GridError {
    #[error("Position ({x}, {y}) is outside the {width}x{height} grid")]
    OutOfBounds {
        x: u64,
        y: u64,
        width: u32,
        height: u32,
    },

    #[error("Allocation exhausted: {0}")]
    AllocationExhausted(String),

    #[error("No active allocation at address {0:#018x}")]
    AllocationNotFound(u64),

    #[error("Requested {requested} bytes but allocation holds {allocated}")]
    SizeExceedsAllocation { requested: usize, allocated: usize },

    #[error("Marker mismatch decoding unit {index} at {position}")]
    MarkerMismatch { index: usize, position: Position },

    #[error("Corrupt bit unit at {position}: found tag {found}")]
    CorruptUnit { position: Position, found: u8 },

    #[error("Payload checksum verification failed: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { stored: u32, computed: u32 },

    #[error("Redundancy code verification failed: stored {stored:#010x}, computed {computed:#010x}")]
    EccMismatch { stored: u32, computed: u32 },

    #[error("Memory context is not initialized")]
    NotInitialized,

    #[error("Invalid visual unit tag: {0}")]
    InvalidUnit(u8),

    #[error("Invalid label: {0}")]
    InvalidLabel(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to reserve grid buffer of {units} units")]
    BufferAllocation { units: usize },

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GridError>;
