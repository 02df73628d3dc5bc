//! Core grid memory implementation
//!
//! # Architecture
//!
//! ```text
//!            ┌──────────────────────── MemoryContext ───────────────────────┐
//!  alloc ──▶ │ AllocationTable ──▶ Layout ──▶ codec ──▶ BufferLifecycle     │
//!  write ──▶ │  (Mutex)            (index→xy)  (byte↔units)  (RwLock)        │
//!  read  ──▶ │        └──── IntegrityValidator ────┘     staging │ persistent│
//!            │                                                    └ DualBuffer│
//!            │                               SyncWorker ──▶ sync / validate │
//!            └──────────────────────────────────────────────────────────────┘
//! ```

pub mod address;
pub mod allocator;
pub mod codec;
pub mod config;
pub mod context;
pub mod error;
pub mod grid;
pub mod integrity;
pub mod lifecycle;
pub mod metrics;
pub mod sync;
pub mod unit;

mod integration_tests;

pub use address::{Address, Layout, Position};
pub use context::MemoryContext;
pub use error::{GridError, Result};
pub use unit::VisualUnit;
