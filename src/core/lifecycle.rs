//! Staging → persistent buffer lifecycle
//!
//! ```text
//! Uninitialized ──init──▶ Initialized ──enter_autonomous──▶ Autonomous
//!       ▲                  (staging +       (transition       (persistent
//!       │                   persistent)      in progress)       only)
//!       └──────────────────────── release ◀──────────────────────┘
//! ```
//!
//! While staging exists every write lands in both buffers; reads prefer
//! staging. The transition copies staging into persistent and drops it.
//! There is no way back to staging.

use crate::config::{GridConfig, StorageMode};
use crate::error::{GridError, Result};
use crate::grid::Grid;
use crate::sync::DualBuffer;
use crate::unit::VisualUnit;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleState {
    Uninitialized,
    Initialized,
    TransitionInProgress,
    Autonomous,
}

/// Persistent side of the store
#[derive(Debug, Clone)]
pub enum PersistentStore {
    Single(Grid),
    Dual(DualBuffer),
}

impl PersistentStore {
    pub fn grid(&self) -> &Grid {
        match self {
            PersistentStore::Single(grid) => grid,
            PersistentStore::Dual(dual) => dual.active(),
        }
    }

    pub fn grid_mut(&mut self) -> &mut Grid {
        match self {
            PersistentStore::Single(grid) => grid,
            PersistentStore::Dual(dual) => dual.active_mut(),
        }
    }

    pub fn dual(&self) -> Option<&DualBuffer> {
        match self {
            PersistentStore::Dual(dual) => Some(dual),
            PersistentStore::Single(_) => None,
        }
    }

    pub fn dual_mut(&mut self) -> Option<&mut DualBuffer> {
        match self {
            PersistentStore::Dual(dual) => Some(dual),
            PersistentStore::Single(_) => None,
        }
    }
}

#[derive(Debug)]
pub struct BufferLifecycle {
    state: LifecycleState,
    staging: Option<Grid>,
    persistent: Option<PersistentStore>,
}

impl Default for BufferLifecycle {
    fn default() -> Self {
        BufferLifecycle {
            state: LifecycleState::Uninitialized,
            staging: None,
            persistent: None,
        }
    }
}

impl BufferLifecycle {
    /// Reserve the persistent and staging buffers, both filled with `Free`
    pub fn init(config: &GridConfig) -> Result<Self> {
        let width = config.width;
        let height = config.resolved_height()?;

        let persistent = Grid::new(width, height, VisualUnit::Free)?;
        let persistent = match config.mode {
            StorageMode::Standard => PersistentStore::Single(persistent),
            StorageMode::Redundant => {
                let secondary = Grid::new(width, height, VisualUnit::Free)?;
                PersistentStore::Dual(DualBuffer::from_replicas(persistent, secondary))
            }
        };
        let staging = Grid::new(width, height, VisualUnit::Free)?;

        debug!(
            "Reserved {}x{} staging and persistent buffers ({:?})",
            width, height, config.mode
        );
        Ok(BufferLifecycle {
            state: LifecycleState::Initialized,
            staging: Some(staging),
            persistent: Some(persistent),
        })
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn staging_freed(&self) -> bool {
        self.staging.is_none()
    }

    pub fn is_autonomous(&self) -> bool {
        self.state == LifecycleState::Autonomous
    }

    pub fn ensure_initialized(&self) -> Result<()> {
        match self.state {
            LifecycleState::Uninitialized => Err(GridError::NotInitialized),
            _ => Ok(()),
        }
    }

    /// Buffer reads are served from: staging if present, else persistent
    pub fn authoritative(&self) -> Result<&Grid> {
        self.ensure_initialized()?;
        if let Some(staging) = &self.staging {
            return Ok(staging);
        }
        self.persistent
            .as_ref()
            .map(PersistentStore::grid)
            .ok_or(GridError::NotInitialized)
    }

    /// Apply `op` to every live buffer
    ///
    /// Callers hold the buffer write lock, so staging and persistent are
    /// updated together. `op` must be deterministic; it is run once per
    /// buffer and the first failure stops the sequence.
    pub fn write_with<F>(&mut self, op: F) -> Result<()>
    where
        F: Fn(&mut Grid) -> Result<()>,
    {
        self.ensure_initialized()?;
        let persistent = self.persistent.as_mut().ok_or(GridError::NotInitialized)?;
        op(persistent.grid_mut())?;
        if let Some(staging) = self.staging.as_mut() {
            op(staging)?;
        }
        Ok(())
    }

    /// Copy staging into persistent and release staging
    ///
    /// Returns `false` when the store was already autonomous.
    pub fn enter_autonomous(&mut self) -> Result<bool> {
        self.ensure_initialized()?;
        if self.is_autonomous() {
            info!("Already in autonomous mode; nothing to do");
            return Ok(false);
        }

        self.state = LifecycleState::TransitionInProgress;
        let persistent = self.persistent.as_mut().ok_or(GridError::NotInitialized)?;
        if let Some(staging) = self.staging.as_ref() {
            persistent.grid_mut().copy_from(staging)?;
        }
        if let Some(dual) = persistent.dual_mut() {
            dual.sync()?;
        }

        self.staging = None;
        self.state = LifecycleState::Autonomous;
        info!("Staging buffer released; grid is now autonomous");
        Ok(true)
    }

    pub fn persistent(&self) -> Result<&PersistentStore> {
        self.ensure_initialized()?;
        self.persistent.as_ref().ok_or(GridError::NotInitialized)
    }

    pub fn persistent_mut(&mut self) -> Result<&mut PersistentStore> {
        self.ensure_initialized()?;
        self.persistent.as_mut().ok_or(GridError::NotInitialized)
    }

    /// Drop every buffer and return to `Uninitialized`
    pub fn release(&mut self) {
        if self.state != LifecycleState::Uninitialized {
            debug!("Releasing grid buffers (state {:?})", self.state);
        }
        *self = BufferLifecycle::default();
    }

    #[cfg(test)]
    pub(crate) fn authoritative_mut(&mut self) -> Result<&mut Grid> {
        self.ensure_initialized()?;
        if let Some(staging) = self.staging.as_mut() {
            return Ok(staging);
        }
        self.persistent
            .as_mut()
            .map(PersistentStore::grid_mut)
            .ok_or(GridError::NotInitialized)
    }
}
