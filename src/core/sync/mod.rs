//! Dual-buffer redundancy
//!
//! Redundant mode keeps two persistent replicas. All traffic goes through
//! the active one; [`DualBuffer::sync`] mirrors it into the other. Writes
//! mark the pair dirty until the next sync.

pub mod worker;

pub use worker::SyncWorker;

use crate::error::Result;
use crate::grid::Grid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Replica selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Replica {
    Primary,
    Secondary,
}

impl Replica {
    pub fn other(self) -> Self {
        match self {
            Replica::Primary => Replica::Secondary,
            Replica::Secondary => Replica::Primary,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DualBuffer {
    primary: Grid,
    secondary: Grid,
    active: Replica,
    synced: bool,
    last_sync: Option<DateTime<Utc>>,
    sync_count: u64,
}

impl DualBuffer {
    /// Pair `grid` with a copy of itself
    pub fn new(grid: Grid) -> Self {
        let secondary = grid.clone();
        Self::from_replicas(grid, secondary)
    }

    /// Pair two replicas that already hold identical content
    pub fn from_replicas(primary: Grid, secondary: Grid) -> Self {
        DualBuffer {
            primary,
            secondary,
            active: Replica::Primary,
            synced: true,
            last_sync: None,
            sync_count: 0,
        }
    }

    pub fn active_replica(&self) -> Replica {
        self.active
    }

    pub fn replica(&self, which: Replica) -> &Grid {
        match which {
            Replica::Primary => &self.primary,
            Replica::Secondary => &self.secondary,
        }
    }

    pub fn active(&self) -> &Grid {
        self.replica(self.active)
    }

    /// Mutable access to the active replica; marks the pair out of sync
    pub fn active_mut(&mut self) -> &mut Grid {
        self.synced = false;
        match self.active {
            Replica::Primary => &mut self.primary,
            Replica::Secondary => &mut self.secondary,
        }
    }

    #[cfg(test)]
    pub(crate) fn replica_mut(&mut self, which: Replica) -> &mut Grid {
        self.synced = false;
        match which {
            Replica::Primary => &mut self.primary,
            Replica::Secondary => &mut self.secondary,
        }
    }

    /// Copy the active replica into the inactive one
    pub fn sync(&mut self) -> Result<()> {
        match self.active {
            Replica::Primary => self.secondary.copy_from(&self.primary)?,
            Replica::Secondary => self.primary.copy_from(&self.secondary)?,
        }
        self.synced = true;
        self.last_sync = Some(Utc::now());
        self.sync_count += 1;
        debug!("Synced {:?} into {:?}", self.active, self.active.other());
        Ok(())
    }

    /// Sync, then make the other replica active
    pub fn failover(&mut self) -> Result<Replica> {
        self.sync()?;
        self.active = self.active.other();
        info!("Failed over to {:?} replica", self.active);
        Ok(self.active)
    }

    /// Whether both replicas have the same Merkle root
    pub fn replicas_consistent(&self) -> bool {
        self.primary.digest() == self.secondary.digest()
    }

    pub fn is_synced(&self) -> bool {
        self.synced
    }

    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.last_sync
    }

    pub fn sync_count(&self) -> u64 {
        self.sync_count
    }
}
