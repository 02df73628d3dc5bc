//! Fixed-capacity allocation table
//!
//! Slots live in an arena indexed by slot number. Inactive slots sit on a
//! free-list stack, so picking a slot is O(1); an address → slot hash index
//! makes lookups O(1). Region placement still validates the candidate
//! against every active allocation.

use crate::address::{Address, Layout};
use crate::allocator::record::{AllocationRecord, Label};
use crate::config::GridConfig;
use crate::error::{GridError, Result};
use ahash::AHashMap;
use chrono::Utc;
use tracing::{debug, warn};

/// Allocation table usage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableStats {
    pub capacity: usize,
    pub active: usize,
    pub free_slots: usize,
    pub bytes_reserved: usize,
}

/// Registry mapping addresses to grid regions
#[derive(Debug)]
pub struct AllocationTable {
    /// Slot arena; inactive records are kept until their slot is reused
    slots: Vec<Option<AllocationRecord>>,

    /// Free slot stack (top = next slot handed out)
    free_slots: Vec<usize>,

    /// Active address -> slot
    index: AHashMap<Address, usize>,

    spacing_factor: usize,
    max_probes: usize,
    label_max_len: usize,
    layout: Layout,
}

impl AllocationTable {
    pub fn new(
        capacity: usize,
        spacing_factor: usize,
        max_probes: usize,
        label_max_len: usize,
        layout: Layout,
    ) -> Self {
        AllocationTable {
            slots: vec![None; capacity],
            // Reversed so a fresh table hands out slot 0 first
            free_slots: (0..capacity).rev().collect(),
            index: AHashMap::with_capacity(capacity),
            spacing_factor: spacing_factor.max(1),
            max_probes: max_probes.max(1),
            label_max_len,
            layout,
        }
    }

    pub fn from_config(config: &GridConfig, layout: Layout) -> Self {
        Self::new(
            config.slot_capacity,
            config.spacing_factor,
            config.max_probes,
            config.label_max_len,
            layout,
        )
    }

    /// Reserve `size` bytes and return the region's address
    pub fn alloc(&mut self, size: usize, label: &str) -> Result<Address> {
        if size == 0 {
            return Err(GridError::AllocationExhausted(
                "zero-sized allocation".to_string(),
            ));
        }
        let label = Label::new(label, self.label_max_len)?;

        let slot = *self.free_slots.last().ok_or_else(|| {
            GridError::AllocationExhausted(format!("all {} slots are active", self.slots.len()))
        })?;
        let base_unit = self.find_region(slot, size)?;
        self.free_slots.pop();

        let address = Address::from_position(self.layout.byte_index_to_position(base_unit)?);
        let record = AllocationRecord {
            address,
            base_unit,
            size,
            label,
            checksum: 0,
            created: Utc::now(),
            active: true,
            integrity: None,
        };

        debug!(
            "Allocated {} bytes '{}' in slot {} at {} (unit {})",
            size, record.label, slot, address, base_unit
        );
        self.slots[slot] = Some(record);
        self.index.insert(address, slot);
        Ok(address)
    }

    /// Find a free, in-bounds region for `slot`
    ///
    /// The candidate starts at `slot × spacing_factor` (wrapped onto the
    /// grid) and moves one spacing unit per probe. Every candidate is
    /// checked against all active allocations.
    fn find_region(&self, slot: usize, size: usize) -> Result<usize> {
        let capacity = self.layout.capacity();
        if size > capacity {
            return Err(GridError::AllocationExhausted(format!(
                "{} bytes exceeds grid capacity of {} bytes",
                size, capacity
            )));
        }

        let regions = (capacity / self.spacing_factor).max(1);
        let probes = self.max_probes.min(regions);
        let first = slot % regions;

        for probe in 0..probes {
            let base = ((first + probe) % regions) * self.spacing_factor;
            if base + size > capacity {
                continue;
            }
            if !self.overlaps_active(base, size) {
                if probe > 0 {
                    debug!("Slot {} placed after {} probe(s)", slot, probe);
                }
                return Ok(base);
            }
        }

        Err(GridError::AllocationExhausted(format!(
            "no free region for {} bytes after {} probe(s) from slot {}",
            size, probes, slot
        )))
    }

    fn overlaps_active(&self, base: usize, size: usize) -> bool {
        self.records().any(|r| r.overlaps(base, size))
    }

    /// Look up the active record at `address`
    pub fn resolve(&self, address: Address) -> Result<&AllocationRecord> {
        self.index
            .get(&address)
            .and_then(|&slot| self.slots[slot].as_ref())
            .filter(|record| record.active)
            .ok_or(GridError::AllocationNotFound(address.as_u64()))
    }

    pub fn resolve_mut(&mut self, address: Address) -> Result<&mut AllocationRecord> {
        let slot = *self
            .index
            .get(&address)
            .ok_or(GridError::AllocationNotFound(address.as_u64()))?;
        self.slots[slot]
            .as_mut()
            .filter(|record| record.active)
            .ok_or(GridError::AllocationNotFound(address.as_u64()))
    }

    /// Resolve `address` and check that `size` bytes fit in it
    pub fn check_access(&self, address: Address, size: usize) -> Result<&AllocationRecord> {
        let record = self.resolve(address)?;
        if size > record.size {
            return Err(GridError::SizeExceedsAllocation {
                requested: size,
                allocated: record.size,
            });
        }
        Ok(record)
    }

    /// Deactivate the allocation at `address`
    ///
    /// Grid content is left as-is.
    pub fn free(&mut self, address: Address) -> Result<AllocationRecord> {
        let Some(slot) = self.index.remove(&address) else {
            warn!("Free of unknown or inactive address {}", address);
            return Err(GridError::AllocationNotFound(address.as_u64()));
        };

        let record = self.slots[slot]
            .as_mut()
            .ok_or(GridError::AllocationNotFound(address.as_u64()))?;
        record.active = false;
        let freed = record.clone();
        self.free_slots.push(slot);

        debug!("Freed slot {} at {} ({} bytes)", slot, address, freed.size);
        Ok(freed)
    }

    /// Iterate over active records in slot order
    pub fn records(&self) -> impl Iterator<Item = &AllocationRecord> {
        self.slots.iter().flatten().filter(|r| r.active)
    }

    pub fn active_count(&self) -> usize {
        self.index.len()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn stats(&self) -> TableStats {
        TableStats {
            capacity: self.slots.len(),
            active: self.index.len(),
            free_slots: self.free_slots.len(),
            bytes_reserved: self.records().map(|r| r.size).sum(),
        }
    }

    /// Drop every record and return all slots to the free list
    pub fn clear(&mut self) {
        let capacity = self.slots.len();
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.free_slots = (0..capacity).rev().collect();
        self.index.clear();
    }
}
