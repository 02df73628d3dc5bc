//! The memory context: aggregate root over table, buffers and validator
//!
//! Locking: the allocation table sits behind a `Mutex`, the buffers behind an
//! `RwLock`, and every path that needs both takes the table first. Writes hold
//! the table lock across the buffer write so a payload and its integrity
//! record always change together. Reads snapshot the record, take the buffer
//! read lock, then release the table so concurrent reads only share the
//! buffer lock.

use crate::address::{Address, Layout};
use crate::allocator::{AllocationRecord, AllocationTable, TableStats};
use crate::codec;
use crate::config::{GridConfig, StorageMode};
use crate::error::{GridError, Result};
use crate::integrity::merkle::Digest32;
use crate::integrity::{IntegrityStrategy, IntegrityValidator};
use crate::lifecycle::{BufferLifecycle, LifecycleState};
use crate::metrics::{Metrics, MetricsSnapshot, OpKind};
use crate::sync::{DualBuffer, Replica, SyncWorker};
use parking_lot::{Mutex, RwLock};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// State shared with the background worker
#[derive(Debug)]
struct Shared {
    config: GridConfig,
    layout: Layout,
    table: Mutex<AllocationTable>,
    buffers: RwLock<BufferLifecycle>,
    validator: IntegrityValidator,
    metrics: Metrics,
}

impl Shared {
    /// One background pass: sync a dirty pair, then check consistency
    fn background_tick(&self) {
        {
            let mut buffers = self.buffers.write();
            let Ok(store) = buffers.persistent_mut() else {
                return;
            };
            let Some(dual) = store.dual_mut() else {
                return;
            };
            if !dual.is_synced() {
                match dual.sync() {
                    Ok(()) => self.metrics.record_background_sync(),
                    Err(e) => warn!("Background sync failed: {}", e),
                }
            }
        }

        let buffers = self.buffers.read();
        let consistent = buffers
            .persistent()
            .ok()
            .and_then(|store| store.dual())
            .map(|dual| !dual.is_synced() || dual.replicas_consistent());
        if consistent == Some(false) {
            self.metrics.record_validation_failure();
            warn!("Replicas diverged after sync");
        }
    }

    fn with_dual<T>(&self, op: impl FnOnce(&mut DualBuffer) -> Result<T>) -> Result<T> {
        let mut buffers = self.buffers.write();
        let dual = buffers.persistent_mut()?.dual_mut().ok_or_else(|| {
            GridError::InvalidConfig("replica operations require redundant mode".to_string())
        })?;
        op(dual)
    }
}

/// A grid-backed memory store
///
/// All operations take `&self`; the context is `Send + Sync` and can be
/// shared across threads behind an `Arc`.
///
/// # Example
///
/// ```
/// use pixmem::{GridConfig, MemoryContext};
///
/// # fn main() -> pixmem::Result<()> {
/// let ctx = MemoryContext::init(GridConfig::terminal())?;
/// let addr = ctx.alloc(16, "greeting")?;
/// ctx.write(addr, b"HELLO")?;
/// ctx.enter_autonomous_mode()?;
///
/// let mut buf = [0u8; 6];
/// ctx.read(addr, &mut buf)?;
/// assert_eq!(&buf, b"HELLO\0");
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct MemoryContext {
    shared: Arc<Shared>,
    worker: Mutex<Option<SyncWorker>>,
}

impl MemoryContext {
    /// Reserve buffers and build a context with the placeholder integrity strategy
    pub fn init(config: GridConfig) -> Result<Self> {
        Self::init_with_validator(config, IntegrityValidator::placeholder())
    }

    /// Build a context with a custom integrity strategy
    pub fn with_integrity(config: GridConfig, strategy: Arc<dyn IntegrityStrategy>) -> Result<Self> {
        Self::init_with_validator(config, IntegrityValidator::new(strategy))
    }

    fn init_with_validator(config: GridConfig, validator: IntegrityValidator) -> Result<Self> {
        config.validate()?;
        let layout = config.layout()?;
        let buffers = BufferLifecycle::init(&config)?;
        let table = AllocationTable::from_config(&config, layout);

        info!(
            "Initialized {}x{} grid: {} byte capacity, {} slots, {:?} mode, integrity {}",
            layout.width(),
            layout.height(),
            layout.capacity(),
            config.slot_capacity,
            config.mode,
            validator.strategy_name()
        );

        let shared = Arc::new(Shared {
            config,
            layout,
            table: Mutex::new(table),
            buffers: RwLock::new(buffers),
            validator,
            metrics: Metrics::new(),
        });

        let worker = match (shared.config.mode, shared.config.sync_interval()) {
            (StorageMode::Redundant, Some(interval)) => {
                let weak: Weak<Shared> = Arc::downgrade(&shared);
                Some(SyncWorker::spawn("pixmem-sync", interval, move || {
                    if let Some(shared) = weak.upgrade() {
                        shared.background_tick();
                    }
                })?)
            }
            _ => None,
        };

        Ok(MemoryContext {
            shared,
            worker: Mutex::new(worker),
        })
    }

    pub fn config(&self) -> &GridConfig {
        &self.shared.config
    }

    pub fn layout(&self) -> &Layout {
        &self.shared.layout
    }

    pub fn state(&self) -> LifecycleState {
        self.shared.buffers.read().state()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    /// Reserve `size` bytes; the region is formatted with encoded zeros
    pub fn alloc(&self, size: usize, label: &str) -> Result<Address> {
        self.shared
            .metrics
            .record(OpKind::Alloc, self.alloc_inner(size, label))
    }

    fn alloc_inner(&self, size: usize, label: &str) -> Result<Address> {
        let mut table = self.shared.table.lock();
        let mut buffers = self.shared.buffers.write();
        buffers.ensure_initialized()?;

        let address = table.alloc(size, label)?;
        let base = table.resolve(address)?.base_unit;
        let layout = &self.shared.layout;
        if let Err(e) = buffers.write_with(|grid| codec::fill_bytes(grid, layout, base, size, 0)) {
            rollback_alloc(&mut table, address);
            return Err(e);
        }
        Ok(address)
    }

    /// Release the allocation at `address`; grid content is left in place
    pub fn free(&self, address: Address) -> Result<()> {
        self.shared
            .metrics
            .record(OpKind::Free, self.free_inner(address))
    }

    fn free_inner(&self, address: Address) -> Result<()> {
        let mut table = self.shared.table.lock();
        self.shared.buffers.read().ensure_initialized()?;
        table.free(address).map(|_| ())
    }

    /// Write `data` at the start of the allocation at `address`
    ///
    /// Nothing is written when `data` is larger than the allocation.
    pub fn write(&self, address: Address, data: &[u8]) -> Result<()> {
        self.shared
            .metrics
            .record(OpKind::Write, self.write_inner(address, data))
    }

    fn write_inner(&self, address: Address, data: &[u8]) -> Result<()> {
        let mut table = self.shared.table.lock();
        let mut buffers = self.shared.buffers.write();
        buffers.ensure_initialized()?;

        let record = table.check_access(address, data.len())?;
        let base = record.base_unit;
        let sealed = self.shared.validator.seal(data, record.integrity.as_ref());

        let layout = &self.shared.layout;
        buffers.write_with(|grid| codec::encode_bytes(grid, layout, base, data))?;

        let record = table.resolve_mut(address)?;
        record.checksum = sealed.checksum;
        record.integrity = Some(sealed);

        self.shared.metrics.add_bytes_written(data.len());
        Ok(())
    }

    /// Read `buf.len()` bytes from the start of the allocation at `address`
    ///
    /// The last written payload is verified even when `buf` covers only part
    /// of it.
    pub fn read(&self, address: Address, buf: &mut [u8]) -> Result<()> {
        let result = self
            .read_inner(address, Some(buf.len()))
            .map(|bytes| buf.copy_from_slice(&bytes));
        self.shared.metrics.record(OpKind::Read, result)
    }

    /// Decode `len` bytes, or the whole allocation when `len` is `None`
    ///
    /// The record is resolved and decoded under one table lock.
    fn read_inner(&self, address: Address, len: Option<usize>) -> Result<Vec<u8>> {
        let table = self.shared.table.lock();
        let buffers = self.shared.buffers.read();
        buffers.ensure_initialized()?;

        let record = match len {
            Some(len) => table.check_access(address, len)?,
            None => table.resolve(address)?,
        };
        let len = len.unwrap_or(record.size);
        let base = record.base_unit;
        let integrity = record.integrity;
        drop(table);

        let written = integrity.map_or(0, |r| r.len);
        let mut decoded = vec![0u8; written.max(len)];
        codec::decode_bytes(buffers.authoritative()?, &self.shared.layout, base, &mut decoded)?;
        drop(buffers);

        if let Some(integrity) = integrity {
            self.shared.validator.verify(&decoded[..written], &integrity)?;
        }

        decoded.truncate(len);
        self.shared.metrics.add_bytes_read(len);
        Ok(decoded)
    }

    pub fn read_vec(&self, address: Address, len: usize) -> Result<Vec<u8>> {
        self.shared
            .metrics
            .record(OpKind::Read, self.read_inner(address, Some(len)))
    }

    /// Write `text` plus a `\0` terminator
    pub fn write_str(&self, address: Address, text: &str) -> Result<()> {
        self.write(address, &codec::terminated(text))
    }

    /// Read the allocation as a `\0`-terminated string
    pub fn read_string(&self, address: Address) -> Result<String> {
        let result = self
            .read_inner(address, None)
            .map(|bytes| codec::until_terminator(&bytes));
        self.shared.metrics.record(OpKind::Read, result)
    }

    /// Encode one byte at a raw byte index, bypassing the allocation table
    pub fn encode_unit(&self, index: usize, value: u8) -> Result<()> {
        let result = {
            let mut buffers = self.shared.buffers.write();
            let layout = &self.shared.layout;
            buffers.write_with(|grid| codec::encode(grid, layout, index, value))
        };
        self.shared.metrics.record(OpKind::Codec, result)
    }

    /// Decode one byte at a raw byte index
    pub fn decode_unit(&self, index: usize) -> Result<u8> {
        let result = {
            let buffers = self.shared.buffers.read();
            buffers
                .authoritative()
                .and_then(|grid| codec::decode(grid, &self.shared.layout, index))
        };
        self.shared.metrics.record(OpKind::Codec, result)
    }

    /// Move all data into the persistent buffer and release staging
    ///
    /// Irreversible. Calling it again once autonomous is a no-op.
    pub fn enter_autonomous_mode(&self) -> Result<()> {
        let result = self.shared.buffers.write().enter_autonomous();
        self.shared
            .metrics
            .record(OpKind::Transition, result.map(|_| ()))
    }

    /// Mirror the active replica into the inactive one (redundant mode)
    pub fn sync(&self) -> Result<()> {
        let result = self.shared.with_dual(|dual| dual.sync());
        self.shared.metrics.record(OpKind::Sync, result)
    }

    /// Sync, then switch traffic to the other replica (redundant mode)
    pub fn failover(&self) -> Result<Replica> {
        let result = self.shared.with_dual(|dual| dual.failover());
        self.shared.metrics.record(OpKind::Sync, result)
    }

    /// Compare replica Merkle roots (redundant mode)
    pub fn replicas_consistent(&self) -> Result<bool> {
        self.shared.with_dual(|dual| Ok(dual.replicas_consistent()))
    }

    /// Merkle root of the buffer reads are served from
    pub fn grid_digest(&self) -> Result<Option<Digest32>> {
        Ok(self.shared.buffers.read().authoritative()?.digest())
    }

    /// Text dump of the first `rows` rows of the authoritative buffer
    pub fn render_rows(&self, rows: u32) -> Result<String> {
        Ok(self.shared.buffers.read().authoritative()?.render_rows(rows))
    }

    /// Copy of the active record at `address`
    pub fn allocation(&self, address: Address) -> Result<AllocationRecord> {
        let table = self.shared.table.lock();
        self.shared.buffers.read().ensure_initialized()?;
        table.resolve(address).cloned()
    }

    /// Copies of all active records in slot order
    pub fn allocations(&self) -> Result<Vec<AllocationRecord>> {
        let table = self.shared.table.lock();
        self.shared.buffers.read().ensure_initialized()?;
        Ok(table.records().cloned().collect())
    }

    pub fn table_stats(&self) -> Result<TableStats> {
        let table = self.shared.table.lock();
        self.shared.buffers.read().ensure_initialized()?;
        Ok(table.stats())
    }

    /// Stop the background worker and release every buffer
    ///
    /// Idempotent; later operations fail with `NotInitialized`.
    pub fn cleanup(&self) {
        let worker = self.worker.lock().take();
        if let Some(mut worker) = worker {
            worker.stop();
        }

        let mut table = self.shared.table.lock();
        let mut buffers = self.shared.buffers.write();
        if buffers.state() == LifecycleState::Uninitialized {
            return;
        }
        table.clear();
        buffers.release();
        info!("Memory context cleaned up");
    }

    #[cfg(test)]
    pub(crate) fn with_authoritative_grid<T>(
        &self,
        op: impl FnOnce(&mut crate::grid::Grid) -> Result<T>,
    ) -> Result<T> {
        op(self.shared.buffers.write().authoritative_mut()?)
    }
}

/// Undo a table reservation whose region could not be formatted
fn rollback_alloc(table: &mut AllocationTable, address: Address) {
    if let Err(e) = table.free(address) {
        warn!("Rollback of allocation {} failed: {}", address, e);
    }
}

impl Drop for MemoryContext {
    fn drop(&mut self) {
        debug!("Dropping memory context");
        self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terminal() -> MemoryContext {
        MemoryContext::init(GridConfig::terminal()).unwrap()
    }

    #[test]
    fn test_context_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MemoryContext>();
    }

    #[test]
    fn test_alloc_formats_region() {
        let ctx = terminal();
        let addr = ctx.alloc(16, "zeros").unwrap();
        assert_eq!(ctx.read_vec(addr, 16).unwrap(), vec![0u8; 16]);
    }

    #[test]
    fn test_write_read() {
        let ctx = terminal();
        let addr = ctx.alloc(16, "x").unwrap();
        ctx.write(addr, b"HELLO").unwrap();
        assert_eq!(ctx.read_vec(addr, 6).unwrap(), b"HELLO\0");
        // Partial reads still verify the whole payload
        assert_eq!(ctx.read_vec(addr, 2).unwrap(), b"HE");

        let record = ctx.allocation(addr).unwrap();
        assert_eq!(record.checksum, crc32fast::hash(b"HELLO"));
        assert_eq!(record.integrity.unwrap().version, 1);
    }

    #[test]
    fn test_rewrite_bumps_version() {
        let ctx = terminal();
        let addr = ctx.alloc(16, "x").unwrap();
        ctx.write(addr, b"first").unwrap();
        ctx.write(addr, b"second").unwrap();
        assert_eq!(ctx.allocation(addr).unwrap().integrity.unwrap().version, 2);
        assert_eq!(ctx.read_string(addr).unwrap(), "second");
    }

    #[test]
    fn test_string_helpers() {
        let ctx = terminal();
        let addr = ctx.alloc(32, "s").unwrap();
        ctx.write_str(addr, "grid").unwrap();
        assert_eq!(ctx.read_string(addr).unwrap(), "grid");
        assert_eq!(ctx.read_vec(addr, 5).unwrap(), b"grid\0");
    }

    #[test]
    fn test_read_string_after_reuse_with_smaller_size() {
        let ctx = terminal();
        let addr = ctx.alloc(32, "long").unwrap();
        ctx.write_str(addr, "a much longer string").unwrap();
        ctx.free(addr).unwrap();

        let reused = ctx.alloc(8, "short").unwrap();
        assert_eq!(reused, addr);
        ctx.write_str(reused, "tiny").unwrap();
        assert_eq!(ctx.read_string(reused).unwrap(), "tiny");
        assert_eq!(ctx.metrics().reads, 1);
    }

    #[test]
    fn test_rollback_alloc_releases_slot() {
        let ctx = terminal();
        let addr = ctx.alloc(8, "x").unwrap();
        {
            let mut table = ctx.shared.table.lock();
            rollback_alloc(&mut table, addr);
            assert_eq!(table.active_count(), 0);
            // Second rollback only logs
            rollback_alloc(&mut table, addr);
            assert_eq!(table.active_count(), 0);
        }
        assert_eq!(ctx.alloc(8, "y").unwrap(), addr);
    }

    #[test]
    fn test_size_enforcement_leaves_grid_untouched() {
        let ctx = terminal();
        let addr = ctx.alloc(8, "small").unwrap();
        let before = ctx.grid_digest().unwrap();
        assert!(matches!(
            ctx.write(addr, &[0xFF; 9]),
            Err(GridError::SizeExceedsAllocation {
                requested: 9,
                allocated: 8
            })
        ));
        assert_eq!(ctx.grid_digest().unwrap(), before);
        assert!(ctx.allocation(addr).unwrap().integrity.is_none());
    }

    #[test]
    fn test_unknown_address() {
        let ctx = terminal();
        let bogus = Address::from_xy(1, 1);
        assert!(matches!(
            ctx.write(bogus, b"x"),
            Err(GridError::AllocationNotFound(_))
        ));
        let mut buf = [0u8; 1];
        assert!(matches!(
            ctx.read(bogus, &mut buf),
            Err(GridError::AllocationNotFound(_))
        ));
        assert!(matches!(ctx.free(bogus), Err(GridError::AllocationNotFound(_))));
    }

    #[test]
    fn test_free_keeps_content() {
        let ctx = terminal();
        let addr = ctx.alloc(16, "x").unwrap();
        ctx.write(addr, b"AB").unwrap();
        let base = ctx.allocation(addr).unwrap().base_unit;
        ctx.free(addr).unwrap();
        assert_eq!(ctx.decode_unit(base).unwrap(), b'A');
        assert!(ctx.allocation(addr).is_err());
        assert!(ctx.allocations().unwrap().is_empty());
    }

    #[test]
    fn test_raw_codec_access() {
        let ctx = terminal();
        ctx.encode_unit(0, 0xA5).unwrap();
        assert_eq!(ctx.decode_unit(0).unwrap(), 0xA5);
        assert!(matches!(
            ctx.decode_unit(1),
            Err(GridError::MarkerMismatch { index: 1, .. })
        ));
        assert!(matches!(
            ctx.encode_unit(192, 1),
            Err(GridError::OutOfBounds { .. })
        ));
        assert!(ctx.render_rows(1).unwrap().starts_with("[10100101]"));
    }

    #[test]
    fn test_transition_state() {
        let ctx = terminal();
        assert_eq!(ctx.state(), LifecycleState::Initialized);
        ctx.enter_autonomous_mode().unwrap();
        assert_eq!(ctx.state(), LifecycleState::Autonomous);
        ctx.enter_autonomous_mode().unwrap();
        assert_eq!(ctx.state(), LifecycleState::Autonomous);
    }

    #[test]
    fn test_replica_ops_need_redundant_mode() {
        let ctx = terminal();
        assert!(matches!(ctx.sync(), Err(GridError::InvalidConfig(_))));
        assert!(matches!(ctx.failover(), Err(GridError::InvalidConfig(_))));
    }

    #[test]
    fn test_redundant_failover_keeps_data() {
        let config = GridConfig {
            mode: StorageMode::Redundant,
            ..GridConfig::terminal()
        };
        let ctx = MemoryContext::init(config).unwrap();
        let addr = ctx.alloc(16, "r").unwrap();
        ctx.write(addr, b"mirror").unwrap();
        ctx.enter_autonomous_mode().unwrap();

        assert!(ctx.replicas_consistent().unwrap());
        assert_eq!(ctx.failover().unwrap(), Replica::Secondary);
        assert_eq!(ctx.read_vec(addr, 6).unwrap(), b"mirror");
    }

    #[test]
    fn test_cleanup_is_idempotent() {
        let ctx = terminal();
        let addr = ctx.alloc(8, "x").unwrap();
        ctx.cleanup();
        ctx.cleanup();
        assert_eq!(ctx.state(), LifecycleState::Uninitialized);
        assert!(matches!(ctx.alloc(8, "y"), Err(GridError::NotInitialized)));
        assert!(matches!(ctx.write(addr, b"x"), Err(GridError::NotInitialized)));
        assert!(matches!(ctx.decode_unit(0), Err(GridError::NotInitialized)));
        assert!(matches!(
            ctx.enter_autonomous_mode(),
            Err(GridError::NotInitialized)
        ));
        assert!(matches!(ctx.table_stats(), Err(GridError::NotInitialized)));
    }
}
