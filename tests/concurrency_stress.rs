//! Concurrent readers/writers stress tests

use parking_lot::Mutex;
use pixmem::{Address, GridConfig, GridError, LifecycleState, MemoryContext, StorageMode};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn shared_context(mode: StorageMode) -> Arc<MemoryContext> {
    Arc::new(
        MemoryContext::init(GridConfig {
            width: 320,
            buffer_size: Some(16 * 1024),
            mode,
            ..GridConfig::default()
        })
        .unwrap(),
    )
}

#[test]
fn test_concurrent_allocations_are_unique() {
    let ctx = shared_context(StorageMode::Standard);
    let addrs = Arc::new(Mutex::new(Vec::new()));

    let handles: Vec<_> = (0..8)
        .map(|thread_id| {
            let ctx = ctx.clone();
            let addrs = addrs.clone();
            std::thread::spawn(move || {
                for i in 0..12 {
                    let addr = ctx.alloc(64, &format!("t{}_{}", thread_id, i)).unwrap();
                    addrs.lock().push(addr);
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    let mut addrs = addrs.lock().clone();
    let total = addrs.len();
    addrs.sort();
    addrs.dedup();
    assert_eq!(addrs.len(), total);
    assert_eq!(ctx.table_stats().unwrap().active, 96);
}

#[test]
fn test_8_readers_2_writers() {
    let ctx = shared_context(StorageMode::Standard);

    // Pre-populate
    let addrs: Vec<Address> = (0..16)
        .map(|i| {
            let addr = ctx.alloc(32, &format!("slot{}", i)).unwrap();
            ctx.write(addr, format!("data{:02}", i).as_bytes()).unwrap();
            addr
        })
        .collect();
    let addrs = Arc::new(addrs);
    let integrity_errors = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..10)
        .map(|thread_id| {
            let ctx = ctx.clone();
            let addrs = addrs.clone();
            let integrity_errors = integrity_errors.clone();
            std::thread::spawn(move || {
                if thread_id < 2 {
                    // Writer thread: each writer owns half of the slots
                    for round in 0..200 {
                        let idx = (rand::random::<usize>() % 8) * 2 + thread_id;
                        let payload = format!("w{}r{:03}", thread_id, round);
                        ctx.write(addrs[idx], payload.as_bytes()).unwrap();
                    }
                } else {
                    // Reader thread
                    for _ in 0..500 {
                        let idx = rand::random::<usize>() % addrs.len();
                        match ctx.read_vec(addrs[idx], 6) {
                            Ok(_) => {}
                            Err(GridError::ChecksumMismatch { .. })
                            | Err(GridError::EccMismatch { .. }) => {
                                integrity_errors.fetch_add(1, Ordering::Relaxed);
                            }
                            Err(e) => panic!("unexpected read error: {}", e),
                        }
                    }
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    // A reader never observes a payload torn against its integrity record
    assert_eq!(integrity_errors.load(Ordering::Relaxed), 0);
    let metrics = ctx.metrics();
    assert_eq!(metrics.writes, 16 + 400);
    assert_eq!(metrics.reads, 8 * 500);
    assert_eq!(metrics.failures, 0);
}

#[test]
fn test_transition_during_writes() {
    let ctx = shared_context(StorageMode::Standard);
    let addrs: Vec<Address> = (0..4)
        .map(|i| ctx.alloc(16, &format!("live{}", i)).unwrap())
        .collect();
    let addrs = Arc::new(addrs);

    let writers: Vec<_> = (0..4)
        .map(|thread_id| {
            let ctx = ctx.clone();
            let addrs = addrs.clone();
            std::thread::spawn(move || {
                let mut last = 0u32;
                for round in 0..300u32 {
                    ctx.write(addrs[thread_id], &round.to_le_bytes()).unwrap();
                    last = round;
                }
                last
            })
        })
        .collect();

    std::thread::sleep(Duration::from_millis(1));
    ctx.enter_autonomous_mode().unwrap();

    for (thread_id, h) in writers.into_iter().enumerate() {
        let last = h.join().unwrap();
        let bytes = ctx.read_vec(addrs[thread_id], 4).unwrap();
        assert_eq!(bytes, last.to_le_bytes());
    }
    assert_eq!(ctx.state(), LifecycleState::Autonomous);
}

#[test]
fn test_background_sync_with_concurrent_writers() {
    let ctx = Arc::new(
        MemoryContext::init(GridConfig {
            width: 320,
            buffer_size: Some(8 * 1024),
            mode: StorageMode::Redundant,
            sync_interval_ms: Some(2),
            ..GridConfig::default()
        })
        .unwrap(),
    );
    let addr = ctx.alloc(64, "hot").unwrap();

    let handles: Vec<_> = (0..4)
        .map(|thread_id| {
            let ctx = ctx.clone();
            std::thread::spawn(move || {
                for round in 0..100 {
                    let payload = [thread_id as u8, round as u8];
                    ctx.write(addr, &payload).unwrap();
                    let read = ctx.read_vec(addr, 2).unwrap();
                    assert_eq!(read.len(), 2);
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    ctx.sync().unwrap();
    assert!(ctx.replicas_consistent().unwrap());
    assert_eq!(ctx.metrics().validation_failures, 0);
    ctx.cleanup();
}

#[test]
fn test_read_string_races_free_and_realloc() {
    let ctx = shared_context(StorageMode::Standard);
    let addr = ctx.alloc(32, "churn").unwrap();
    let done = Arc::new(AtomicBool::new(false));

    let churn = {
        let ctx = ctx.clone();
        let done = done.clone();
        std::thread::spawn(move || {
            for i in 0..500 {
                ctx.free(addr).unwrap();
                let (size, text) = if i % 2 == 0 { (8, "short") } else { (32, "a longer payload") };
                assert_eq!(ctx.alloc(size, "churn").unwrap(), addr);
                ctx.write_str(addr, text).unwrap();
            }
            done.store(true, Ordering::Release);
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let ctx = ctx.clone();
            let done = done.clone();
            std::thread::spawn(move || {
                while !done.load(Ordering::Acquire) {
                    match ctx.read_string(addr) {
                        Ok(text) => assert!(
                            ["", "short", "a longer payload"].contains(&text.as_str()),
                            "unexpected text {:?}",
                            text
                        ),
                        Err(GridError::AllocationNotFound(_)) => {}
                        Err(e) => panic!("unexpected read error: {}", e),
                    }
                }
            })
        })
        .collect();

    churn.join().unwrap();
    for r in readers {
        r.join().unwrap();
    }
    assert_eq!(ctx.metrics().checksum_failures, 0);
}
