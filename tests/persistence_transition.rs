//! Staging → persistent transition tests
//!
//! Whatever was readable before the transition must read back identically
//! afterwards, and the transition can only happen once.

use pixmem::{Address, GridConfig, GridError, LifecycleState, MemoryContext, StorageMode};
use proptest::prelude::*;

#[test]
fn test_hello_survives_transition() {
    let ctx = MemoryContext::init(GridConfig::default()).unwrap();
    let addr = ctx.alloc(16, "greeting").unwrap();
    ctx.write(addr, b"HELLO").unwrap();

    ctx.enter_autonomous_mode().unwrap();

    let mut buf = [0xFFu8; 6];
    ctx.read(addr, &mut buf).unwrap();
    assert_eq!(&buf, b"HELLO\0");
}

#[test]
fn test_transition_is_one_way() {
    let ctx = MemoryContext::init(GridConfig::terminal()).unwrap();
    ctx.enter_autonomous_mode().unwrap();
    let digest = ctx.grid_digest().unwrap();

    // Second call is a no-op, not an error
    ctx.enter_autonomous_mode().unwrap();
    assert_eq!(ctx.state(), LifecycleState::Autonomous);
    assert_eq!(ctx.grid_digest().unwrap(), digest);
}

#[test]
fn test_allocation_after_transition() {
    let ctx = MemoryContext::init(GridConfig::terminal()).unwrap();
    ctx.enter_autonomous_mode().unwrap();

    let addr = ctx.alloc(16, "late").unwrap();
    assert_eq!(ctx.read_vec(addr, 4).unwrap(), vec![0; 4]);
    ctx.write_str(addr, "late").unwrap();
    assert_eq!(ctx.read_string(addr).unwrap(), "late");
}

#[test]
fn test_raw_units_survive_transition() {
    let ctx = MemoryContext::init(GridConfig::terminal()).unwrap();
    for index in 100..110 {
        ctx.encode_unit(index, index as u8).unwrap();
    }
    ctx.enter_autonomous_mode().unwrap();
    for index in 100..110 {
        assert_eq!(ctx.decode_unit(index).unwrap(), index as u8);
    }
}

#[test]
fn test_cleanup_after_transition() {
    let ctx = MemoryContext::init(GridConfig::terminal()).unwrap();
    let addr = ctx.alloc(8, "gone").unwrap();
    ctx.enter_autonomous_mode().unwrap();
    ctx.cleanup();

    assert!(matches!(
        ctx.read_vec(addr, 1),
        Err(GridError::NotInitialized)
    ));
    assert!(matches!(
        ctx.render_rows(1),
        Err(GridError::NotInitialized)
    ));
}

fn store(mode: StorageMode) -> MemoryContext {
    MemoryContext::init(GridConfig {
        width: 160,
        buffer_size: Some(2048),
        mode,
        ..GridConfig::default()
    })
    .unwrap()
}

proptest! {
    #[test]
    fn prop_reads_identical_across_transition(
        payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..48), 1..12),
        redundant in any::<bool>()
    ) {
        let mode = if redundant { StorageMode::Redundant } else { StorageMode::Standard };
        let ctx = store(mode);

        let addrs: Vec<Address> = payloads
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let addr = ctx.alloc(48, &format!("law{}", i)).unwrap();
                ctx.write(addr, p).unwrap();
                addr
            })
            .collect();

        let before: Vec<Vec<u8>> = addrs.iter().map(|a| ctx.read_vec(*a, 48).unwrap()).collect();
        ctx.enter_autonomous_mode().unwrap();
        let after: Vec<Vec<u8>> = addrs.iter().map(|a| ctx.read_vec(*a, 48).unwrap()).collect();

        prop_assert_eq!(before, after);
        prop_assert_eq!(ctx.state(), LifecycleState::Autonomous);
    }
}
