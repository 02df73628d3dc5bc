#![no_main]
use libfuzzer_sys::{fuzz_target, arbitrary::{Arbitrary, Unstructured}};
use pixmem::{Address, GridConfig, GridError, MemoryContext};

#[derive(Debug, Arbitrary)]
enum Op {
    Alloc { size: u8 },
    Free { slot: u8 },
    Write { slot: u8, data: Vec<u8> },
    Read { slot: u8, len: u8 },
    Raw { index: u8, value: u8 },
    Transition,
}

// Random operation sequences must never panic or report integrity errors
// unless raw codec writes touched allocated bytes
fuzz_target!(|input: &[u8]| {
    let mut u = Unstructured::new(input);

    let ops: Vec<Op> = match u.arbitrary() {
        Ok(ops) => ops,
        Err(_) => return,
    };

    let ctx = match MemoryContext::init(GridConfig::terminal()) {
        Ok(c) => c,
        Err(_) => return,
    };
    let mut addrs: Vec<Address> = Vec::new();
    let mut raw_writes = false;

    for op in ops.iter().take(64) {
        match op {
            Op::Alloc { size } => {
                if let Ok(addr) = ctx.alloc(*size as usize, "fuzz") {
                    addrs.push(addr);
                }
            }
            Op::Free { slot } => {
                if !addrs.is_empty() {
                    let addr = addrs.remove(*slot as usize % addrs.len());
                    let _ = ctx.free(addr);
                }
            }
            Op::Write { slot, data } => {
                if let Some(addr) = addrs.get(*slot as usize % addrs.len().max(1)) {
                    let _ = ctx.write(*addr, data);
                }
            }
            Op::Read { slot, len } => {
                if let Some(addr) = addrs.get(*slot as usize % addrs.len().max(1)) {
                    match ctx.read_vec(*addr, *len as usize) {
                        Err(GridError::ChecksumMismatch { .. })
                        | Err(GridError::EccMismatch { .. }) if !raw_writes => {
                            panic!("integrity failure without corruption")
                        }
                        _ => {}
                    }
                }
            }
            Op::Raw { index, value } => {
                raw_writes = true;
                let _ = ctx.encode_unit(*index as usize, *value);
            }
            Op::Transition => {
                let _ = ctx.enter_autonomous_mode();
            }
        }
    }
});
