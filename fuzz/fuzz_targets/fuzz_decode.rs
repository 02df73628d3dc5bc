#![no_main]
use libfuzzer_sys::fuzz_target;
use pixmem::core::codec;
use pixmem::{Grid, GridError, Layout, Position, VisualUnit};

// Arbitrary unit tags laid over an 80x4 grid must decode to a value or a
// tagged error, never panic
fuzz_target!(|input: &[u8]| {
    let layout = match Layout::new(80, 4, Position::new(0, 0), 10, 1) {
        Ok(l) => l,
        Err(_) => return,
    };
    let mut grid = match Grid::new(80, 4, VisualUnit::Background) {
        Ok(g) => g,
        Err(_) => return,
    };

    for (i, &tag) in input.iter().take(80 * 4).enumerate() {
        let unit = VisualUnit::from_u8(tag % 8).unwrap_or_default();
        let _ = grid.set(Position::new((i % 80) as u32, (i / 80) as u32), unit);
    }

    for index in 0..layout.capacity() + 2 {
        match codec::decode(&grid, &layout, index) {
            Ok(value) => {
                // A clean decode must survive a re-encode
                let mut copy = grid.clone();
                codec::encode(&mut copy, &layout, index, value).unwrap();
                assert_eq!(codec::decode(&copy, &layout, index).unwrap(), value);
            }
            Err(GridError::MarkerMismatch { .. })
            | Err(GridError::CorruptUnit { .. })
            | Err(GridError::OutOfBounds { .. }) => {}
            Err(e) => panic!("unexpected decode error: {}", e),
        }
    }
});
