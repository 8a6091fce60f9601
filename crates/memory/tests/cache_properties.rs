//! Property tests for cache bounds and block accounting.

use imaging_memory::Arena;
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Op {
    Allocate { line_size: usize, lines: usize },
    ReleaseOldest,
    ClearCache(usize),
    SetBlocksMax(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (1usize..6000, 0usize..40)
            .prop_map(|(line_size, lines)| Op::Allocate { line_size, lines }),
        3 => Just(Op::ReleaseOldest),
        1 => (0usize..20).prop_map(Op::ClearCache),
        1 => (0usize..20).prop_map(Op::SetBlocksMax),
    ]
}

// ---------------------------------------------------------------------------
// Property: blocks_cached <= blocks_max and no block is lost
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn cache_never_exceeds_blocks_max(
        blocks_max in 0usize..20,
        ops in proptest::collection::vec(op_strategy(), 1..40),
    ) {
        let arena = Arena::new();
        arena.set_block_size(4096).unwrap();
        arena.set_blocks_max(blocks_max).unwrap();

        let mut live = Vec::new();
        for op in ops {
            match op {
                Op::Allocate { line_size, lines } => {
                    live.push(arena.allocate_lines(line_size, lines).unwrap());
                }
                Op::ReleaseOldest => {
                    if !live.is_empty() {
                        live.remove(0).release();
                    }
                }
                Op::ClearCache(keep) => {
                    arena.clear_cache(keep);
                    prop_assert!(arena.stats().blocks_cached <= keep);
                }
                Op::SetBlocksMax(max) => arena.set_blocks_max(max).unwrap(),
            }
            prop_assert!(arena.stats().blocks_cached <= arena.blocks_max());
        }

        let outstanding: usize = live
            .iter()
            .map(|image| if image.is_large() { image.lines() } else { image.block_count() })
            .sum();
        let stats = arena.stats();
        prop_assert_eq!(
            stats.allocated_blocks,
            stats.freed_blocks + stats.blocks_cached + outstanding
        );

        drop(live);
        let stats = arena.stats();
        prop_assert_eq!(stats.allocated_blocks, stats.freed_blocks + stats.blocks_cached);
    }

    #[test]
    fn lines_are_independent(line_size in 1usize..3000, lines in 1usize..30) {
        let arena = Arena::new();
        arena.set_block_size(4096).unwrap();

        let mut image = arena.allocate_lines(line_size, lines).unwrap();
        for y in 0..lines {
            image.line_mut(y).unwrap().fill(y as u8);
        }
        for (y, line) in image.iter_lines().enumerate() {
            prop_assert_eq!(line.len(), line_size);
            prop_assert!(line.iter().all(|&b| b == y as u8));
        }
    }
}
