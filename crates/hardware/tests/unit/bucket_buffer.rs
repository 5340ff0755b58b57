//! Bucket Double Buffer Tests.
//!
//! Verifies fill, swap and drain of the front/back bucket slots, including the terminal
//! bucket, plus randomized invariants over arbitrary fill/drain/swap sequences.

use proptest::prelude::*;
use raystream_core::common::addr::{Address, PhysAddr};
use raystream_core::common::constants::{
    CACHE_BLOCK_SIZE, INVALID_SEGMENT, MAX_RAYS_PER_BUCKET, RAY_BUCKET_SIZE,
};
use raystream_core::protocol::memory::MemoryReturn;
use raystream_core::units::staging::bucket::{BucketDoubleBuffer, Fold};

use crate::common::harness::tagged_bucket;

/// Streams a bucket image into the back slot in cache-block returns from `base`.
fn deliver(buf: &mut BucketDoubleBuffer, segment: u32, num_rays: u8, base: u64) -> Fold {
    let image = tagged_bucket(segment, num_rays).encode();
    let mut last = Fold::Partial;
    for (i, chunk) in image.chunks(CACHE_BLOCK_SIZE).enumerate() {
        let addr = Address::Phys(PhysAddr::new(base + (i * CACHE_BLOCK_SIZE) as u64));
        last = buf.fold_return(&MemoryReturn::new(0, 0, addr, chunk), 4);
    }
    last
}

// ══════════════════════════════════════════════════════════
// 1. Fill and swap
// ══════════════════════════════════════════════════════════

#[test]
fn last_block_completes_the_back_slot() {
    let mut buf = BucketDoubleBuffer::new();
    buf.mark_requested();
    assert_eq!(deliver(&mut buf, 3, 5, 0x4000), Fold::Complete);
    assert!(buf.back().is_full());
    assert_eq!(buf.back().segment(), 3);
    assert_eq!(buf.back().num_rays(), 5);
}

#[test]
fn blocks_land_by_address_in_any_order() {
    let mut buf = BucketDoubleBuffer::new();
    buf.mark_requested();
    let image = tagged_bucket(9, 2).encode();
    let mut chunks: Vec<_> = image.chunks(CACHE_BLOCK_SIZE).enumerate().collect();
    chunks.reverse();
    for (i, chunk) in chunks {
        let addr = Address::Phys(PhysAddr::new((RAY_BUCKET_SIZE * 3 + i * 64) as u64));
        let _ = buf.fold_return(&MemoryReturn::new(0, 0, addr, chunk), 4);
    }
    assert!(buf.back().is_full());
    assert_eq!(buf.back().bytes(), &image[..]);
}

#[test]
fn swap_hands_rays_out_in_order() {
    let mut buf = BucketDoubleBuffer::new();
    buf.mark_requested();
    let _ = deliver(&mut buf, 2, 3, 0);
    assert!(buf.try_swap());

    let taken: Vec<_> = std::iter::from_fn(|| buf.take_ray()).collect();
    let tags: Vec<u8> = taken.iter().map(|(ray, _, _)| ray.0[0]).collect();
    let firsts: Vec<bool> = taken.iter().map(|&(_, _, first)| first).collect();
    assert_eq!(tags, vec![0, 1, 2]);
    assert_eq!(firsts, vec![true, false, false]);
    assert!(taken.iter().all(|&(_, seg, _)| seg == 2));
    assert!(buf.front().is_drained());
}

#[test]
fn swap_refused_while_front_has_rays() {
    let mut buf = BucketDoubleBuffer::new();
    buf.mark_requested();
    let _ = deliver(&mut buf, 1, 2, 0);
    assert!(buf.try_swap());
    buf.mark_requested();
    let _ = deliver(&mut buf, 1, 2, 0);

    assert!(!buf.try_swap(), "front still holds two rays");
    let _ = buf.take_ray();
    assert!(!buf.try_swap());
    let _ = buf.take_ray();
    assert!(buf.try_swap());
}

#[test]
fn termination_fills_one_ray_per_lane() {
    let mut buf = BucketDoubleBuffer::new();
    buf.mark_requested();
    assert_eq!(buf.fold_return(&MemoryReturn::termination(0), 3), Fold::Terminal);
    assert!(buf.try_swap());
    assert_eq!(buf.front().segment(), INVALID_SEGMENT);
    assert_eq!(buf.front().num_rays(), 3);
    assert!(buf.front().is_terminal());
    assert!(!buf.needs_fill(), "no refill until every lane has its terminal ray");
    for _ in 0..3 {
        let (_, segment, _) = buf.take_ray().unwrap();
        assert_eq!(segment, INVALID_SEGMENT);
    }
    assert!(buf.needs_fill());
}

// ══════════════════════════════════════════════════════════
// 2. Randomized invariants
// ══════════════════════════════════════════════════════════

#[derive(Clone, Debug)]
enum Op {
    Fill(u8),
    Terminate,
    Take,
    Swap,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1..=MAX_RAYS_PER_BUCKET as u8).prop_map(Op::Fill),
        Just(Op::Terminate),
        Just(Op::Take),
        Just(Op::Take),
        Just(Op::Swap),
    ]
}

proptest! {
    #[test]
    fn double_buffer_invariants(ops in prop::collection::vec(op(), 1..200)) {
        let mut buf = BucketDoubleBuffer::new();
        let mut segment = 1;
        for op in ops {
            match op {
                Op::Fill(n) => {
                    if buf.needs_fill() {
                        prop_assert!(buf.back().is_drained(), "fill into undrained slot");
                        buf.mark_requested();
                        let _ = deliver(&mut buf, segment, n, 0);
                        segment += 1;
                    }
                }
                Op::Terminate => {
                    if buf.needs_fill() {
                        buf.mark_requested();
                        let _ = buf.fold_return(&MemoryReturn::termination(0), 4);
                    }
                }
                Op::Take => {
                    let was_drained = buf.front().is_drained();
                    prop_assert_eq!(buf.take_ray().is_none(), was_drained);
                }
                Op::Swap => {
                    let eligible = buf.back().is_full() && buf.front().is_drained();
                    let swapped = buf.try_swap();
                    prop_assert_eq!(swapped, eligible);
                    if swapped {
                        prop_assert_eq!(buf.back().bytes_returned, 0);
                        prop_assert!(!buf.back().requested);
                    }
                }
            }
            prop_assert!(buf.front().next_ray <= buf.front().num_rays());
        }
    }
}
