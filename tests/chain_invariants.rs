//! Random allocate / free sequences against the chain invariants.

use chainalloc::{FreeError, HEADER_SIZE, Heap};
use proptest::prelude::*;

const CAPACITY: usize = 8192;

#[derive(Debug, Clone)]
enum Op {
    Allocate(isize),
    Free(usize),
    FreeSecure(usize),
    FreeTwice(usize),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (-4isize..600).prop_map(Op::Allocate),
        2 => any::<usize>().prop_map(Op::Free),
        1 => any::<usize>().prop_map(Op::FreeSecure),
        1 => any::<usize>().prop_map(Op::FreeTwice),
    ]
}

/// A live allocation and the byte pattern written into it.
struct Live {
    ptr: *mut u8,
    len: usize,
    tag: u8,
}

fn assert_chain(heap: &Heap) -> Result<(), TestCaseError> {
    let dump = heap.dump();
    let blocks = dump.blocks();

    prop_assert!(heap.check().is_ok(), "{:?}", heap.check());
    prop_assert_eq!(blocks.iter().map(|b| HEADER_SIZE + b.size).sum::<usize>(), CAPACITY);
    for pair in blocks.windows(2) {
        prop_assert!(pair[0].address < pair[1].address);
        prop_assert_eq!(pair[0].next, pair[1].address);
        prop_assert!(pair[0].occupied || pair[1].occupied, "adjacent free blocks");
    }

    let summary = heap.summary();
    prop_assert_eq!(summary.total_bytes, CAPACITY);
    prop_assert_eq!(summary.free_bytes + summary.occupied_bytes, summary.block_bytes);

    Ok(())
}

fn release(heap: &mut Heap, live: &mut Vec<Live>, index: usize, secure: bool) -> Result<(), TestCaseError> {
    if live.is_empty() {
        return Ok(());
    }

    let block = live.swap_remove(index % live.len());
    if secure {
        prop_assert_eq!(heap.free_secure(block.ptr), Ok(()));
        prop_assert!(heap.bytes(block.ptr, block.len).unwrap().iter().all(|&b| b == 0));
    } else {
        prop_assert_eq!(heap.free(block.ptr), Ok(()));
    }

    Ok(())
}

proptest! {
    #[test]
    fn chain_stays_consistent(ops in prop::collection::vec(arb_op(), 1..120)) {
        let mut heap = Heap::with_capacity(CAPACITY);
        let mut live: Vec<Live> = Vec::new();
        let mut next_tag = 1u8;

        for op in ops {
            match op {
                Op::Allocate(size) => {
                    if let Ok(ptr) = heap.allocate(size) {
                        prop_assert!(size >= 0);
                        let len = size as usize;
                        let tag = next_tag;
                        next_tag = next_tag.wrapping_add(1).max(1);
                        unsafe { ptr.as_ptr().write_bytes(tag, len) };
                        live.push(Live { ptr: ptr.as_ptr(), len, tag });
                    }
                }
                Op::Free(index) => release(&mut heap, &mut live, index, false)?,
                Op::FreeSecure(index) => release(&mut heap, &mut live, index, true)?,
                Op::FreeTwice(index) => {
                    if live.is_empty() {
                        continue;
                    }
                    let ptr = live[index % live.len()].ptr;
                    release(&mut heap, &mut live, index, false)?;
                    let before = heap.dump();
                    // A block merged into a free predecessor has no header left.
                    let still_a_block = before
                        .blocks()
                        .iter()
                        .any(|b| b.address + HEADER_SIZE == ptr as usize);
                    let expected = if still_a_block {
                        FreeError::DoubleFree(ptr as usize)
                    } else {
                        FreeError::InvalidPointer(ptr as usize)
                    };
                    prop_assert_eq!(heap.free(ptr), Err(expected));
                    prop_assert_eq!(heap.dump(), before);
                }
            }

            if heap.is_initialized() {
                assert_chain(&heap)?;
            }

            // Live blocks never overlap, so nobody else touched their bytes.
            for block in &live {
                let bytes = heap.bytes(block.ptr, block.len).unwrap();
                prop_assert!(bytes.iter().all(|&b| b == block.tag));
            }
        }
    }
}

proptest! {
    #[test]
    fn free_then_allocate_same_size_reuses_address(sizes in prop::collection::vec(0isize..400, 0..8), size in 0isize..400) {
        let mut heap = Heap::with_capacity(CAPACITY);
        for s in sizes {
            heap.allocate(s).unwrap();
        }

        let first = heap.allocate(size).unwrap();
        heap.free(first.as_ptr()).unwrap();
        let second = heap.allocate(size).unwrap();

        prop_assert_eq!(first, second);
    }
}

#[test]
fn fills_exactly_then_runs_out() {
    let mut heap = Heap::with_capacity(CAPACITY);

    let ptr = heap.allocate((CAPACITY - HEADER_SIZE) as isize).unwrap();
    assert!(heap.allocate(1).is_err());
    assert_eq!(heap.summary().free_bytes, 0);

    heap.free(ptr.as_ptr()).unwrap();
    assert_eq!(heap.dump().blocks().len(), 1);
    assert!(heap.allocate(1).is_ok());
}
