//! # chainalloc
//!
//! A heap allocator over one fixed capacity arena. The arena is mapped from
//! the kernel once and carved into blocks, each prefixed by an in-band
//! header. Headers link to the next header by offset, so the whole arena is a
//! singly linked, address ordered chain:
//!
//! ```text
//!  base                                                         base + capacity
//!   +--------+----------+--------+---------------+--------+------------+
//!   | Header | occupied | Header |     free      | Header |  occupied  |
//!   +--------+----------+--------+---------------+--------+------------+
//!       |                 ^  |                     ^  |                  ^
//!       +-----------------+  +---------------------+  +------------------+
//! ```
//!
//! Nothing stores the size of a block, it is the distance between the end of
//! its header and the next header.
//!
//! - **Allocation** is first fit. The first free block that matches the
//!   request exactly is taken whole; a larger one is split and the tail gets a
//!   fresh header.
//! - **Deallocation** looks the block up by the exact address `allocate`
//!   returned, marks it free and merges every run of adjacent free blocks.
//!   [`Heap::free_secure`] also zeroes the released bytes.
//! - **Integrity**: every header carries a sentinel that is checked whenever
//!   the chain is walked. A bad header means the heap can no longer be
//!   trusted and the process faults.
//!
//! ## Quick Start
//!
//! ```rust
//! use chainalloc::Heap;
//!
//! let mut heap = Heap::with_capacity(64 * 1024);
//!
//! let ptr = heap.allocate(64).unwrap();
//! unsafe { ptr.as_ptr().write_bytes(0x2A, 64) };
//!
//! heap.free_secure(ptr.as_ptr()).unwrap();
//! assert!(heap.bytes(ptr.as_ptr(), 64).unwrap().iter().all(|&b| b == 0));
//!
//! println!("{}", heap.summary());
//! ```
//!
//! ## Limitations
//!
//! - **Single-threaded only**: share a heap through a `Mutex` if needed.
//! - **Fixed size**: the arena never grows, an exhausted heap stays exhausted.
//! - **No use-after-free protection**: freed blocks stay mapped and writable.

mod block;
mod error;
mod heap;
mod kernel;
mod list;
mod region;
mod report;

pub use block::{HEADER_MAGIC, HEADER_SIZE};
pub use error::{AllocError, CorruptionError, FreeError};
pub use heap::{DEFAULT_CAPACITY, Heap};
pub use report::{BlockInfo, Dump, Summary};
