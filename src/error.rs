//! Error types returned by the heap.
//!
//! Only [`AllocError`] and [`FreeError`] are ever handed to callers of the
//! allocation API. [`CorruptionError`] describes a broken header chain; the
//! allocation API treats it as fatal and faults, while [`crate::Heap::check`]
//! returns it so integrity can be probed without tearing the process down.
use thiserror::Error;

/// Why an allocation request could not be served.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// The requested size was negative. Rejected before touching the arena.
    #[error("invalid allocation size: {0}")]
    InvalidSize(isize),

    /// No block in the chain can hold the request, the arena is either full
    /// or too fragmented. There is no growth path.
    #[error("out of memory: no free block can hold {requested} bytes")]
    OutOfMemory {
        /// Requested size after word alignment.
        requested: usize,
    },
}

/// Why a deallocation did not release anything. Neither case changes the
/// state of the heap.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeError {
    /// The address was never returned by [`crate::Heap::allocate`] on this
    /// heap. Interior pointers land here as well.
    #[error("invalid pointer: {0:#x}")]
    InvalidPointer(usize),

    /// The address names a block that is already free.
    #[error("double free: {0:#x}")]
    DoubleFree(usize),
}

/// A header that can no longer be trusted. Offsets are relative to the arena
/// base.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorruptionError {
    #[error("header at offset {offset} has sentinel {found:#06x}, expected {expected:#06x}")]
    BadMagic {
        offset: usize,
        found: u16,
        expected: u16,
    },

    #[error("header at offset {offset} has occupancy flag {found}")]
    BadFlag { offset: usize, found: u8 },

    /// `next` does not leave room for a non empty block or points past the
    /// end of the arena.
    #[error("header at offset {offset} links to {next}, outside ({lower}, {capacity}]")]
    BadLink {
        offset: usize,
        next: usize,
        lower: usize,
        capacity: usize,
    },

    #[error("header at offset {offset} does not fit inside an arena of {capacity} bytes")]
    OutOfBounds { offset: usize, capacity: usize },

    /// Two neighbouring blocks are both free. Only reported by
    /// [`crate::Heap::check`].
    #[error("free blocks at offsets {first} and {second} were never merged")]
    Uncoalesced { first: usize, second: usize },
}
