use std::{mem, ptr::NonNull};

use crate::{
    block::{HEADER_SIZE, Header, MIN_BLOCK_SIZE, align},
    error::{AllocError, CorruptionError, FreeError},
    list::{Chain, header_at},
    region::Region,
};

/// Arena size used by [`Heap::new`].
pub const DEFAULT_CAPACITY: usize = 32 * 1024 * 1024;

/// A fixed capacity heap managed as an address ordered chain of blocks.
///
/// The arena is mapped lazily on the first call to [`Heap::allocate`] and
/// released when the heap is dropped. Every block starts with an in-band
/// header and the headers form a singly linked list that covers the arena
/// exactly:
///
/// ```text
/// +--------+-----------+--------+----------------+--------+-----------+
/// | Header |   used    | Header |      free      | Header |   used    |
/// +--------+-----------+--------+----------------+--------+-----------+
///     |                  ^  |                      ^  |                ^
///     +------------------+  +----------------------+  +--------------- end
/// ```
///
/// Allocation is first fit: the first free block that either fits the
/// request exactly or can be split is used. Freeing flips the block back and
/// merges every run of adjacent free blocks.
///
/// Any header that fails validation while the chain is being walked is
/// treated as heap corruption and ends the process (panic, or abort with
/// `panic = "abort"`). Use [`Heap::check`] to probe integrity without
/// faulting.
///
/// Mutating operations need `&mut self` and the heap is neither `Send` nor
/// `Sync`, so sharing one heap across threads takes an explicit lock.
pub struct Heap {
    pub(crate) capacity: usize,
    pub(crate) region: Option<Region>,
}

/// Reports a corrupted header and faults. Once a header cannot be trusted
/// no further traversal can be either.
#[cold]
#[track_caller]
pub(crate) fn corrupted(err: CorruptionError) -> ! {
    tracing::error!(%err, "heap corruption detected");
    panic!("heap corruption: {err}");
}

#[inline]
pub(crate) fn checked(header: Result<Header, CorruptionError>) -> Header {
    header.unwrap_or_else(|err| corrupted(err))
}

impl Heap {
    /// Heap of [`DEFAULT_CAPACITY`] bytes. No memory is mapped until the
    /// first allocation.
    pub const fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Heap of `capacity` bytes, headers included.
    ///
    /// ### Panics
    /// If `capacity` is not a multiple of the machine word or cannot hold a
    /// header plus one word of payload.
    pub const fn with_capacity(capacity: usize) -> Self {
        assert!(
            capacity % mem::size_of::<usize>() == 0,
            "heap capacity must be a multiple of the word size"
        );
        assert!(
            capacity >= HEADER_SIZE + MIN_BLOCK_SIZE,
            "heap capacity must hold at least one header and one word"
        );

        Self {
            capacity,
            region: None,
        }
    }

    /// Total arena size in bytes, headers included.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether the backing arena has been mapped yet.
    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.region.is_some()
    }

    /// Maps the arena and installs the single free block that spans it.
    /// Does nothing after the first call.
    fn ensure_initialized(&mut self) -> &mut Region {
        let capacity = self.capacity;

        self.region.get_or_insert_with(|| {
            let mut region = Region::acquire_or_abort(capacity);
            let first = Header {
                offset: 0,
                occupied: false,
                next: capacity,
            };
            region.write_header(first.offset, first.to_raw());

            tracing::info!(
                capacity,
                header_size = HEADER_SIZE,
                base = ?region.base(),
                "arena initialized"
            );

            region
        })
    }

    /// Allocates `size` bytes and returns the address of the first one.
    ///
    /// The request is rounded up to the machine word, so returned addresses
    /// are word aligned. A zero byte request gets one word. The bytes are not
    /// cleared: a reused block keeps whatever its previous owner left there
    /// unless it was released with [`Heap::free_secure`].
    ///
    /// Negative sizes are rejected before the arena is touched.
    pub fn allocate(&mut self, size: isize) -> Result<NonNull<u8>, AllocError> {
        if size < 0 {
            return Err(AllocError::InvalidSize(size));
        }

        let size = align(size.unsigned_abs()).max(MIN_BLOCK_SIZE);
        let region = self.ensure_initialized();

        let fit = Chain::new(Some(&*region))
            .map(checked)
            .find(|h| h.is_free() && (h.size() > HEADER_SIZE + size || h.size() == size));

        let Some(mut header) = fit else {
            tracing::debug!(requested = size, "no free block can hold the request");
            return Err(AllocError::OutOfMemory { requested: size });
        };

        if header.size() > HEADER_SIZE + size {
            // Carve `size` bytes off the front, the rest becomes a new free
            // block with its own header.
            let rest = Header {
                offset: header.payload() + size,
                occupied: false,
                next: header.next,
            };
            region.write_header(rest.offset, rest.to_raw());
            header.next = rest.offset;
        }

        header.occupied = true;
        region.write_header(header.offset, header.to_raw());

        tracing::debug!(offset = header.payload(), size, "allocated block");

        Ok(region.address(header.payload()))
    }

    /// Releases a block previously returned by [`Heap::allocate`] and merges
    /// it with its free neighbours.
    ///
    /// Only the exact address handed out by `allocate` is recognised, an
    /// interior pointer is reported as [`FreeError::InvalidPointer`]. Freeing
    /// a block twice returns [`FreeError::DoubleFree`] and changes nothing,
    /// unless the block was merged into a free block before it: its header is
    /// gone and the repeat is reported as [`FreeError::InvalidPointer`].
    pub fn free(&mut self, ptr: *mut u8) -> Result<(), FreeError> {
        self.release(ptr).map(|_| ())
    }

    /// Like [`Heap::free`], but also zeroes the bytes of the released block
    /// so its former contents cannot be read back from the arena.
    pub fn free_secure(&mut self, ptr: *mut u8) -> Result<(), FreeError> {
        let released = self.release(ptr)?;

        // The size was captured before merging, the header it came from may
        // already be part of a bigger free block.
        if let Some(region) = self.region.as_mut() {
            region.zero(released.payload(), released.size());
        }

        Ok(())
    }

    /// Looks up the block owning `ptr`, marks it free and merges the chain.
    /// Returns the header as it was before anything changed.
    fn release(&mut self, ptr: *mut u8) -> Result<Header, FreeError> {
        let addr = ptr as usize;

        let Some(region) = self.region.as_mut() else {
            return Err(invalid_pointer(addr));
        };

        let found = region.offset_of(ptr).and_then(|target| {
            Chain::new(Some(&*region))
                .map(checked)
                .find(|h| h.payload() == target)
        });

        let Some(header) = found else {
            return Err(invalid_pointer(addr));
        };

        // Tolerated without a diagnostic, the status is all the caller gets.
        if header.is_free() {
            return Err(FreeError::DoubleFree(addr));
        }

        let freed = Header {
            occupied: false,
            ..header
        };
        region.write_header(freed.offset, freed.to_raw());
        merge_adjacent_free(region);

        tracing::debug!(offset = header.payload(), size = header.size(), "freed block");

        Ok(header)
    }

    /// Walks the whole chain without faulting. Returns the number of blocks,
    /// or the first problem found: an invalid header, or two neighbouring
    /// free blocks that should have been merged.
    pub fn check(&self) -> Result<usize, CorruptionError> {
        let mut blocks = 0;
        let mut previous_free = None;

        for header in Chain::new(self.region.as_ref()) {
            let header = header?;

            if header.is_free() {
                if let Some(first) = previous_free {
                    return Err(CorruptionError::Uncoalesced {
                        first,
                        second: header.offset,
                    });
                }
                previous_free = Some(header.offset);
            } else {
                previous_free = None;
            }

            blocks += 1;
        }

        Ok(blocks)
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

fn invalid_pointer(addr: usize) -> FreeError {
    tracing::warn!(address = addr, "free of an address that is not the start of any block");
    FreeError::InvalidPointer(addr)
}

/// One sweep over the whole chain. Whenever a free block is followed by
/// another free block the second one is absorbed and the same block is
/// looked at again, so a run of any length collapses in a single pass.
fn merge_adjacent_free(region: &mut Region) {
    let end = region.len();
    let mut cursor = 0;

    while cursor != end {
        let mut header = checked(header_at(region, cursor));

        if header.is_free() && header.next != end {
            let successor = checked(header_at(region, header.next));

            if successor.is_free() {
                header.next = successor.next;
                region.write_header(header.offset, header.to_raw());
                continue;
            }
        }

        cursor = header.next;
    }
}
