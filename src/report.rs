//! Read-only views of a heap: the block map and the usage summary.
//!
//! Both walk the chain once, validate every header on the way and never
//! write to the arena. Like every other traversal, a corrupted header faults.
use std::fmt;

use crate::{
    block::HEADER_SIZE,
    heap::{Heap, checked},
    list::Chain,
};

/// One block of the chain as seen by [`Heap::dump`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    /// Address of the header.
    pub address: usize,
    /// Offset of the header from the arena base.
    pub offset: usize,
    pub occupied: bool,
    /// Address of the next header, one past the arena for the last block.
    pub next: usize,
    /// Usable bytes after the header.
    pub size: usize,
}

/// Every block of the heap in address order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dump {
    blocks: Vec<BlockInfo>,
}

impl Dump {
    pub fn blocks(&self) -> &[BlockInfo] {
        &self.blocks
    }
}

/// Aggregate usage of a heap. All figures are bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub blocks: usize,
    pub free_blocks: usize,
    /// Usable bytes over all blocks.
    pub block_bytes: usize,
    pub free_bytes: usize,
    pub occupied_bytes: usize,
    /// Bytes taken by headers.
    pub header_bytes: usize,
    pub free_header_bytes: usize,
    pub occupied_header_bytes: usize,
    /// Headers plus blocks. Equals the capacity once the arena exists.
    pub total_bytes: usize,
}

impl Summary {
    /// Share of the arena sitting in free blocks, headers excluded.
    pub fn percent_free(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }

        self.free_bytes as f64 * 100.0 / self.total_bytes as f64
    }
}

impl Heap {
    /// Lists every block in chain order. Empty before the first allocation.
    pub fn dump(&self) -> Dump {
        let Some(region) = self.region.as_ref() else {
            return Dump::default();
        };
        let base = region.base().as_ptr() as usize;

        let blocks = Chain::new(Some(region))
            .map(checked)
            .map(|h| BlockInfo {
                address: base + h.offset,
                offset: h.offset,
                occupied: h.occupied,
                next: base + h.next,
                size: h.size(),
            })
            .collect();

        Dump { blocks }
    }

    /// Adds up block and header bytes by occupancy. All zero before the
    /// first allocation.
    pub fn summary(&self) -> Summary {
        Chain::new(self.region.as_ref())
            .map(checked)
            .fold(Summary::default(), |mut summary, h| {
                let size = h.size();

                if h.is_free() {
                    summary.free_blocks += 1;
                    summary.free_bytes += size;
                    summary.free_header_bytes += HEADER_SIZE;
                } else {
                    summary.occupied_bytes += size;
                    summary.occupied_header_bytes += HEADER_SIZE;
                }

                summary.blocks += 1;
                summary.block_bytes += size;
                summary.header_bytes += HEADER_SIZE;
                summary.total_bytes += HEADER_SIZE + size;

                summary
            })
    }

    /// Reads `len` bytes of the arena starting at `ptr`, whatever state the
    /// blocks there are in. `None` if the range is not inside the arena.
    ///
    /// This is how freed memory is inspected without going through a
    /// dangling pointer.
    pub fn bytes(&self, ptr: *const u8, len: usize) -> Option<&[u8]> {
        let region = self.region.as_ref()?;

        region.bytes(region.offset_of(ptr)?, len)
    }
}

impl fmt::Display for Dump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "***allocation map***")?;

        for block in &self.blocks {
            writeln!(f)?;
            writeln!(f, "-------Block-------")?;
            writeln!(f, "Address: {:#x}", block.address)?;
            writeln!(f, "Header Information:")?;
            writeln!(f, "  'Free': {}", if block.occupied { "no" } else { "yes" })?;
            writeln!(f, "  'Next': {:#x}", block.next)?;
            writeln!(f, "Block size: {}", block.size)?;
            writeln!(f, "-------------------")?;
        }

        Ok(())
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "***usage summary***")?;
        writeln!(f, "Block size           : {}", self.block_bytes)?;
        writeln!(f, "     [in free blocks]: {}", self.free_bytes)?;
        writeln!(f, " [in occupied blocks]: {}", self.occupied_bytes)?;
        writeln!(f, "Header size          : {}", self.header_bytes)?;
        writeln!(f, "    [in free headers]: {}", self.free_header_bytes)?;
        writeln!(f, "[in occupied headers]: {}", self.occupied_header_bytes)?;
        writeln!(f, "Total size           : {}", self.total_bytes)?;
        writeln!(f, "Free                 : {:.2}%", self.percent_free())
    }
}
