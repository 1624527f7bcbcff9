use std::{alloc::Layout, ptr::NonNull, slice};

use crate::{
    block::{HEADER_SIZE, RawHeader},
    kernel,
};

/// The one contiguous mapping that backs a heap.
///
/// This is the only place where offsets are turned into raw addresses. Every
/// accessor is bounds checked against `len`, so a corrupted `next` offset can
/// be reported as corruption instead of reading outside the mapping.
///
/// ```text
///  base                                                   base + len
///   |                                                          |
///   v                                                          v
///   +--------+---------+--------+------------------+--------+-----+
///   | header | payload | header |     payload      | header | ... |
///   +--------+---------+--------+------------------+--------+-----+
///   0        16        next                        next
/// ```
pub(crate) struct Region {
    base: NonNull<u8>,
    len: usize,
}

impl Region {
    /// Maps `len` zero filled bytes from the kernel. Returns `None` when the
    /// kernel refuses.
    pub fn acquire(len: usize) -> Option<Self> {
        // SAFETY: the mapping is owned by `Region` and returned in `Drop`.
        let base = unsafe { kernel::request_memory(len)? };

        Some(Self { base, len })
    }

    /// Like [`Region::acquire`], but failure to map the arena ends the
    /// process. There is no fallback.
    pub fn acquire_or_abort(len: usize) -> Self {
        match Self::acquire(len) {
            Some(region) => region,
            None => {
                tracing::error!(len, "kernel refused to map the arena");
                let layout = Layout::from_size_align(len, 1).unwrap_or(Layout::new::<u8>());
                std::alloc::handle_alloc_error(layout)
            }
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn base(&self) -> NonNull<u8> {
        self.base
    }

    /// Address of the byte at `offset`.
    ///
    /// ### Panics
    /// If `offset` lies past the end of the mapping.
    pub fn address(&self, offset: usize) -> NonNull<u8> {
        assert!(offset <= self.len, "offset {offset} outside region of {} bytes", self.len);

        // SAFETY: in bounds (or one past the end) of the mapping.
        unsafe { self.base.add(offset) }
    }

    /// Maps an address back to its offset, `None` if it does not point into
    /// this region.
    pub fn offset_of(&self, addr: *const u8) -> Option<usize> {
        let addr = addr as usize;
        let base = self.base.as_ptr() as usize;

        (base..base + self.len).contains(&addr).then(|| addr - base)
    }

    /// Reads the header stored at `offset`, `None` if it would not fit.
    pub fn read_header(&self, offset: usize) -> Option<RawHeader> {
        if offset.checked_add(HEADER_SIZE)? > self.len {
            return None;
        }

        // SAFETY: the whole header lies inside the mapping and every bit
        // pattern is a valid `RawHeader` (plain integers only). Corrupted
        // offsets may be unaligned.
        Some(unsafe { self.base.add(offset).cast::<RawHeader>().read_unaligned() })
    }

    /// Writes a header at `offset`.
    ///
    /// ### Panics
    /// If the header would not fit inside the mapping.
    pub fn write_header(&mut self, offset: usize, header: RawHeader) {
        assert!(
            offset + HEADER_SIZE <= self.len,
            "header at {offset} outside region of {} bytes",
            self.len
        );

        // SAFETY: bounds checked above.
        unsafe { self.base.add(offset).cast::<RawHeader>().write_unaligned(header) }
    }

    /// Read-only view of `len` bytes starting at `offset`.
    pub fn bytes(&self, offset: usize, len: usize) -> Option<&[u8]> {
        if offset.checked_add(len)? > self.len {
            return None;
        }

        // SAFETY: bounds checked above. The returned borrow ties the view to
        // `&self`, and every mutation of the region needs `&mut self`.
        Some(unsafe { slice::from_raw_parts(self.base.add(offset).as_ptr(), len) })
    }

    /// Overwrites `len` bytes starting at `offset` with zeroes.
    ///
    /// ### Panics
    /// If the range is not inside the mapping.
    pub fn zero(&mut self, offset: usize, len: usize) {
        assert!(
            offset + len <= self.len,
            "range {offset}..{} outside region of {} bytes",
            offset + len,
            self.len
        );

        // SAFETY: bounds checked above.
        unsafe { self.base.add(offset).as_ptr().write_bytes(0, len) }
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        // SAFETY: the mapping came from `kernel::request_memory` with this
        // exact length and nothing outlives the region that owns it.
        unsafe { kernel::return_memory(self.base, self.len) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{HEADER_MAGIC, Header};

    const LEN: usize = 4096;

    #[test]
    fn fresh_region_is_zeroed() {
        let region = Region::acquire(LEN).unwrap();

        assert_eq!(region.len(), LEN);
        assert!(region.bytes(0, LEN).unwrap().iter().all(|&b| b == 0));
    }

    #[test]
    fn header_round_trips_through_memory() {
        let mut region = Region::acquire(LEN).unwrap();
        let header = Header {
            offset: 40,
            occupied: true,
            next: 128,
        };

        region.write_header(40, header.to_raw());

        let read = region.read_header(40).unwrap().validate(40, LEN).unwrap();
        assert_eq!(read, header);
        assert_eq!(
            u16::from_ne_bytes([region.bytes(40, 1).unwrap()[0], region.bytes(41, 1).unwrap()[0]]),
            HEADER_MAGIC
        );
    }

    #[test]
    fn reads_past_the_end_are_refused() {
        let region = Region::acquire(LEN).unwrap();

        assert!(region.read_header(LEN - HEADER_SIZE).is_some());
        assert!(region.read_header(LEN - HEADER_SIZE + 1).is_none());
        assert!(region.read_header(usize::MAX).is_none());
        assert!(region.bytes(LEN - 4, 8).is_none());
    }

    #[test]
    fn offsets_and_addresses_match() {
        let region = Region::acquire(LEN).unwrap();
        let addr = region.address(100);

        assert_eq!(region.offset_of(addr.as_ptr()), Some(100));
        assert_eq!(region.offset_of(region.base().as_ptr()), Some(0));
        assert_eq!(region.offset_of(region.address(LEN).as_ptr()), None);
        assert_eq!(region.offset_of(std::ptr::null()), None);
    }

    #[test]
    fn zero_clears_only_the_range() {
        let mut region = Region::acquire(LEN).unwrap();
        region.write_header(0, Header { offset: 0, occupied: false, next: LEN }.to_raw());

        region.zero(HEADER_SIZE, 64);

        assert!(region.read_header(0).unwrap().validate(0, LEN).is_ok());
    }
}
