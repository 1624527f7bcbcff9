use std::mem;

use crate::error::CorruptionError;

/// Sentinel stored at the start of every header. Anything else means the
/// header was overwritten.
pub const HEADER_MAGIC: u16 = 0xB10C;

/// Header size of a block, fixed by the `#[repr(C)]` layout of [`RawHeader`].
/// 16 bytes on 64 bit targets.
pub const HEADER_SIZE: usize = mem::size_of::<RawHeader>();

/// Smallest payload handed out. Zero byte requests are served with one word
/// so every block keeps a positive size.
pub(crate) const MIN_BLOCK_SIZE: usize = mem::size_of::<usize>();

const FREE: u8 = 0;
const OCCUPIED: u8 = 1;

/// In-band layout of a block header, exactly as it sits inside the arena.
/// There is no size field, the size of a block is whatever lies between the
/// end of its header and the next header.
///
/// ```text
/// +---------------------+ <------+
/// |    magic (u16)      |        |
/// +---------------------+        |
/// |   occupied (u8)     |        | -> Header
/// +---------------------+        |
/// |    next (usize)     |        |
/// +---------------------+ <------+
/// |       Content       |        |
/// |         ...         |        | -> size = next - (offset + HEADER_SIZE)
/// |                     |        |
/// +---------------------+ <------+ next
/// ```
///
/// `next` is an offset from the arena base, the last header links to the
/// arena capacity, which is an end marker and not a real header.
///
/// `occupied` is stored as a plain byte rather than a `bool` because it is
/// read back from memory the user can scribble over.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub(crate) struct RawHeader {
    magic: u16,
    occupied: u8,
    next: usize,
}

/// A header that passed validation, annotated with where it lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Header {
    /// Offset of the header itself.
    pub offset: usize,
    pub occupied: bool,
    /// Offset of the next header, or the capacity for the last block.
    pub next: usize,
}

impl RawHeader {
    /// Checks the sentinel, the flag and the link before anything else is
    /// allowed to look at this header.
    pub fn validate(self, offset: usize, capacity: usize) -> Result<Header, CorruptionError> {
        if self.magic != HEADER_MAGIC {
            return Err(CorruptionError::BadMagic {
                offset,
                found: self.magic,
                expected: HEADER_MAGIC,
            });
        }

        let occupied = match self.occupied {
            FREE => false,
            OCCUPIED => true,
            found => return Err(CorruptionError::BadFlag { offset, found }),
        };

        // A block must hold at least one byte and end inside the arena.
        let lower = offset + HEADER_SIZE;
        if self.next <= lower || self.next > capacity {
            return Err(CorruptionError::BadLink {
                offset,
                next: self.next,
                lower,
                capacity,
            });
        }

        Ok(Header {
            offset,
            occupied,
            next: self.next,
        })
    }
}

impl Header {
    /// Offset of the first payload byte, the address handed to the user.
    #[inline]
    pub fn payload(&self) -> usize {
        self.offset + HEADER_SIZE
    }

    /// Usable size, always derived and never stored.
    #[inline]
    pub fn size(&self) -> usize {
        self.next - self.payload()
    }

    #[inline]
    pub fn is_free(&self) -> bool {
        !self.occupied
    }

    pub fn to_raw(self) -> RawHeader {
        RawHeader {
            magic: HEADER_MAGIC,
            occupied: if self.occupied { OCCUPIED } else { FREE },
            next: self.next,
        }
    }
}

/// Rounds `size` up to a multiple of the machine word so every header lands
/// on a word aligned offset.
#[inline]
pub(crate) fn align(size: usize) -> usize {
    (size + mem::size_of::<usize>() - 1) & !(mem::size_of::<usize>() - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    const CAPACITY: usize = 1024;

    fn raw(magic: u16, occupied: u8, next: usize) -> RawHeader {
        RawHeader {
            magic,
            occupied,
            next,
        }
    }

    #[test]
    fn header_layout_is_fixed() {
        assert_eq!(HEADER_SIZE % mem::align_of::<usize>(), 0);
        assert_eq!(mem::offset_of!(RawHeader, magic), 0);
        assert_eq!(mem::offset_of!(RawHeader, occupied), 2);
        assert_eq!(mem::offset_of!(RawHeader, next), mem::size_of::<usize>());
    }

    #[test]
    fn valid_header_derives_size() {
        let header = raw(HEADER_MAGIC, OCCUPIED, 64).validate(0, CAPACITY).unwrap();

        assert_eq!(
            header,
            Header {
                offset: 0,
                occupied: true,
                next: 64
            }
        );
        assert_eq!(header.payload(), HEADER_SIZE);
        assert_eq!(header.size(), 64 - HEADER_SIZE);
        assert_eq!(header.to_raw().validate(0, CAPACITY), Ok(header));
    }

    #[test]
    fn wrong_sentinel_is_corruption() {
        let err = raw(0x6865, FREE, 64).validate(32, CAPACITY).unwrap_err();

        assert_eq!(
            err,
            CorruptionError::BadMagic {
                offset: 32,
                found: 0x6865,
                expected: HEADER_MAGIC
            }
        );
    }

    #[test]
    fn unknown_flag_is_corruption() {
        let err = raw(HEADER_MAGIC, b'1', 64).validate(0, CAPACITY).unwrap_err();

        assert_eq!(err, CorruptionError::BadFlag { offset: 0, found: b'1' });
    }

    #[rstest]
    #[case::backwards(0)]
    #[case::empty_block(HEADER_SIZE)]
    #[case::past_the_end(CAPACITY + 8)]
    fn bad_links_are_corruption(#[case] next: usize) {
        let result = raw(HEADER_MAGIC, FREE, next).validate(0, CAPACITY);

        assert!(matches!(result, Err(CorruptionError::BadLink { .. })));
    }

    #[test]
    fn link_to_the_end_marker_is_valid() {
        let header = raw(HEADER_MAGIC, FREE, CAPACITY).validate(0, CAPACITY).unwrap();

        assert_eq!(header.size(), CAPACITY - HEADER_SIZE);
    }

    #[test]
    fn align_to_word_size() {
        let word = mem::size_of::<usize>();

        assert_eq!(align(0), 0);
        for size in 1..=word {
            assert_eq!(align(size), word);
        }
        for size in word + 1..=2 * word {
            assert_eq!(align(size), 2 * word);
        }
    }
}
