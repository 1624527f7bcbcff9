use crate::{block::Header, error::CorruptionError, region::Region};

/// Reads and validates the header at `offset`. This is the only way headers
/// are read back from the arena, so nothing can look at `occupied` or `next`
/// before the sentinel has been checked.
pub(crate) fn header_at(region: &Region, offset: usize) -> Result<Header, CorruptionError> {
    let capacity = region.len();

    region
        .read_header(offset)
        .ok_or(CorruptionError::OutOfBounds { offset, capacity })?
        .validate(offset, capacity)
}

/// Walks the header chain from the arena base to the end marker.
///
/// ```text
/// offset 0                                               capacity
///   +--------+      +--------+      +--------+              |
///   | Header | ---> | Header | ---> | Header | ---> ... ---> end
///   +--------+      +--------+      +--------+
/// ```
///
/// Each step validates the visited header. The first corrupted header is
/// yielded as an error and ends the walk, since its `next` cannot be
/// followed. Validation guarantees every link moves strictly forward, so the
/// walk always terminates.
pub(crate) struct Chain<'a> {
    region: Option<&'a Region>,
    cursor: usize,
}

impl<'a> Chain<'a> {
    /// Chain over `region`, or an empty chain for an arena that was never
    /// initialized.
    pub fn new(region: Option<&'a Region>) -> Self {
        Self { region, cursor: 0 }
    }
}

impl Iterator for Chain<'_> {
    type Item = Result<Header, CorruptionError>;

    fn next(&mut self) -> Option<Self::Item> {
        let region = self.region?;

        if self.cursor == region.len() {
            return None;
        }

        match header_at(region, self.cursor) {
            Ok(header) => {
                self.cursor = header.next;
                Some(Ok(header))
            }
            Err(err) => {
                self.region = None;
                Some(Err(err))
            }
        }
    }
}
