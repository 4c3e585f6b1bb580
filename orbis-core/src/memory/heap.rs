//! In-process memory backends.

use std::sync::Arc;

use super::{DEFAULT_HEADER_SIZE, Memory, Segment, SegmentLayout, SegmentTable};
use crate::error::MemoryError;

macro_rules! in_process_memory {
    ($(#[$meta:meta])* $name:ident, $allocate:path) => {
        $(#[$meta])*
        #[derive(Debug)]
        pub struct $name {
            header_size: usize,
            table: SegmentTable,
        }

        impl $name {
            /// Creates a memory with the default header size.
            pub fn new(segment_size: usize) -> Result<Self, MemoryError> {
                Self::with_sizes(DEFAULT_HEADER_SIZE, segment_size)
            }

            /// Creates a memory with explicit header and segment sizes.
            pub fn with_sizes(header_size: usize, segment_size: usize) -> Result<Self, MemoryError> {
                Ok(Self {
                    header_size,
                    table: SegmentTable::new(SegmentLayout::new(segment_size)?),
                })
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self {
                    header_size: DEFAULT_HEADER_SIZE,
                    table: SegmentTable::new(SegmentLayout::default()),
                }
            }
        }

        impl Memory for $name {
            fn layout(&self) -> SegmentLayout {
                self.table.layout()
            }

            fn header(&self) -> Result<Arc<Segment>, MemoryError> {
                let size = self.header_size;
                self.table.header_or_allocate(|| $allocate(0, size))
            }

            fn segment(&self, index: usize) -> Result<Arc<Segment>, MemoryError> {
                let size = self.table.layout().segment_size();
                self.table.get_or_allocate(index, |index| $allocate(index, size))
            }

            fn segment_count(&self) -> usize {
                self.table.len()
            }

            fn flush(&self) -> Result<(), MemoryError> {
                self.table.ensure_open()
            }

            fn close(&self) -> Result<(), MemoryError> {
                drop(self.table.close());
                Ok(())
            }

            fn clear(&self) -> Result<(), MemoryError> {
                self.close()
            }

            fn is_closed(&self) -> bool {
                self.table.is_closed()
            }
        }
    };
}

in_process_memory!(
    /// Zeroed segments on the process heap.
    ///
    /// Allocation failures surface as [`MemoryError::OutOfMemory`] instead of
    /// aborting the process.
    ///
    /// # Examples
    ///
    /// ```
    /// use orbis_core::{Memory, OnHeapMemory};
    ///
    /// # fn main() -> Result<(), orbis_core::MemoryError> {
    /// let memory = OnHeapMemory::new(1024)?;
    /// let segment = memory.segment(2)?;
    /// assert_eq!(segment.len(), 1024);
    /// assert_eq!(memory.segment_count(), 3);
    /// # Ok(())
    /// # }
    /// ```
    OnHeapMemory,
    Segment::heap
);

in_process_memory!(
    /// Zeroed anonymous mappings outside the allocator heap.
    OffHeapMemory,
    Segment::anonymous
);

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn boxed(kind: &str) -> Box<dyn Memory> {
        match kind {
            "off-heap" => Box::new(OffHeapMemory::with_sizes(16, 64).expect("off-heap memory")),
            _ => Box::new(OnHeapMemory::with_sizes(16, 64).expect("on-heap memory")),
        }
    }

    #[rstest]
    #[case("on-heap")]
    #[case("off-heap")]
    fn segments_start_zeroed_and_keep_writes(#[case] kind: &str) {
        let memory = boxed(kind);
        let segment = memory.segment(1).expect("segment");
        assert!(segment.with_bytes(|bytes| bytes.iter().all(|byte| *byte == 0)));
        segment.write(4, b"orbis").expect("write");

        let again = memory.segment(1).expect("segment");
        let mut buf = [0_u8; 5];
        again.read(4, &mut buf).expect("read");
        assert_eq!(&buf, b"orbis");
        assert_eq!(memory.size(), 128);
    }

    #[rstest]
    #[case("on-heap")]
    #[case("off-heap")]
    fn header_has_the_configured_size(#[case] kind: &str) {
        let memory = boxed(kind);
        assert_eq!(memory.header().expect("header").len(), 16);
    }

    #[rstest]
    #[case("on-heap")]
    #[case("off-heap")]
    fn closed_memory_fails_fast(#[case] kind: &str) {
        let memory = boxed(kind);
        memory.segment(0).expect("segment");
        memory.close().expect("close");
        memory.clear().expect("clear is idempotent");
        assert!(memory.is_closed());
        assert!(matches!(memory.segment(0), Err(MemoryError::Closed)));
        assert!(matches!(memory.header(), Err(MemoryError::Closed)));
        assert!(matches!(memory.flush(), Err(MemoryError::Closed)));
    }
}
