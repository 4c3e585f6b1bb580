//! Segmented memory backends.
//!
//! A [`Memory`] owns a header region and a lazily grown table of fixed-size,
//! power-of-two segments. Collections address bytes through a single logical
//! position that [`SegmentLayout`] splits into a segment index and an offset,
//! so every backend resolves positions bit-for-bit identically.
//!
//! Four backends implement the trait:
//!
//! - [`OnHeapMemory`] keeps zeroed segments on the process heap.
//! - [`OffHeapMemory`] uses anonymous mappings outside the allocator heap.
//! - [`MappedFileMemory`] maps every segment from one shared file.
//! - [`MappedDirectoryMemory`] maps one `<index>.part` file per segment.

use std::fmt;
use std::sync::Arc;

use camino::Utf8PathBuf;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::MemoryError;

mod heap;
mod mapped;
mod segment;

pub use heap::{OffHeapMemory, OnHeapMemory};
pub use mapped::{MappedDirectoryMemory, MappedFileMemory};
pub use segment::Segment;
pub(crate) use segment::SegmentTable;

/// Default segment size (1 MiB).
pub const DEFAULT_SEGMENT_SIZE: usize = 1 << DEFAULT_SEGMENT_SHIFT;

/// Default header size in bytes.
pub const DEFAULT_HEADER_SIZE: usize = 1024;

/// Largest segment index a memory can address.
pub const MAX_SEGMENT_INDEX: u64 = i32::MAX as u64;

const DEFAULT_SEGMENT_SHIFT: u32 = 20;

/// Shift and mask arithmetic shared by every backend.
///
/// # Examples
///
/// ```
/// use orbis_core::SegmentLayout;
///
/// # fn main() -> Result<(), orbis_core::MemoryError> {
/// let layout = SegmentLayout::new(1024)?;
/// assert_eq!(layout.segment_index(2049), 2);
/// assert_eq!(layout.segment_offset(2049), 1);
/// assert_eq!(layout.position(2, 1), 2049);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentLayout {
    segment_size: usize,
    segment_shift: u32,
    segment_mask: u64,
}

impl SegmentLayout {
    /// Validates `segment_size` and derives its shift and mask.
    pub fn new(segment_size: usize) -> Result<Self, MemoryError> {
        if segment_size == 0 || !segment_size.is_power_of_two() {
            return Err(MemoryError::InvalidSegmentSize { size: segment_size });
        }
        Ok(Self::from_shift(segment_size.trailing_zeros()))
    }

    const fn from_shift(segment_shift: u32) -> Self {
        let segment_size = 1_usize << segment_shift;
        Self {
            segment_size,
            segment_shift,
            segment_mask: (segment_size as u64) - 1,
        }
    }

    /// Size of one segment in bytes.
    #[must_use]
    pub const fn segment_size(&self) -> usize {
        self.segment_size
    }

    /// `log2(segment_size)`.
    #[must_use]
    pub const fn segment_shift(&self) -> u32 {
        self.segment_shift
    }

    /// `segment_size - 1`.
    #[must_use]
    pub const fn segment_mask(&self) -> u64 {
        self.segment_mask
    }

    /// Index of the segment holding logical byte `position`.
    #[must_use]
    pub const fn segment_index(&self, position: u64) -> u64 {
        position >> self.segment_shift
    }

    /// Offset of logical byte `position` inside its segment.
    #[must_use]
    pub const fn segment_offset(&self, position: u64) -> usize {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "masked offsets are smaller than segment_size"
        )]
        let offset = (position & self.segment_mask) as usize;
        offset
    }

    /// Recomposes a logical position from a segment index and offset.
    #[must_use]
    pub const fn position(&self, segment_index: u64, offset: usize) -> u64 {
        (segment_index << self.segment_shift) | offset as u64
    }

    /// Splits `position` into a table index and an offset, rejecting indices
    /// beyond [`MAX_SEGMENT_INDEX`].
    pub fn locate(&self, position: u64) -> Result<(usize, usize), MemoryError> {
        let index = self.segment_index(position);
        Ok((checked_segment_index(index)?, self.segment_offset(position)))
    }
}

impl Default for SegmentLayout {
    fn default() -> Self {
        Self::from_shift(DEFAULT_SEGMENT_SHIFT)
    }
}

pub(crate) fn checked_segment_index(index: u64) -> Result<usize, MemoryError> {
    if index > MAX_SEGMENT_INDEX {
        return Err(MemoryError::SegmentIndexOutOfRange {
            index,
            max: MAX_SEGMENT_INDEX,
        });
    }
    usize::try_from(index).map_err(|_| MemoryError::SegmentIndexOutOfRange {
        index,
        max: MAX_SEGMENT_INDEX,
    })
}

/// A header region plus a lazily grown table of fixed-size segments.
///
/// Implementations allocate each segment at most once, even when several
/// threads request the same index concurrently. Byte access happens through
/// the returned [`Segment`], outside the table lock.
pub trait Memory: Send + Sync + fmt::Debug {
    /// Segment arithmetic for this memory.
    fn layout(&self) -> SegmentLayout;

    /// Returns the header region, allocating it on first use.
    fn header(&self) -> Result<Arc<Segment>, MemoryError>;

    /// Returns segment `index`, allocating it (and placeholders for every
    /// lower index) on first use.
    fn segment(&self, index: usize) -> Result<Arc<Segment>, MemoryError>;

    /// Number of slots in the segment table, allocated or not.
    fn segment_count(&self) -> usize;

    /// Writes dirty mapped pages back to storage.
    fn flush(&self) -> Result<(), MemoryError>;

    /// Releases mappings and buffers while keeping backing storage intact.
    fn close(&self) -> Result<(), MemoryError>;

    /// Closes the memory and deletes its backing storage.
    fn clear(&self) -> Result<(), MemoryError>;

    /// Whether `close` or `clear` has been called.
    fn is_closed(&self) -> bool;

    /// Segment size in bytes.
    fn segment_size(&self) -> usize {
        self.layout().segment_size()
    }

    /// Bytes covered by the segment table.
    fn size(&self) -> u64 {
        self.segment_count() as u64 * self.segment_size() as u64
    }
}

impl<M: Memory + ?Sized> Memory for Box<M> {
    fn layout(&self) -> SegmentLayout {
        (**self).layout()
    }

    fn header(&self) -> Result<Arc<Segment>, MemoryError> {
        (**self).header()
    }

    fn segment(&self, index: usize) -> Result<Arc<Segment>, MemoryError> {
        (**self).segment(index)
    }

    fn segment_count(&self) -> usize {
        (**self).segment_count()
    }

    fn flush(&self) -> Result<(), MemoryError> {
        (**self).flush()
    }

    fn close(&self) -> Result<(), MemoryError> {
        (**self).close()
    }

    fn clear(&self) -> Result<(), MemoryError> {
        (**self).clear()
    }

    fn is_closed(&self) -> bool {
        (**self).is_closed()
    }
}

/// Backend selected by a [`MemoryConfig`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum MemoryKind {
    /// Zeroed buffers on the process heap.
    #[default]
    OnHeap,
    /// Anonymous mappings outside the allocator heap.
    OffHeap,
    /// One shared memory-mapped file.
    MappedFile,
    /// A directory of memory-mapped segment files.
    MappedDirectory,
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::OnHeap => "on-heap",
            Self::OffHeap => "off-heap",
            Self::MappedFile => "mapped-file",
            Self::MappedDirectory => "mapped-directory",
        };
        f.write_str(name)
    }
}

/// Constructor parameters for a [`Memory`], suitable for configuration files.
///
/// # Examples
///
/// ```
/// use orbis_core::{Memory, MemoryConfig, MemoryKind};
///
/// # fn main() -> Result<(), orbis_core::MemoryError> {
/// let config = MemoryConfig {
///     kind: MemoryKind::OnHeap,
///     segment_size: 4096,
///     ..MemoryConfig::default()
/// };
/// let memory = config.open()?;
/// assert_eq!(memory.segment_size(), 4096);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct MemoryConfig {
    /// Backend to construct.
    pub kind: MemoryKind,
    /// Segment size in bytes; must be a power of two.
    pub segment_size: usize,
    /// Header size in bytes.
    pub header_size: usize,
    /// File (mapped file) or directory (mapped directory) backing the memory.
    pub path: Option<Utf8PathBuf>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            kind: MemoryKind::OnHeap,
            segment_size: DEFAULT_SEGMENT_SIZE,
            header_size: DEFAULT_HEADER_SIZE,
            path: None,
        }
    }
}

impl MemoryConfig {
    /// Constructs the configured backend.
    pub fn open(&self) -> Result<Box<dyn Memory>, MemoryError> {
        let memory: Box<dyn Memory> = match self.kind {
            MemoryKind::OnHeap => Box::new(OnHeapMemory::with_sizes(
                self.header_size,
                self.segment_size,
            )?),
            MemoryKind::OffHeap => Box::new(OffHeapMemory::with_sizes(
                self.header_size,
                self.segment_size,
            )?),
            MemoryKind::MappedFile => Box::new(MappedFileMemory::open(
                self.require_path()?,
                self.header_size,
                self.segment_size,
            )?),
            MemoryKind::MappedDirectory => Box::new(MappedDirectoryMemory::open(
                self.require_path()?,
                self.header_size,
                self.segment_size,
            )?),
        };
        Ok(memory)
    }

    fn require_path(&self) -> Result<&Utf8PathBuf, MemoryError> {
        self.path
            .as_ref()
            .ok_or(MemoryError::MissingPath { kind: self.kind })
    }
}
