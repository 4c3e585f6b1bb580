//! Error types raised by memory backends, codecs, collections and the
//! external sort.

use std::collections::TryReserveError;
use std::io;

use camino::Utf8PathBuf;
use thiserror::Error;

use crate::memory::MemoryKind;

/// Errors raised while allocating, mapping or releasing memory segments.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MemoryError {
    /// The segment size was zero or not a power of two.
    #[error("segment size {size} must be a non-zero power of two")]
    InvalidSegmentSize {
        /// Requested segment size in bytes.
        size: usize,
    },
    /// A segment index beyond the addressable table was requested.
    #[error("segment index {index} exceeds the supported maximum {max}")]
    SegmentIndexOutOfRange {
        /// Requested segment index.
        index: u64,
        /// Largest index a memory can hold.
        max: u64,
    },
    /// The process could not reserve heap space for a segment.
    #[error("failed to reserve {size} bytes for segment {index}")]
    OutOfMemory {
        /// Index of the segment being allocated.
        index: usize,
        /// Requested allocation size in bytes.
        size: usize,
        /// Source error from the allocator.
        #[source]
        source: TryReserveError,
    },
    /// Creating an anonymous mapping failed.
    #[error("failed to allocate off-heap segment {index}")]
    Allocation {
        /// Index of the segment being allocated.
        index: usize,
        /// Source error from the operating system.
        #[source]
        source: io::Error,
    },
    /// Opening or mapping a backing file failed.
    #[error("failed to map {path}")]
    Map {
        /// Backing file or directory.
        path: Utf8PathBuf,
        /// Source error from the operating system.
        #[source]
        source: io::Error,
    },
    /// Flushing mapped segments to their backing files failed.
    #[error("failed to flush mapped memory at {path}")]
    Flush {
        /// Backing file or directory.
        path: Utf8PathBuf,
        /// Source error from the operating system.
        #[source]
        source: io::Error,
    },
    /// Deleting backing storage failed.
    #[error("failed to delete {path}")]
    Delete {
        /// Backing file or directory.
        path: Utf8PathBuf,
        /// Source error from the operating system.
        #[source]
        source: io::Error,
    },
    /// A mapped backend was configured without a path.
    #[error("{kind} memory requires a path")]
    MissingPath {
        /// Backend that was requested.
        kind: MemoryKind,
    },
    /// The memory was used after `close` or `clear`.
    #[error("memory has been closed")]
    Closed,
}

/// Errors raised while encoding or decoding values.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum CodecError {
    /// An access ran past the end of the buffer.
    #[error("accessing {len} bytes at position {position} overruns a buffer of {available} bytes")]
    OutOfBounds {
        /// Position of the access.
        position: usize,
        /// Number of bytes accessed.
        len: usize,
        /// Length of the buffer.
        available: usize,
    },
    /// A length prefix did not describe a valid encoded value.
    #[error("invalid encoded size {size} at position {position}")]
    InvalidSize {
        /// Position of the length prefix.
        position: usize,
        /// Size read from the prefix.
        size: usize,
    },
    /// A value is too large for a 32-bit length prefix.
    #[error("value of {size} bytes cannot be described by a 32-bit length prefix")]
    TooLarge {
        /// Encoded size of the value.
        size: usize,
    },
    /// A string payload was not valid UTF-8.
    #[error("invalid UTF-8 payload at position {position}")]
    InvalidUtf8 {
        /// Position of the encoded string.
        position: usize,
    },
    /// A tag byte did not name a known variant.
    #[error("unknown tag {tag} at position {position}")]
    UnknownTag {
        /// Position of the tag byte.
        position: usize,
        /// Tag value found in the buffer.
        tag: u8,
    },
}

/// Errors raised by the lists, logs and maps built on top of a [`Memory`].
///
/// [`Memory`]: crate::Memory
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CollectionError {
    /// The backing memory failed.
    #[error(transparent)]
    Memory(#[from] MemoryError),
    /// A value could not be encoded or decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// An aligned collection was configured with a stride that is not a power of two.
    #[error("element size {element_size} must be a non-zero power of two")]
    UnalignedStride {
        /// Fixed size of one element.
        element_size: usize,
    },
    /// An element would not fit inside a single segment.
    #[error("element size {element_size} does not fit segment size {segment_size}")]
    InvalidStride {
        /// Fixed size of one element.
        element_size: usize,
        /// Segment size of the backing memory.
        segment_size: usize,
    },
    /// An index was outside `0..size`.
    #[error("index {index} is outside the valid range 0..{size}")]
    IndexOutOfRange {
        /// Requested index.
        index: u64,
        /// Number of addressable elements.
        size: u64,
    },
    /// A dense map key cannot be addressed by the backing memory.
    #[error("key {key} is outside the addressable range")]
    KeyOutOfRange {
        /// Requested key.
        key: i64,
    },
    /// An encoded value is larger than one segment.
    #[error("value of {size} bytes exceeds the segment size {segment_size}")]
    ValueTooLarge {
        /// Bytes the value needs, framing included.
        size: usize,
        /// Segment size of the backing memory.
        segment_size: usize,
    },
    /// A bulk-loaded map received keys out of order.
    #[error("key {key} is smaller than the previous key {previous}")]
    UnorderedKey {
        /// Last key accepted by the map.
        previous: i64,
        /// Rejected key.
        key: i64,
    },
    /// A log position was not handed out by `add`.
    #[error("position {position} does not reference a stored value")]
    InvalidPosition {
        /// Requested position.
        position: u64,
    },
}

/// Errors raised by [`ExternalMergeSort`](crate::ExternalMergeSort).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SortError {
    /// The configured batch size was zero.
    #[error("batch size must be at least 1")]
    InvalidBatchSize,
    /// The supplier could not provide temporary storage for a batch.
    #[error("failed to allocate temporary batch storage")]
    TemporaryStorage {
        /// Source error from the supplier.
        #[source]
        source: CollectionError,
    },
    /// Reading the input, spilling a batch or writing the output failed.
    #[error(transparent)]
    Collection(#[from] CollectionError),
}
