//! Segmented storage primitives for large OpenStreetMap datasets.
//!
//! Responsibilities:
//! - Expose byte memory as power-of-two segments on the heap, off the heap
//!   or in memory-mapped files.
//! - Encode values to and from segment bytes through [`codec::DataType`].
//! - Build append-only stores, lists and `i64`-keyed maps on top of memory.
//! - Sort lists larger than RAM and search sorted lists.
//!
//! Boundaries:
//! - No geometry or file-format knowledge (lives in `orbis-data`).
//! - Collections never resize or compact; deletion means clearing the memory.
//!
//! Invariants:
//! - A value never straddles a segment boundary.
//! - Segments are allocated at most once, even under concurrent access.
//! - Collections are `Send + Sync`; appends from many threads receive
//!   distinct indices or positions.

#![deny(unsafe_code)]

pub mod codec;
mod error;
mod list;
mod map;
mod memory;
mod search;
mod sort;
mod store;

pub use error::{CodecError, CollectionError, MemoryError, SortError};
pub use list::{AlignedDataList, DataList, DataListIter, FixedSizeDataList, IndexedDataList};
pub use map::{
    CHUNK_SHIFT, DataMap, DenseDataMap, Entries, IndexedDataMap, SortedDataMap, SparseDataMap,
};
pub use memory::{
    DEFAULT_HEADER_SIZE, DEFAULT_SEGMENT_SIZE, MAX_SEGMENT_INDEX, MappedDirectoryMemory,
    MappedFileMemory, Memory, MemoryConfig, MemoryKind, OffHeapMemory, OnHeapMemory, Segment,
    SegmentLayout,
};
pub use search::{binary_search, binary_search_by_attribute, binary_search_in};
pub use sort::{DEFAULT_BATCH_SIZE, ExternalMergeSort, SortConfig, merge_sorted_batches};
pub use store::{DataStore, DataStoreIter};
