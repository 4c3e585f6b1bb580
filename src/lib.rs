//! Facade crate for the Orbis storage framework.
//!
//! This crate re-exports the segmented memory, codec and collection types
//! from `orbis-core` and exposes the geometry codecs and OSM cache from
//! `orbis-data` behind the `geometry` feature.

#![forbid(unsafe_code)]

pub use orbis_core::codec;
pub use orbis_core::{
    AlignedDataList, CodecError, CollectionError, DataList, DataMap, DataStore, DenseDataMap,
    ExternalMergeSort, FixedSizeDataList, IndexedDataList, IndexedDataMap, MappedDirectoryMemory,
    MappedFileMemory, Memory, MemoryConfig, MemoryError, MemoryKind, OffHeapMemory, OnHeapMemory,
    SortConfig, SortError, SortedDataMap, SparseDataMap, binary_search, binary_search_by_attribute,
    binary_search_in, merge_sorted_batches,
};

#[cfg(feature = "geometry")]
pub use orbis_data::{
    CoordinateDataType, GeometryDataType, GeometryKind, OptionalCoordinateDataType, OsmCache,
    OsmCacheError, OsmCacheSummary, load_osm_pbf,
};
