//! Geometry codecs and OpenStreetMap caches for Orbis.
//!
//! Responsibilities:
//! - Encode `geo` geometries into segment buffers through `orbis-core` codecs.
//! - Fill node coordinate and way reference maps from OSM PBF files.
//!
//! Boundaries:
//! - Storage layout, collections and sorting live in `orbis-core`.
//! - No geometry assembly: ways keep node references, not line strings.
//!
//! Invariants:
//! - Variable-size encodings start with their total size.
//! - Elements are cached in file order.

mod cache;
mod geometry;

pub use cache::{
    Insertion, OsmCache, OsmCacheError, OsmCacheSummary, load_osm_pbf, validated_coord,
};
pub use geometry::{
    CoordinateDataType, GeometryCollectionDataType, GeometryDataType, GeometryKind,
    LineStringDataType, MultiLineStringDataType, MultiPointDataType, MultiPolygonDataType,
    OptionalCoordinateDataType, PointDataType, PolygonDataType,
};
