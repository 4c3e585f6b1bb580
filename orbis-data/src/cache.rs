//! Node coordinate and way reference caches filled from OSM PBF files.
//!
//! Elements are read sequentially in file order, so maps that require
//! ascending keys (sorted and sparse maps) can back the cache directly.

use std::path::{Path, PathBuf};

use geo::Coord;
use log::{info, warn};
use orbis_core::{CollectionError, DataMap};
use osmpbf::{Element, ElementReader};
use serde::Serialize;
use thiserror::Error;

/// Counts gathered while loading an OSM PBF file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OsmCacheSummary {
    /// Nodes stored, dense nodes included.
    pub nodes: u64,
    /// Nodes stored without a coordinate because theirs was invalid.
    pub invalid_coordinates: u64,
    /// Ways whose node references were stored.
    pub ways: u64,
    /// Relations seen; they are not cached.
    pub relations: u64,
    /// Elements skipped because of a negative identifier.
    pub skipped: u64,
}

/// What happened to one element handed to an [`OsmCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insertion {
    /// The element was written.
    Stored,
    /// The node was written as an absent coordinate.
    StoredWithoutCoordinate,
    /// The identifier is negative and the element was ignored.
    Skipped,
}

/// Errors returned while filling an [`OsmCache`].
#[derive(Debug, Error)]
pub enum OsmCacheError {
    /// The PBF file could not be opened.
    #[error("failed to open OSM PBF file at {path:?}")]
    Open {
        /// Underlying reader error.
        #[source]
        source: osmpbf::Error,
        /// File that failed to open.
        path: PathBuf,
    },
    /// The PBF payload could not be decoded.
    #[error("failed to decode OSM PBF data in {path:?}")]
    Decode {
        /// Underlying reader error.
        #[source]
        source: osmpbf::Error,
        /// File being decoded.
        path: PathBuf,
    },
    /// A cache map rejected a write.
    #[error("failed to cache {element} {id}")]
    Store {
        /// `"node"` or `"way"`.
        element: &'static str,
        /// OSM identifier being written.
        id: i64,
        /// Collection failure.
        #[source]
        source: CollectionError,
    },
}

/// Validates a WGS84 position.
#[must_use]
pub fn validated_coord(lon: f64, lat: f64) -> Option<Coord<f64>> {
    (lon.is_finite()
        && lat.is_finite()
        && (-180.0..=180.0).contains(&lon)
        && (-90.0..=90.0).contains(&lat))
    .then_some(Coord { x: lon, y: lat })
}

/// Node coordinates and way node references keyed by OSM identifier.
///
/// # Examples
///
/// ```
/// use orbis_core::codec::LongListDataType;
/// use orbis_core::{DataMap, IndexedDataMap, OnHeapMemory, SparseDataMap};
/// use orbis_data::{Insertion, OptionalCoordinateDataType, OsmCache};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let cache = OsmCache::new(
///     SparseDataMap::new(
///         OnHeapMemory::new(4096)?,
///         OnHeapMemory::new(4096)?,
///         OptionalCoordinateDataType,
///     )?,
///     IndexedDataMap::new(OnHeapMemory::new(4096)?, LongListDataType::default())?,
/// );
/// assert_eq!(cache.insert_node(1, 2.35, 48.85)?, Insertion::Stored);
/// assert_eq!(cache.insert_node(2, 200.0, 0.0)?, Insertion::StoredWithoutCoordinate);
/// cache.insert_way(10, &[1, 2])?;
/// assert_eq!(cache.references().get(10)?, Some(vec![1, 2]));
/// assert_eq!(cache.coordinates().get(2)?, Some(None));
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct OsmCache<C, R> {
    coordinates: C,
    references: R,
}

impl<C, R> OsmCache<C, R>
where
    C: DataMap<Value = Option<Coord<f64>>>,
    R: DataMap<Value = Vec<i64>>,
{
    /// Bundles a coordinate map and a reference map.
    #[must_use]
    pub const fn new(coordinates: C, references: R) -> Self {
        Self {
            coordinates,
            references,
        }
    }

    /// Node identifier to coordinate; `None` marks an invalid coordinate.
    #[must_use]
    pub const fn coordinates(&self) -> &C {
        &self.coordinates
    }

    /// Way identifier to node identifiers.
    #[must_use]
    pub const fn references(&self) -> &R {
        &self.references
    }

    /// Stores a node position.
    pub fn insert_node(&self, id: i64, lon: f64, lat: f64) -> Result<Insertion, OsmCacheError> {
        if id < 0 {
            warn!("skipping node with negative id {id}");
            return Ok(Insertion::Skipped);
        }
        let coord = validated_coord(lon, lat);
        self.coordinates
            .put(id, &coord)
            .map_err(|source| OsmCacheError::Store {
                element: "node",
                id,
                source,
            })?;
        Ok(if coord.is_some() {
            Insertion::Stored
        } else {
            Insertion::StoredWithoutCoordinate
        })
    }

    /// Stores the node references of a way.
    pub fn insert_way(&self, id: i64, refs: &[i64]) -> Result<Insertion, OsmCacheError> {
        if id < 0 {
            warn!("skipping way with negative id {id}");
            return Ok(Insertion::Skipped);
        }
        self.references
            .put(id, &refs.to_vec())
            .map_err(|source| OsmCacheError::Store {
                element: "way",
                id,
                source,
            })?;
        Ok(Insertion::Stored)
    }

    /// Flushes both maps.
    pub fn flush(&self) -> Result<(), CollectionError> {
        self.coordinates.flush()?;
        self.references.flush()
    }

    /// Closes both maps, keeping their storage.
    pub fn close(&self) -> Result<(), CollectionError> {
        self.coordinates.close()?;
        self.references.close()
    }

    fn record(
        &self,
        element: Element<'_>,
        summary: &mut OsmCacheSummary,
    ) -> Result<(), OsmCacheError> {
        let insertion = match element {
            Element::Node(node) => {
                let insertion = self.insert_node(node.id(), node.lon(), node.lat())?;
                Self::count_node(insertion, summary);
                insertion
            }
            Element::DenseNode(node) => {
                let insertion = self.insert_node(node.id(), node.lon(), node.lat())?;
                Self::count_node(insertion, summary);
                insertion
            }
            Element::Way(way) => {
                let refs: Vec<i64> = way.refs().collect();
                let insertion = self.insert_way(way.id(), &refs)?;
                if insertion != Insertion::Skipped {
                    summary.ways += 1;
                }
                insertion
            }
            Element::Relation(_) => {
                summary.relations += 1;
                Insertion::Stored
            }
        };
        if insertion == Insertion::Skipped {
            summary.skipped += 1;
        }
        Ok(())
    }

    fn count_node(insertion: Insertion, summary: &mut OsmCacheSummary) {
        match insertion {
            Insertion::Stored => summary.nodes += 1,
            Insertion::StoredWithoutCoordinate => {
                summary.nodes += 1;
                summary.invalid_coordinates += 1;
            }
            Insertion::Skipped => {}
        }
    }
}

/// Reads `path` and fills `cache` with its nodes and ways.
///
/// Elements are visited in file order. The first failed write stops further
/// writes and is returned once the reader finishes.
///
/// # Examples
/// ```no_run
/// use std::path::Path;
/// use orbis_core::codec::LongListDataType;
/// use orbis_core::{IndexedDataMap, OnHeapMemory, SparseDataMap};
/// use orbis_data::{OptionalCoordinateDataType, OsmCache, load_osm_pbf};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let cache = OsmCache::new(
///     SparseDataMap::new(
///         OnHeapMemory::default(),
///         OnHeapMemory::default(),
///         OptionalCoordinateDataType,
///     )?,
///     IndexedDataMap::new(OnHeapMemory::default(), LongListDataType::default())?,
/// );
/// let summary = load_osm_pbf(Path::new("monaco.osm.pbf"), &cache)?;
/// println!("Nodes: {}", summary.nodes);
/// # Ok(())
/// # }
/// ```
pub fn load_osm_pbf<C, R>(
    path: &Path,
    cache: &OsmCache<C, R>,
) -> Result<OsmCacheSummary, OsmCacheError>
where
    C: DataMap<Value = Option<Coord<f64>>>,
    R: DataMap<Value = Vec<i64>>,
{
    let reader = ElementReader::from_path(path).map_err(|source| OsmCacheError::Open {
        source,
        path: path.to_path_buf(),
    })?;

    let mut summary = OsmCacheSummary::default();
    let mut failure = None;
    reader
        .for_each(|element| {
            if failure.is_none()
                && let Err(err) = cache.record(element, &mut summary)
            {
                failure = Some(err);
            }
        })
        .map_err(|source| OsmCacheError::Decode {
            source,
            path: path.to_path_buf(),
        })?;
    if let Some(err) = failure {
        return Err(err);
    }

    if summary.invalid_coordinates > 0 {
        warn!(
            "stored {} nodes without coordinates",
            summary.invalid_coordinates
        );
    }
    info!(
        "cached {} nodes and {} ways from {}",
        summary.nodes,
        summary.ways,
        path.display()
    );
    Ok(summary)
}
