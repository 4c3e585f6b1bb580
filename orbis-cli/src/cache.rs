//! Cache command implementation for the Orbis CLI.

use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use orbis_core::codec::LongListDataType;
use orbis_core::{
    DEFAULT_HEADER_SIZE, DEFAULT_SEGMENT_SIZE, IndexedDataList, MappedDirectoryMemory,
    MemoryError, SortedDataMap, SparseDataMap,
};
use orbis_data::{OptionalCoordinateDataType, OsmCache, OsmCacheSummary, load_osm_pbf};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_CACHE_DIR, ARG_CACHE_OSM_PBF, ARG_SEGMENT_SIZE, CliError, ENV_CACHE_DIR,
    ENV_CACHE_OSM_PBF, require_existing, write_summary,
};

const NODES_DIR: &str = "nodes";
const WAYS_DIR: &str = "ways";

/// Cache whose maps live in memory-mapped directories on disk.
pub(crate) type DiskCache = OsmCache<
    SparseDataMap<OptionalCoordinateDataType>,
    SortedDataMap<IndexedDataList<LongListDataType>>,
>;

/// CLI arguments for the `cache` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Read an OpenStreetMap PBF file and store node coordinates \
                 and way node references in memory-mapped maps under the \
                 cache directory. Existing cache contents are replaced.",
    about = "Cache node coordinates and way references from an OSM PBF file"
)]
#[ortho_config(prefix = "ORBIS")]
pub(crate) struct CacheArgs {
    /// Path to the OpenStreetMap PBF file.
    #[arg(long = ARG_CACHE_OSM_PBF, value_name = "path")]
    #[serde(default)]
    pub(crate) osm_pbf: Option<Utf8PathBuf>,
    /// Directory receiving the cache maps.
    #[arg(long = ARG_CACHE_DIR, value_name = "dir")]
    #[serde(default)]
    pub(crate) cache_dir: Option<Utf8PathBuf>,
    /// Size of each segment file in bytes (a power of two).
    #[arg(long = ARG_SEGMENT_SIZE, value_name = "bytes")]
    #[serde(default)]
    pub(crate) segment_size: Option<usize>,
}

impl CacheArgs {
    pub(crate) fn into_config(self) -> Result<CacheSettings, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        CacheSettings::try_from(merged)
    }
}

/// Resolved `cache` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CacheSettings {
    pub(crate) osm_pbf: Utf8PathBuf,
    pub(crate) cache_dir: Utf8PathBuf,
    pub(crate) segment_size: usize,
}

impl CacheSettings {
    pub(crate) fn validate_sources(&self) -> Result<(), CliError> {
        require_existing(&self.osm_pbf, ARG_CACHE_OSM_PBF)
    }
}

impl TryFrom<CacheArgs> for CacheSettings {
    type Error = CliError;

    fn try_from(args: CacheArgs) -> Result<Self, Self::Error> {
        let osm_pbf = args.osm_pbf.ok_or(CliError::MissingArgument {
            field: ARG_CACHE_OSM_PBF,
            env: ENV_CACHE_OSM_PBF,
        })?;
        let cache_dir = args.cache_dir.ok_or(CliError::MissingArgument {
            field: ARG_CACHE_DIR,
            env: ENV_CACHE_DIR,
        })?;
        Ok(Self {
            osm_pbf,
            cache_dir,
            segment_size: args.segment_size.unwrap_or(DEFAULT_SEGMENT_SIZE),
        })
    }
}

/// Outcome of a `cache` run, printed as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct CacheSummary {
    pub(crate) osm_pbf: Utf8PathBuf,
    pub(crate) cache_dir: Utf8PathBuf,
    #[serde(flatten)]
    pub(crate) counts: OsmCacheSummary,
}

pub(crate) fn run_cache(args: CacheArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let settings = args.into_config()?;
    settings.validate_sources()?;
    let summary = execute_cache(&settings)?;
    write_summary(writer, &summary)
}

pub(crate) fn execute_cache(settings: &CacheSettings) -> Result<CacheSummary, CliError> {
    for name in [NODES_DIR, WAYS_DIR] {
        let path = settings.cache_dir.join(name);
        orbis_fs::remove_dir_all(&path)
            .map_err(|source| CliError::PrepareDirectory { path, source })?;
    }
    let cache = open_cache(&settings.cache_dir, settings.segment_size)?;
    let loaded = load_osm_pbf(settings.osm_pbf.as_std_path(), &cache);
    let closed = cache.close();
    let counts = loaded?;
    closed?;
    Ok(CacheSummary {
        osm_pbf: settings.osm_pbf.clone(),
        cache_dir: settings.cache_dir.clone(),
        counts,
    })
}

/// Opens (or reopens) the on-disk cache maps under `dir`.
pub(crate) fn open_cache(dir: &Utf8Path, segment_size: usize) -> Result<DiskCache, CliError> {
    let memory = |name: &str| -> Result<MappedDirectoryMemory, MemoryError> {
        MappedDirectoryMemory::open(dir.join(name), DEFAULT_HEADER_SIZE, segment_size)
    };
    let coordinates = SparseDataMap::new(
        memory("nodes/directory")?,
        memory("nodes/entries")?,
        OptionalCoordinateDataType,
    )?;
    let references = SortedDataMap::new(
        memory("ways/chunks")?,
        memory("ways/keys")?,
        IndexedDataList::new(
            memory("ways/index")?,
            memory("ways/values")?,
            LongListDataType::default(),
        )?,
    )?;
    Ok(OsmCache::new(coordinates, references))
}
