//! Error types emitted by the Orbis CLI.
//!
//! Keep this error type reasonably small, as every command helper returns
//! `Result<_, CliError>` and the workspace enables `clippy::result_large_err`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use orbis_core::{CollectionError, MemoryError, SortError};
use orbis_data::OsmCacheError;
use thiserror::Error;

/// Errors emitted by the Orbis CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        /// Flag name of the missing option.
        field: &'static str,
        /// Environment variable that could supply it.
        env: &'static str,
    },
    /// A referenced input path does not exist on disk.
    #[error("{field} path {path:?} does not exist")]
    MissingSourceFile {
        /// Flag naming the path.
        field: &'static str,
        /// Offending path.
        path: Utf8PathBuf,
    },
    /// A referenced input path exists but is not a file.
    #[error("{field} path {path:?} exists but is not a file")]
    SourcePathNotFile {
        /// Flag naming the path.
        field: &'static str,
        /// Offending path.
        path: Utf8PathBuf,
    },
    /// A referenced input path could not be inspected due to an IO error.
    #[error("failed to inspect {field} path {path:?}: {source}")]
    InspectSourcePath {
        /// Flag naming the path.
        field: &'static str,
        /// Offending path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// The sort work directory is already present.
    #[error("work directory {path:?} already exists; remove it or pass another --work-dir")]
    WorkDirExists {
        /// Existing directory.
        path: Utf8PathBuf,
    },
    /// A scratch or cache directory could not be prepared.
    #[error("failed to prepare directory {path:?}: {source}")]
    PrepareDirectory {
        /// Directory being created or emptied.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// Reading the sort input failed.
    #[error("failed to read values from {path:?}: {source}")]
    ReadInput {
        /// Input file.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// The sort input length is not a whole number of 8-byte values.
    #[error("input {path:?} holds {len} bytes, which is not a multiple of 8")]
    TruncatedInput {
        /// Input file.
        path: Utf8PathBuf,
        /// Length of the file in bytes.
        len: u64,
    },
    /// Writing the sorted output failed.
    #[error("failed to write values to {path:?}: {source}")]
    WriteOutput {
        /// Output file.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// Opening scratch or cache memory failed.
    #[error(transparent)]
    Memory(#[from] MemoryError),
    /// A collection operation failed.
    #[error(transparent)]
    Collection(#[from] CollectionError),
    /// The external merge sort failed.
    #[error("sort failed: {0}")]
    Sort(#[from] SortError),
    /// Loading the OSM cache failed.
    #[error("failed to build OSM cache: {0}")]
    OsmCache(#[from] OsmCacheError),
    /// Serializing a command summary failed.
    #[error("failed to serialize summary: {0}")]
    SerializeSummary(#[source] serde_json::Error),
    /// Writing a command summary failed.
    #[error("failed to write summary: {0}")]
    WriteSummary(#[source] std::io::Error),
}
