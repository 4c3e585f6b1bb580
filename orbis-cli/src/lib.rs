//! Command-line interface for Orbis storage tooling.
//!
//! - `orbis sort` orders a file of little-endian `i64` values through an
//!   external merge sort over memory-mapped scratch space.
//! - `orbis cache` loads node coordinates and way references from an
//!   OpenStreetMap PBF file into memory-mapped maps on disk.
//!
//! Both commands print a JSON summary on standard output.
#![forbid(unsafe_code)]

use std::io::Write;

use camino::Utf8Path;
use clap::{Parser, Subcommand};
use log::LevelFilter;
use serde::Serialize;

mod cache;
mod error;
mod sort;

pub use error::CliError;

use cache::{CacheArgs, run_cache};
use sort::{SortArgs, run_sort};

const ARG_SORT_INPUT: &str = "input";
const ARG_SORT_OUTPUT: &str = "output";
const ARG_SORT_WORK_DIR: &str = "work-dir";
const ARG_SORT_BATCH_SIZE: &str = "batch-size";
const ARG_SORT_DISTINCT: &str = "distinct";
const ARG_SORT_PARALLEL: &str = "parallel";
const ARG_SEGMENT_SIZE: &str = "segment-size";
const ARG_CACHE_OSM_PBF: &str = "osm-pbf";
const ARG_CACHE_DIR: &str = "cache-dir";
const ENV_SORT_INPUT: &str = "ORBIS_CMDS_SORT_INPUT";
const ENV_SORT_OUTPUT: &str = "ORBIS_CMDS_SORT_OUTPUT";
const ENV_CACHE_OSM_PBF: &str = "ORBIS_CMDS_CACHE_OSM_PBF";
const ENV_CACHE_DIR: &str = "ORBIS_CMDS_CACHE_CACHE_DIR";

/// Run the Orbis CLI with the current process arguments and environment.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    init_logging(cli.verbose);
    let mut stdout = std::io::stdout().lock();
    match cli.command {
        Command::Sort(args) => run_sort(args, &mut stdout),
        Command::Cache(args) => run_cache(args, &mut stdout),
    }
}

fn init_logging(verbose: bool) {
    if verbose {
        env_logger::builder().filter_level(LevelFilter::Info).init();
    } else {
        env_logger::init();
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "orbis",
    about = "Segmented storage utilities for OpenStreetMap data",
    version
)]
struct Cli {
    /// Log progress at info level, ignoring `RUST_LOG`.
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sort a file of 64-bit integers larger than memory.
    Sort(SortArgs),
    /// Cache node coordinates and way references from an OSM PBF file.
    Cache(CacheArgs),
}

/// Checks that a configured input path names an existing regular file.
fn require_existing(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
    match orbis_fs::file_is_file(path) {
        Ok(true) => Ok(()),
        Ok(false) => Err(CliError::SourcePathNotFile {
            field,
            path: path.to_path_buf(),
        }),
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
            Err(CliError::MissingSourceFile {
                field,
                path: path.to_path_buf(),
            })
        }
        Err(source) => Err(CliError::InspectSourcePath {
            field,
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn write_summary<S: Serialize>(writer: &mut dyn Write, summary: &S) -> Result<(), CliError> {
    serde_json::to_writer_pretty(&mut *writer, summary).map_err(CliError::SerializeSummary)?;
    writeln!(writer).map_err(CliError::WriteSummary)
}

#[cfg(test)]
mod tests;
