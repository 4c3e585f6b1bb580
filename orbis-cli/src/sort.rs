//! Sort command implementation for the Orbis CLI.

use std::io::{BufReader, BufWriter, Read, Write};

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use log::{info, warn};
use orbis_core::codec::LongDataType;
use orbis_core::{
    AlignedDataList, DEFAULT_HEADER_SIZE, DEFAULT_SEGMENT_SIZE, DataList, ExternalMergeSort,
    MappedDirectoryMemory, MemoryError, SortConfig,
};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_SEGMENT_SIZE, ARG_SORT_BATCH_SIZE, ARG_SORT_DISTINCT, ARG_SORT_INPUT, ARG_SORT_OUTPUT,
    ARG_SORT_PARALLEL, ARG_SORT_WORK_DIR, CliError, ENV_SORT_INPUT, ENV_SORT_OUTPUT,
    require_existing, write_summary,
};

const VALUE_SIZE: u64 = 8;

type LongList = AlignedDataList<LongDataType>;

/// CLI arguments for the `sort` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Sort a binary file of little-endian 64-bit integers that may \
                 be larger than memory. Values are staged in memory-mapped \
                 scratch files under the work directory, sorted in batches and \
                 merged into the output file.",
    about = "Sort a file of little-endian 64-bit integers"
)]
#[ortho_config(prefix = "ORBIS")]
pub(crate) struct SortArgs {
    /// File of little-endian `i64` values.
    #[arg(value_name = "path")]
    #[serde(default)]
    pub(crate) input: Option<Utf8PathBuf>,
    /// Destination for the sorted values.
    #[arg(long = ARG_SORT_OUTPUT, value_name = "path")]
    #[serde(default)]
    pub(crate) output: Option<Utf8PathBuf>,
    /// Scratch directory; defaults to `<output>.work`.
    #[arg(long = ARG_SORT_WORK_DIR, value_name = "dir")]
    #[serde(default)]
    pub(crate) work_dir: Option<Utf8PathBuf>,
    /// Values sorted in memory per batch.
    #[arg(long = ARG_SORT_BATCH_SIZE, value_name = "count")]
    #[serde(default)]
    pub(crate) batch_size: Option<usize>,
    /// Size of each scratch segment file in bytes (a power of two).
    #[arg(long = ARG_SEGMENT_SIZE, value_name = "bytes")]
    #[serde(default)]
    pub(crate) segment_size: Option<usize>,
    /// Drop repeated values from the output.
    #[arg(
        long = ARG_SORT_DISTINCT,
        value_name = "bool",
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    #[serde(default)]
    pub(crate) distinct: Option<bool>,
    /// Sort batches on all available cores.
    #[arg(
        long = ARG_SORT_PARALLEL,
        value_name = "bool",
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    #[serde(default)]
    pub(crate) parallel: Option<bool>,
}

impl SortArgs {
    pub(crate) fn into_config(self) -> Result<SortSettings, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        SortSettings::try_from(merged)
    }
}

/// Resolved `sort` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SortSettings {
    pub(crate) input: Utf8PathBuf,
    pub(crate) output: Utf8PathBuf,
    pub(crate) work_dir: Utf8PathBuf,
    pub(crate) segment_size: usize,
    pub(crate) sort: SortConfig,
}

impl SortSettings {
    pub(crate) fn validate_sources(&self) -> Result<(), CliError> {
        require_existing(&self.input, ARG_SORT_INPUT)?;
        if self.work_dir.exists() {
            return Err(CliError::WorkDirExists {
                path: self.work_dir.clone(),
            });
        }
        Ok(())
    }
}

impl TryFrom<SortArgs> for SortSettings {
    type Error = CliError;

    fn try_from(args: SortArgs) -> Result<Self, Self::Error> {
        let input = args.input.ok_or(CliError::MissingArgument {
            field: ARG_SORT_INPUT,
            env: ENV_SORT_INPUT,
        })?;
        let output = args.output.ok_or(CliError::MissingArgument {
            field: ARG_SORT_OUTPUT,
            env: ENV_SORT_OUTPUT,
        })?;
        let work_dir = args
            .work_dir
            .unwrap_or_else(|| Utf8PathBuf::from(format!("{output}.work")));
        let defaults = SortConfig::default();
        Ok(Self {
            input,
            output,
            work_dir,
            segment_size: args.segment_size.unwrap_or(DEFAULT_SEGMENT_SIZE),
            sort: SortConfig {
                batch_size: args.batch_size.unwrap_or(defaults.batch_size),
                distinct: args.distinct.unwrap_or(defaults.distinct),
                parallel: args.parallel.unwrap_or(defaults.parallel),
            },
        })
    }
}

/// Outcome of a `sort` run, printed as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct SortSummary {
    pub(crate) input: Utf8PathBuf,
    pub(crate) output: Utf8PathBuf,
    /// Values read from the input.
    pub(crate) values: u64,
    /// Values written to the output.
    pub(crate) written: u64,
    /// Sorted batches spilled to the work directory.
    pub(crate) batches: usize,
}

pub(crate) fn run_sort(args: SortArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let settings = args.into_config()?;
    settings.validate_sources()?;
    let summary = execute_sort(&settings)?;
    write_summary(writer, &summary)
}

/// Sorts `settings.input` into `settings.output`, removing the work
/// directory afterwards whatever the outcome.
pub(crate) fn execute_sort(settings: &SortSettings) -> Result<SortSummary, CliError> {
    orbis_fs::ensure_dir(&settings.work_dir).map_err(|source| CliError::PrepareDirectory {
        path: settings.work_dir.clone(),
        source,
    })?;
    let result = sort_in_work_dir(settings);
    if let Err(err) = orbis_fs::remove_dir_all(&settings.work_dir) {
        warn!(
            "failed to remove work directory {}: {err}",
            settings.work_dir
        );
    }
    result
}

fn sort_in_work_dir(settings: &SortSettings) -> Result<SortSummary, CliError> {
    let sorter = ExternalMergeSort::new(settings.sort)?;
    let scratch = |name: &str| -> Result<MappedDirectoryMemory, MemoryError> {
        MappedDirectoryMemory::open(
            settings.work_dir.join(name),
            DEFAULT_HEADER_SIZE,
            settings.segment_size,
        )
    };

    let input = LongList::new(scratch("input")?, LongDataType)?;
    let values = load_values(&settings.input, &input)?;
    let output = LongList::new(scratch("output")?, LongDataType)?;
    let mut batches = 0_usize;
    let written = sorter.sort(&input, &output, i64::cmp, || {
        batches += 1;
        LongList::new(scratch(&format!("batch-{batches}"))?, LongDataType)
    })?;
    store_values(&settings.output, &output)?;
    input.clear()?;
    output.clear()?;

    info!(
        "sorted {values} values from {} into {} ({written} written)",
        settings.input, settings.output
    );
    Ok(SortSummary {
        input: settings.input.clone(),
        output: settings.output.clone(),
        values,
        written,
        batches,
    })
}

fn load_values(path: &Utf8Path, list: &LongList) -> Result<u64, CliError> {
    let read_error = |source| CliError::ReadInput {
        path: path.to_path_buf(),
        source,
    };
    let file = orbis_fs::open_utf8_file(path).map_err(read_error)?;
    let len = file.metadata().map_err(read_error)?.len();
    if !len.is_multiple_of(VALUE_SIZE) {
        return Err(CliError::TruncatedInput {
            path: path.to_path_buf(),
            len,
        });
    }
    let mut reader = BufReader::new(file);
    let mut word = [0_u8; 8];
    for _ in 0..len / VALUE_SIZE {
        reader.read_exact(&mut word).map_err(read_error)?;
        list.add(&i64::from_le_bytes(word))?;
    }
    Ok(len / VALUE_SIZE)
}

fn store_values(path: &Utf8Path, list: &LongList) -> Result<(), CliError> {
    let write_error = |source| CliError::WriteOutput {
        path: path.to_path_buf(),
        source,
    };
    let file = orbis_fs::create_utf8_file(path).map_err(write_error)?;
    let mut writer = BufWriter::new(file);
    for value in list.iter() {
        writer
            .write_all(&value?.to_le_bytes())
            .map_err(write_error)?;
    }
    writer.flush().map_err(write_error)
}
