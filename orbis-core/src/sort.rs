//! Out-of-core sorting of [`DataList`]s.
//!
//! The input is read in windows of `batch_size` values. Each window is sorted
//! in memory (optionally with rayon), optionally deduplicated, and spilled to
//! a temporary list obtained from a caller-supplied factory, so the temporary
//! storage may be on the heap, off the heap or memory-mapped. The sorted
//! batches are then merged through a binary heap of one-element lookahead
//! cursors into the output list.
//!
//! Temporary batches are released as soon as they are exhausted, and every
//! remaining batch is released when the sort ends, whether it succeeded or
//! not.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use log::{debug, info, warn};
use rayon::slice::ParallelSliceMut;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{CollectionError, SortError};
use crate::list::DataList;

/// Default number of values sorted in memory at once.
pub const DEFAULT_BATCH_SIZE: usize = 100_000;

/// Tuning for [`ExternalMergeSort`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct SortConfig {
    /// Values per in-memory batch; must be at least 1.
    pub batch_size: usize,
    /// Keep only the first value of every run of comparator-equal values.
    pub distinct: bool,
    /// Sort each batch on the rayon thread pool.
    pub parallel: bool,
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            distinct: false,
            parallel: false,
        }
    }
}

/// Batch-then-merge sort over lists larger than memory.
///
/// # Examples
///
/// ```
/// use orbis_core::codec::LongDataType;
/// use orbis_core::{
///     AlignedDataList, DataList, ExternalMergeSort, OnHeapMemory, SortConfig,
/// };
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let list = || AlignedDataList::new(OnHeapMemory::new(1024)?, LongDataType);
/// let input = list()?;
/// for value in [5, 1, 4, 1, 3] {
///     input.add(&value)?;
/// }
/// let output = list()?;
/// let sort = ExternalMergeSort::new(SortConfig {
///     batch_size: 2,
///     distinct: true,
///     ..SortConfig::default()
/// })?;
/// sort.sort(&input, &output, i64::cmp, list)?;
/// assert_eq!(output.iter().collect::<Result<Vec<_>, _>>()?, vec![1, 3, 4, 5]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ExternalMergeSort {
    config: SortConfig,
}

impl ExternalMergeSort {
    /// Validates `config`.
    pub fn new(config: SortConfig) -> Result<Self, SortError> {
        if config.batch_size == 0 {
            return Err(SortError::InvalidBatchSize);
        }
        Ok(Self { config })
    }

    /// Active configuration.
    pub const fn config(&self) -> SortConfig {
        self.config
    }

    /// Sorts `input` into `output` and returns the number of values written.
    ///
    /// `supplier` is called once per batch and must return an empty list.
    /// `input` is left untouched; `output` is appended to.
    pub fn sort<L, O, T, C, S>(
        &self,
        input: &L,
        output: &O,
        comparator: C,
        supplier: S,
    ) -> Result<u64, SortError>
    where
        L: DataList,
        L::Value: Send,
        O: DataList<Value = L::Value>,
        T: DataList<Value = L::Value>,
        C: Fn(&L::Value, &L::Value) -> Ordering + Sync,
        S: FnMut() -> Result<T, CollectionError>,
    {
        let mut batches = Vec::new();
        let result = self
            .spill(input, &comparator, supplier, &mut batches)
            .and_then(|()| merge(&batches, output, &comparator, self.config.distinct));
        release_all(&batches);
        if let Ok(written) = result {
            info!(
                "sorted {} values into {written} through {} batches",
                input.size(),
                batches.len()
            );
        }
        result
    }

    fn spill<L, T, C, S>(
        &self,
        input: &L,
        comparator: &C,
        mut supplier: S,
        batches: &mut Vec<T>,
    ) -> Result<(), SortError>
    where
        L: DataList,
        L::Value: Send,
        T: DataList<Value = L::Value>,
        C: Fn(&L::Value, &L::Value) -> Ordering + Sync,
        S: FnMut() -> Result<T, CollectionError>,
    {
        let size = input.size();
        let batch_size = self.config.batch_size as u64;
        let mut start = 0;
        while start < size {
            let end = size.min(start.saturating_add(batch_size));
            let mut values = (start..end)
                .map(|index| input.get(index))
                .collect::<Result<Vec<_>, _>>()?;
            if self.config.parallel {
                values.par_sort_by(|a, b| comparator(a, b));
            } else {
                values.sort_by(|a, b| comparator(a, b));
            }
            if self.config.distinct {
                values.dedup_by(|later, earlier| comparator(earlier, later) == Ordering::Equal);
            }

            let batch = supplier().map_err(|source| SortError::TemporaryStorage { source })?;
            batches.push(batch);
            if let Some(batch) = batches.last() {
                for value in &values {
                    batch.add(value)?;
                }
            }
            debug!(
                "spilled batch {} with {} values",
                batches.len() - 1,
                values.len()
            );
            start = end;
        }
        Ok(())
    }
}

/// Merges individually sorted `batches` into `output` and returns the number
/// of values written.
///
/// With `distinct`, a value comparator-equal to the last written value is
/// skipped, which removes duplicates spanning batches; the first value of
/// each equal run (in batch order) is kept. Every batch is cleared once the
/// merge ends.
pub fn merge_sorted_batches<B, O, C>(
    batches: &[B],
    output: &O,
    comparator: C,
    distinct: bool,
) -> Result<u64, SortError>
where
    B: DataList,
    O: DataList<Value = B::Value>,
    C: Fn(&B::Value, &B::Value) -> Ordering,
{
    let result = merge(batches, output, &comparator, distinct);
    release_all(batches);
    result
}

fn merge<B, O, C>(batches: &[B], output: &O, comparator: &C, distinct: bool) -> Result<u64, SortError>
where
    B: DataList,
    O: DataList<Value = B::Value>,
    C: Fn(&B::Value, &B::Value) -> Ordering,
{
    let mut heap = BinaryHeap::with_capacity(batches.len());
    for (ordinal, batch) in batches.iter().enumerate() {
        match BatchCursor::open(batch, ordinal, comparator)? {
            Some(cursor) => heap.push(cursor),
            None => release(batch),
        }
    }

    let mut last: Option<B::Value> = None;
    let mut written = 0;
    while let Some(cursor) = heap.pop() {
        let batch = cursor.batch;
        let (value, next) = cursor.advance()?;
        match next {
            Some(cursor) => heap.push(cursor),
            None => release(batch),
        }
        if distinct {
            if last
                .as_ref()
                .is_some_and(|last| comparator(last, &value) == Ordering::Equal)
            {
                continue;
            }
            output.add(&value)?;
            last = Some(value);
        } else {
            output.add(&value)?;
        }
        written += 1;
    }
    Ok(written)
}

fn release<B: DataList>(batch: &B) {
    if let Err(err) = batch.clear() {
        warn!("failed to release temporary sort batch: {err}");
    }
}

fn release_all<B: DataList>(batches: &[B]) {
    for batch in batches {
        release(batch);
    }
}

/// One-element lookahead over a sorted batch.
///
/// The heap is a max-heap, so cursors order themselves by the reversed
/// comparator; ties go to the earlier batch.
struct BatchCursor<'a, B: DataList, C> {
    batch: &'a B,
    ordinal: usize,
    next_index: u64,
    head: B::Value,
    comparator: &'a C,
}

impl<'a, B, C> BatchCursor<'a, B, C>
where
    B: DataList,
    C: Fn(&B::Value, &B::Value) -> Ordering,
{
    fn open(batch: &'a B, ordinal: usize, comparator: &'a C) -> Result<Option<Self>, CollectionError> {
        if batch.is_empty() {
            return Ok(None);
        }
        Ok(Some(Self {
            head: batch.get(0)?,
            batch,
            ordinal,
            next_index: 1,
            comparator,
        }))
    }

    /// Returns the head and the cursor positioned on the following value, if any.
    fn advance(mut self) -> Result<(B::Value, Option<Self>), CollectionError> {
        if self.next_index >= self.batch.size() {
            return Ok((self.head, None));
        }
        let next = self.batch.get(self.next_index)?;
        self.next_index += 1;
        let head = std::mem::replace(&mut self.head, next);
        Ok((head, Some(self)))
    }
}

impl<B, C> Ord for BatchCursor<'_, B, C>
where
    B: DataList,
    C: Fn(&B::Value, &B::Value) -> Ordering,
{
    fn cmp(&self, other: &Self) -> Ordering {
        (self.comparator)(&other.head, &self.head).then_with(|| other.ordinal.cmp(&self.ordinal))
    }
}

impl<B, C> PartialOrd for BatchCursor<'_, B, C>
where
    B: DataList,
    C: Fn(&B::Value, &B::Value) -> Ordering,
{
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<B, C> PartialEq for BatchCursor<'_, B, C>
where
    B: DataList,
    C: Fn(&B::Value, &B::Value) -> Ordering,
{
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<B, C> Eq for BatchCursor<'_, B, C>
where
    B: DataList,
    C: Fn(&B::Value, &B::Value) -> Ordering,
{
}
