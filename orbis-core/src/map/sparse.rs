use parking_lot::Mutex;

use crate::codec::{FixedSizeDataType, LongDataType, PairDataType, UnsignedLongDataType};
use crate::error::CollectionError;
use crate::list::{AlignedDataList, DataList, FixedSizeDataList};
use crate::memory::Memory;
use crate::search::search_by;

use super::{CHUNK_SHIFT, DataMap, Entries, check_order, chunk_of};

type DirectoryEntry = PairDataType<UnsignedLongDataType, UnsignedLongDataType>;

/// A bulk-loaded map for sparse but locally dense keyspaces, such as node
/// identifiers of a regional extract.
///
/// Every chunk records the index of its first entry and how many keys at the
/// start of the chunk are absent. A lookup returns `None` for keys before the
/// chunk's first key or for empty chunks, then probes the index the key would
/// have if the chunk had no gaps. Only when that probe misses is the chunk's
/// populated range binary-searched. Keys and values are stored side by side
/// as fixed-size pairs.
///
/// # Examples
///
/// ```
/// use orbis_core::codec::DoubleDataType;
/// use orbis_core::{DataMap, OnHeapMemory, SparseDataMap};
///
/// # fn main() -> Result<(), orbis_core::CollectionError> {
/// let map = SparseDataMap::new(OnHeapMemory::new(1024)?, OnHeapMemory::new(1024)?, DoubleDataType)?;
/// for key in 1_000..1_010 {
///     map.put(key, &(key as f64 / 10.0))?;
/// }
/// assert_eq!(map.get(1_004)?, Some(100.4));
/// assert_eq!(map.get(999)?, None);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SparseDataMap<D> {
    directory: AlignedDataList<DirectoryEntry>,
    entries: FixedSizeDataList<PairDataType<LongDataType, D>>,
    last_key: Mutex<Option<i64>>,
}

impl<D: FixedSizeDataType> SparseDataMap<D> {
    /// Builds a map keeping the chunk directory in `directory_memory` and the
    /// key/value pairs in `entry_memory`.
    pub fn new(
        directory_memory: impl Memory + 'static,
        entry_memory: impl Memory + 'static,
        data_type: D,
    ) -> Result<Self, CollectionError> {
        let entries = FixedSizeDataList::new(entry_memory, PairDataType::new(LongDataType, data_type))?;
        let last_key = match entries.size() {
            0 => None,
            size => Some(entries.get(size - 1)?.0),
        };
        Ok(Self {
            directory: AlignedDataList::new(directory_memory, DirectoryEntry::default())?,
            entries,
            last_key: Mutex::new(last_key),
        })
    }

    fn index_of(&self, key: i64) -> Result<Option<u64>, CollectionError> {
        if key < 0 {
            return Ok(None);
        }
        let chunk = chunk_of(key);
        let chunk_count = self.directory.size();
        if chunk >= chunk_count {
            return Ok(None);
        }
        let (lo, leading_absent) = self.directory.get(chunk)?;
        let hi = if chunk + 1 < chunk_count {
            self.directory.get(chunk + 1)?.0
        } else {
            self.entries.size()
        };
        let offset = key.unsigned_abs() - (chunk << CHUNK_SHIFT);
        if offset < leading_absent {
            return Ok(None);
        }
        if lo >= hi {
            return Ok(None);
        }
        let expected = lo + (offset - leading_absent);
        if expected < hi && self.entries.get(expected)?.0 == key {
            return Ok(Some(expected));
        }
        search_by(&self.entries, lo, hi - 1, |(candidate, _)| candidate.cmp(&key))
    }
}

impl<D> DataMap for SparseDataMap<D>
where
    D: FixedSizeDataType,
    D::Value: Clone,
{
    type Value = D::Value;

    fn put(&self, key: i64, value: &D::Value) -> Result<(), CollectionError> {
        let mut last_key = self.last_key.lock();
        check_order(*last_key, key)?;
        if key < 0 {
            return Err(CollectionError::KeyOutOfRange { key });
        }
        let index = self.entries.size();
        let chunk = chunk_of(key);
        while self.directory.size() <= chunk {
            let leading_absent = if self.directory.size() == chunk {
                key.unsigned_abs() - (chunk << CHUNK_SHIFT)
            } else {
                0
            };
            self.directory.add(&(index, leading_absent))?;
        }
        self.entries.add(&(key, value.clone()))?;
        *last_key = Some(key);
        Ok(())
    }

    fn get(&self, key: i64) -> Result<Option<D::Value>, CollectionError> {
        match self.index_of(key)? {
            Some(index) => Ok(Some(self.entries.get(index)?.1)),
            None => Ok(None),
        }
    }

    fn contains_key(&self, key: i64) -> Result<bool, CollectionError> {
        Ok(self.index_of(key)?.is_some())
    }

    fn size(&self) -> u64 {
        self.entries.size()
    }

    fn entries(&self) -> Entries<'_, D::Value> {
        Box::new(self.entries.iter())
    }

    fn flush(&self) -> Result<(), CollectionError> {
        self.directory.flush()?;
        self.entries.flush()
    }

    fn close(&self) -> Result<(), CollectionError> {
        self.directory.close()?;
        self.entries.close()
    }

    fn clear(&self) -> Result<(), CollectionError> {
        *self.last_key.lock() = None;
        self.directory.clear()?;
        self.entries.clear()
    }
}
