use parking_lot::Mutex;

use crate::codec::{LongDataType, UnsignedLongDataType};
use crate::error::CollectionError;
use crate::list::{AlignedDataList, DataList};
use crate::memory::Memory;
use crate::search::binary_search_in;

use super::{DataMap, Entries, check_order, chunk_of};

/// A bulk-loaded map: keys arrive in non-decreasing order and each chunk of
/// 256 keys records the index of its first key.
///
/// A lookup reads the chunk's `[lo, hi)` range from the directory (the next
/// chunk's start, or the key count for the last chunk) and binary-searches
/// the keys inside it.
///
/// # Examples
///
/// ```
/// use orbis_core::codec::StringDataType;
/// use orbis_core::{DataMap, IndexedDataList, OnHeapMemory, SortedDataMap};
///
/// # fn main() -> Result<(), orbis_core::CollectionError> {
/// let values = IndexedDataList::new(
///     OnHeapMemory::new(1024)?,
///     OnHeapMemory::new(1024)?,
///     StringDataType,
/// )?;
/// let map = SortedDataMap::new(OnHeapMemory::new(1024)?, OnHeapMemory::new(1024)?, values)?;
/// map.put(3, &String::from("three"))?;
/// map.put(700, &String::from("seven hundred"))?;
/// assert_eq!(map.get(700)?.as_deref(), Some("seven hundred"));
/// assert_eq!(map.get(4)?, None);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SortedDataMap<L> {
    chunks: AlignedDataList<UnsignedLongDataType>,
    keys: AlignedDataList<LongDataType>,
    values: L,
    last_key: Mutex<Option<i64>>,
}

impl<L: DataList> SortedDataMap<L> {
    /// Builds a map storing the chunk directory in `chunk_memory`, keys in
    /// `key_memory` and values in `values`.
    ///
    /// Rebuilding over previously closed storage resumes after the last key.
    pub fn new(
        chunk_memory: impl Memory + 'static,
        key_memory: impl Memory + 'static,
        values: L,
    ) -> Result<Self, CollectionError> {
        let keys = AlignedDataList::new(key_memory, LongDataType)?;
        let last_key = match keys.size() {
            0 => None,
            size => Some(keys.get(size - 1)?),
        };
        Ok(Self {
            chunks: AlignedDataList::new(chunk_memory, UnsignedLongDataType)?,
            keys,
            values,
            last_key: Mutex::new(last_key),
        })
    }

    fn chunk_range(&self, chunk: u64) -> Result<Option<(u64, u64)>, CollectionError> {
        let chunk_count = self.chunks.size();
        if chunk >= chunk_count {
            return Ok(None);
        }
        let lo = self.chunks.get(chunk)?;
        let hi = if chunk + 1 < chunk_count {
            self.chunks.get(chunk + 1)?
        } else {
            self.keys.size()
        };
        Ok((lo < hi).then_some((lo, hi)))
    }

    fn index_of(&self, key: i64) -> Result<Option<u64>, CollectionError> {
        if key < 0 {
            return Ok(None);
        }
        match self.chunk_range(chunk_of(key))? {
            Some((lo, hi)) => binary_search_in(&self.keys, &key, i64::cmp, lo, hi - 1),
            None => Ok(None),
        }
    }
}

impl<L: DataList> DataMap for SortedDataMap<L> {
    type Value = L::Value;

    fn put(&self, key: i64, value: &L::Value) -> Result<(), CollectionError> {
        let mut last_key = self.last_key.lock();
        check_order(*last_key, key)?;
        if key < 0 {
            return Err(CollectionError::KeyOutOfRange { key });
        }
        let index = self.keys.size();
        let chunk = chunk_of(key);
        while self.chunks.size() <= chunk {
            self.chunks.add(&index)?;
        }
        self.keys.add(&key)?;
        self.values.add(value)?;
        *last_key = Some(key);
        Ok(())
    }

    fn get(&self, key: i64) -> Result<Option<L::Value>, CollectionError> {
        match self.index_of(key)? {
            Some(index) => self.values.get(index).map(Some),
            None => Ok(None),
        }
    }

    fn contains_key(&self, key: i64) -> Result<bool, CollectionError> {
        Ok(self.index_of(key)?.is_some())
    }

    fn size(&self) -> u64 {
        self.keys.size()
    }

    fn entries(&self) -> Entries<'_, L::Value> {
        Box::new(
            self.keys
                .iter()
                .zip(self.values.iter())
                .map(|(key, value)| Ok::<_, CollectionError>((key?, value?))),
        )
    }

    fn flush(&self) -> Result<(), CollectionError> {
        self.chunks.flush()?;
        self.keys.flush()?;
        self.values.flush()
    }

    fn close(&self) -> Result<(), CollectionError> {
        self.chunks.close()?;
        self.keys.close()?;
        self.values.close()
    }

    fn clear(&self) -> Result<(), CollectionError> {
        *self.last_key.lock() = None;
        self.chunks.clear()?;
        self.keys.clear()?;
        self.values.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::LongDataType;
    use crate::memory::OnHeapMemory;
    use rstest::{fixture, rstest};

    type LongMap = SortedDataMap<AlignedDataList<LongDataType>>;

    #[fixture]
    fn map() -> LongMap {
        let memory = || OnHeapMemory::new(256).expect("memory");
        let values = AlignedDataList::new(memory(), LongDataType).expect("values");
        SortedDataMap::new(memory(), memory(), values).expect("map")
    }

    #[rstest]
    fn finds_keys_across_sparse_chunks(map: LongMap) {
        let keys = [0_i64, 1, 255, 256, 1_000, 70_000, 70_001];
        for key in keys {
            map.put(key, &(key * 2)).expect("put");
        }
        for key in keys {
            assert_eq!(map.get(key).expect("get"), Some(key * 2));
        }
        for missing in [2, 257, 999, 69_999, 70_002, 1 << 40, -5] {
            assert_eq!(map.get(missing).expect("get"), None);
        }
        assert_eq!(map.size(), keys.len() as u64);
    }

    #[rstest]
    fn rejects_keys_that_go_backwards(map: LongMap) {
        map.put(10, &1).expect("put");
        map.put(10, &2).expect("equal keys are accepted");
        assert!(matches!(
            map.put(9, &3),
            Err(CollectionError::UnorderedKey {
                previous: 10,
                key: 9
            })
        ));
        assert_eq!(map.size(), 2);
    }

    #[rstest]
    fn negative_keys_cannot_be_stored(map: LongMap) {
        assert!(matches!(
            map.put(-1, &0),
            Err(CollectionError::KeyOutOfRange { key: -1 })
        ));
        assert!(!map.contains_key(-1).expect("contains"));
    }

    #[rstest]
    fn entries_follow_key_order(map: LongMap) {
        for key in [4_i64, 300, 301] {
            map.put(key, &-key).expect("put");
        }
        let entries: Vec<_> = map.entries().collect::<Result<_, _>>().expect("entries");
        assert_eq!(entries, vec![(4, -4), (300, -300), (301, -301)]);
    }
}
