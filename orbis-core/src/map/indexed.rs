use std::collections::HashMap;

use parking_lot::RwLock;

use crate::codec::DataType;
use crate::error::CollectionError;
use crate::memory::Memory;
use crate::store::DataStore;

use super::{DataMap, Entries};

/// Arbitrary keys, in any order, pointing into a [`DataStore`] of
/// variable-size values.
///
/// The key index lives on the heap. Writing an existing key appends the new
/// value and repoints the key; the previous bytes are left in the store.
///
/// # Examples
///
/// ```
/// use orbis_core::codec::StringDataType;
/// use orbis_core::{DataMap, IndexedDataMap, OnHeapMemory};
///
/// # fn main() -> Result<(), orbis_core::CollectionError> {
/// let map = IndexedDataMap::new(OnHeapMemory::new(1024)?, StringDataType)?;
/// map.put(1, &String::from("a"))?;
/// map.put(2, &String::from("b"))?;
/// map.put(2, &String::from("c"))?;
/// assert_eq!(map.get(2)?.as_deref(), Some("c"));
/// assert_eq!(map.get(3)?, None);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct IndexedDataMap<D> {
    index: RwLock<HashMap<i64, u64>>,
    values: DataStore<D>,
}

impl<D: DataType> IndexedDataMap<D> {
    /// Builds an empty map whose values are appended to `memory`.
    pub fn new(memory: impl Memory + 'static, data_type: D) -> Result<Self, CollectionError> {
        Ok(Self {
            index: RwLock::new(HashMap::new()),
            values: DataStore::new(memory, data_type)?,
        })
    }

    /// Store holding every value ever written, superseded ones included.
    pub const fn values(&self) -> &DataStore<D> {
        &self.values
    }
}

impl<D: DataType> DataMap for IndexedDataMap<D> {
    type Value = D::Value;

    fn put(&self, key: i64, value: &D::Value) -> Result<(), CollectionError> {
        let position = self.values.add(value)?;
        self.index.write().insert(key, position);
        Ok(())
    }

    fn get(&self, key: i64) -> Result<Option<D::Value>, CollectionError> {
        let position = self.index.read().get(&key).copied();
        position.map(|position| self.values.get(position)).transpose()
    }

    fn contains_key(&self, key: i64) -> Result<bool, CollectionError> {
        Ok(self.index.read().contains_key(&key))
    }

    fn size(&self) -> u64 {
        self.index.read().len() as u64
    }

    fn entries(&self) -> Entries<'_, D::Value> {
        let mut keys: Vec<(i64, u64)> = self
            .index
            .read()
            .iter()
            .map(|(key, position)| (*key, *position))
            .collect();
        keys.sort_unstable_by_key(|(key, _)| *key);
        Box::new(
            keys.into_iter()
                .map(|(key, position)| Ok::<_, CollectionError>((key, self.values.get(position)?))),
        )
    }

    fn flush(&self) -> Result<(), CollectionError> {
        self.values.flush()
    }

    fn close(&self) -> Result<(), CollectionError> {
        self.values.close()
    }

    fn clear(&self) -> Result<(), CollectionError> {
        self.index.write().clear();
        self.values.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{LongListDataType, StringDataType};
    use crate::memory::OnHeapMemory;
    use rstest::rstest;

    #[rstest]
    fn last_write_wins() {
        let map = IndexedDataMap::new(OnHeapMemory::new(64).expect("memory"), StringDataType)
            .expect("map");
        map.put(1, &"a".to_owned()).expect("put");
        map.put(2, &"b".to_owned()).expect("put");
        map.put(2, &"c".to_owned()).expect("put");
        assert_eq!(map.get(2).expect("get").as_deref(), Some("c"));
        assert_eq!(map.get(3).expect("get"), None);
        assert_eq!(map.size(), 2);
        assert_eq!(map.values().size(), 3);
    }

    #[rstest]
    fn keys_may_arrive_in_any_order() {
        let map = IndexedDataMap::new(
            OnHeapMemory::new(128).expect("memory"),
            LongListDataType::default(),
        )
        .expect("map");
        for key in [42_i64, -7, 9, 0] {
            map.put(key, &vec![key, key + 1]).expect("put");
        }
        let keys: Vec<i64> = map
            .entries()
            .map(|entry| entry.map(|(key, _)| key))
            .collect::<Result<_, _>>()
            .expect("entries");
        assert_eq!(keys, vec![-7, 0, 9, 42]);
        assert_eq!(map.get(-7).expect("get"), Some(vec![-7, -6]));
    }

    #[rstest]
    fn clear_forgets_every_key() {
        let map = IndexedDataMap::new(OnHeapMemory::new(64).expect("memory"), StringDataType)
            .expect("map");
        map.put(1, &"a".to_owned()).expect("put");
        map.clear().expect("clear");
        assert!(map.is_empty());
        assert!(!map.contains_key(1).expect("contains"));
    }
}
