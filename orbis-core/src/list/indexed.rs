use crate::codec::{DataType, UnsignedLongDataType};
use crate::error::CollectionError;
use crate::memory::Memory;
use crate::store::DataStore;

use super::{AlignedDataList, DataList};

/// Variable-size elements: the values live in a [`DataStore`] and an aligned
/// list maps each index to its store position.
///
/// `set` appends a new copy of the value and repoints the index; the bytes of
/// the replaced value are not reclaimed.
///
/// # Examples
///
/// ```
/// use orbis_core::codec::LongListDataType;
/// use orbis_core::{DataList, IndexedDataList, OnHeapMemory};
///
/// # fn main() -> Result<(), orbis_core::CollectionError> {
/// let ways = IndexedDataList::new(
///     OnHeapMemory::new(4096)?,
///     OnHeapMemory::new(4096)?,
///     LongListDataType::default(),
/// )?;
/// ways.add(&vec![1, 2, 3])?;
/// ways.add(&vec![])?;
/// assert_eq!(ways.get(0)?, vec![1, 2, 3]);
/// assert!(ways.get(1)?.is_empty());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct IndexedDataList<D> {
    positions: AlignedDataList<UnsignedLongDataType>,
    values: DataStore<D>,
}

impl<D: DataType> IndexedDataList<D> {
    /// Builds a list keeping positions in `index_memory` and values in
    /// `values_memory`.
    pub fn new(
        index_memory: impl Memory + 'static,
        values_memory: impl Memory + 'static,
        data_type: D,
    ) -> Result<Self, CollectionError> {
        Ok(Self {
            positions: AlignedDataList::new(index_memory, UnsignedLongDataType)?,
            values: DataStore::new(values_memory, data_type)?,
        })
    }

    /// Store holding the encoded values.
    pub const fn values(&self) -> &DataStore<D> {
        &self.values
    }
}

impl<D: DataType> DataList for IndexedDataList<D> {
    type Value = D::Value;

    fn add(&self, value: &D::Value) -> Result<u64, CollectionError> {
        let position = self.values.add(value)?;
        self.positions.add(&position)
    }

    fn set(&self, index: u64, value: &D::Value) -> Result<(), CollectionError> {
        if index >= self.size() {
            return Err(CollectionError::IndexOutOfRange {
                index,
                size: self.size(),
            });
        }
        let position = self.values.add(value)?;
        self.positions.set(index, &position)
    }

    fn get(&self, index: u64) -> Result<D::Value, CollectionError> {
        self.values.get(self.positions.get(index)?)
    }

    fn size(&self) -> u64 {
        self.positions.size()
    }

    fn flush(&self) -> Result<(), CollectionError> {
        self.values.flush()?;
        self.positions.flush()
    }

    fn close(&self) -> Result<(), CollectionError> {
        self.values.close()?;
        self.positions.close()
    }

    fn clear(&self) -> Result<(), CollectionError> {
        self.values.clear()?;
        self.positions.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::StringDataType;
    use crate::memory::OnHeapMemory;
    use rstest::rstest;

    fn names() -> IndexedDataList<StringDataType> {
        IndexedDataList::new(
            OnHeapMemory::new(64).expect("memory"),
            OnHeapMemory::new(64).expect("memory"),
            StringDataType,
        )
        .expect("list")
    }

    #[rstest]
    fn set_repoints_the_index() {
        let list = names();
        list.add(&"Main Street".to_owned()).expect("add");
        list.add(&"High Street".to_owned()).expect("add");
        list.set(0, &"Market Square".to_owned()).expect("set");
        assert_eq!(list.get(0).expect("get"), "Market Square");
        assert_eq!(list.get(1).expect("get"), "High Street");
        assert_eq!(list.size(), 2);
        assert_eq!(list.values().size(), 3);
    }

    #[rstest]
    fn out_of_range_indices_are_errors() {
        let list = names();
        assert!(matches!(
            list.get(0),
            Err(CollectionError::IndexOutOfRange { index: 0, size: 0 })
        ));
        assert!(matches!(
            list.set(2, &String::new()),
            Err(CollectionError::IndexOutOfRange { index: 2, size: 0 })
        ));
    }

    #[rstest]
    fn values_spanning_many_segments_iterate_in_order() {
        let list = names();
        let expected: Vec<String> = (0..40).map(|i| format!("way-{i}")).collect();
        for name in &expected {
            list.add(name).expect("add");
        }
        let read: Vec<String> = list.iter().collect::<Result<_, _>>().expect("iterate");
        assert_eq!(read, expected);
    }
}
