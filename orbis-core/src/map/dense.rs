use crate::codec::FixedSizeDataType;
use crate::error::CollectionError;
use crate::list::{AlignedDataList, DataList};
use crate::memory::Memory;

use super::{DataMap, Entries};

/// A map whose keys are indices into an aligned list.
///
/// Any non-negative key whose byte position is addressable may be written in
/// any order. Unwritten keys read back as the codec's zero value rather than
/// `None`. Negative keys, keys whose byte position overflows 64 bits and keys
/// beyond the largest segment index fail with
/// [`CollectionError::KeyOutOfRange`].
///
/// # Examples
///
/// ```
/// use orbis_core::codec::IntegerDataType;
/// use orbis_core::{DataMap, DenseDataMap, OnHeapMemory};
///
/// # fn main() -> Result<(), orbis_core::CollectionError> {
/// let map = DenseDataMap::new(OnHeapMemory::new(1024)?, IntegerDataType)?;
/// map.put(1023, &2)?;
/// map.put(1024, &3)?;
/// assert_eq!(map.get(1024)?, Some(3));
/// assert_eq!(map.get(7)?, Some(0));
/// assert!(map.put(i64::MAX, &1).is_err());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct DenseDataMap<D> {
    list: AlignedDataList<D>,
}

impl<D: FixedSizeDataType> DenseDataMap<D> {
    /// Builds a map over `memory`; the codec stride must be a power of two.
    pub fn new(memory: impl Memory + 'static, data_type: D) -> Result<Self, CollectionError> {
        Ok(Self {
            list: AlignedDataList::new(memory, data_type)?,
        })
    }

    fn locate(&self, key: i64) -> Result<(u64, (usize, usize)), CollectionError> {
        let index = u64::try_from(key).map_err(|_| CollectionError::KeyOutOfRange { key })?;
        let location = self
            .list
            .locate(index)
            .ok_or(CollectionError::KeyOutOfRange { key })?;
        Ok((index, location))
    }
}

impl<D: FixedSizeDataType> DataMap for DenseDataMap<D> {
    type Value = D::Value;

    fn put(&self, key: i64, value: &D::Value) -> Result<(), CollectionError> {
        let (index, location) = self.locate(key)?;
        self.list.write_unchecked(location, index, value)
    }

    fn get(&self, key: i64) -> Result<Option<D::Value>, CollectionError> {
        let (_, location) = self.locate(key)?;
        self.list.read_unchecked(location).map(Some)
    }

    fn contains_key(&self, key: i64) -> Result<bool, CollectionError> {
        self.locate(key)?;
        Ok(key.unsigned_abs() < self.size())
    }

    fn size(&self) -> u64 {
        self.list.size()
    }

    fn entries(&self) -> Entries<'_, D::Value> {
        Box::new((0..self.size()).map(move |index| {
            let key = i64::try_from(index).map_err(|_| CollectionError::IndexOutOfRange {
                index,
                size: self.size(),
            })?;
            Ok::<_, CollectionError>((key, self.list.get(index)?))
        }))
    }

    fn flush(&self) -> Result<(), CollectionError> {
        self.list.flush()
    }

    fn close(&self) -> Result<(), CollectionError> {
        self.list.close()
    }

    fn clear(&self) -> Result<(), CollectionError> {
        self.list.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{DoubleDataType, IntegerDataType};
    use crate::memory::{MAX_SEGMENT_INDEX, OnHeapMemory};
    use rstest::{fixture, rstest};

    #[fixture]
    fn map() -> DenseDataMap<IntegerDataType> {
        DenseDataMap::new(OnHeapMemory::new(1024).expect("memory"), IntegerDataType).expect("map")
    }

    #[rstest]
    fn writes_cross_segment_boundaries(map: DenseDataMap<IntegerDataType>) {
        map.put(1023, &2).expect("put");
        map.put(1024, &3).expect("put");
        assert_eq!(map.get(1023).expect("get"), Some(2));
        assert_eq!(map.get(1024).expect("get"), Some(3));
        assert_eq!(map.size(), 1025);
    }

    #[rstest]
    #[case(-1)]
    #[case(i64::MAX)]
    #[case(i64::MIN)]
    fn unaddressable_keys_are_range_errors(
        map: DenseDataMap<IntegerDataType>,
        #[case] key: i64,
    ) {
        assert!(matches!(
            map.put(key, &1),
            Err(CollectionError::KeyOutOfRange { key: found }) if found == key
        ));
        assert!(matches!(
            map.get(key),
            Err(CollectionError::KeyOutOfRange { .. })
        ));
    }

    #[rstest]
    fn keys_past_the_segment_table_are_range_errors(map: DenseDataMap<IntegerDataType>) {
        let per_segment = 1024 / 4;
        let key = i64::try_from((MAX_SEGMENT_INDEX + 1) * per_segment).expect("fits");
        assert!(matches!(
            map.put(key, &1),
            Err(CollectionError::KeyOutOfRange { .. })
        ));
    }

    #[rstest]
    fn far_keys_touch_a_single_segment(map: DenseDataMap<IntegerDataType>) {
        let key = i64::from(i32::MAX) * 256;
        assert_eq!(map.get(key).expect("get"), Some(0));
        map.put(key, &7).expect("put");
        assert_eq!(map.get(key).expect("get"), Some(7));
        assert_eq!(map.size(), u64::try_from(key).expect("positive") + 1);
    }

    #[rstest]
    fn unwritten_keys_read_as_zero(map: DenseDataMap<IntegerDataType>) {
        map.put(10, &5).expect("put");
        assert_eq!(map.get(3).expect("get"), Some(0));
        assert_eq!(map.get(5_000).expect("get"), Some(0));
        assert!(map.contains_key(3).expect("contains"));
        assert!(!map.contains_key(11).expect("contains"));
    }

    #[rstest]
    fn entries_cover_the_addressed_span() {
        let map = DenseDataMap::new(OnHeapMemory::new(64).expect("memory"), DoubleDataType)
            .expect("map");
        map.put(2, &1.5).expect("put");
        let entries: Vec<_> = map.entries().collect::<Result<_, _>>().expect("entries");
        assert_eq!(entries, vec![(0, 0.0), (1, 0.0), (2, 1.5)]);
    }
}
