use crate::codec::FixedSizeDataType;
use crate::error::CollectionError;
use crate::memory::Memory;

use super::{DataList, ListCore};

/// Fixed-size elements whose stride is a power of two.
///
/// Byte positions are computed with shifts only: `index << value_shift`, then
/// the memory's segment shift and mask. A power-of-two stride no larger than
/// the (power-of-two) segment size always divides it, so no element crosses a
/// segment boundary.
///
/// # Examples
///
/// ```
/// use orbis_core::codec::LongDataType;
/// use orbis_core::{AlignedDataList, DataList, OnHeapMemory};
///
/// # fn main() -> Result<(), orbis_core::CollectionError> {
/// let list = AlignedDataList::new(OnHeapMemory::new(64)?, LongDataType)?;
/// for value in [5, 3, 8] {
///     list.add(&value)?;
/// }
/// assert_eq!(list.get(1)?, 3);
/// assert_eq!(list.iter().collect::<Result<Vec<_>, _>>()?, vec![5, 3, 8]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct AlignedDataList<D> {
    core: ListCore<D>,
    value_shift: u32,
}

impl<D: FixedSizeDataType> AlignedDataList<D> {
    /// Builds a list over `memory`, rejecting strides that are not a power of
    /// two or exceed the segment size.
    pub fn new(memory: impl Memory + 'static, data_type: D) -> Result<Self, CollectionError> {
        let element_size = data_type.fixed_size();
        if element_size == 0 || !element_size.is_power_of_two() {
            return Err(CollectionError::UnalignedStride { element_size });
        }
        let segment_size = memory.segment_size();
        if element_size > segment_size {
            return Err(CollectionError::InvalidStride {
                element_size,
                segment_size,
            });
        }
        Ok(Self {
            core: ListCore::open(Box::new(memory), data_type)?,
            value_shift: element_size.trailing_zeros(),
        })
    }

    /// Bytes per element.
    pub fn element_size(&self) -> usize {
        1 << self.value_shift
    }

    /// Segment and offset of `index`, or `None` when its byte position does
    /// not fit in 64 bits or exceeds the addressable segment table.
    pub(crate) fn locate(&self, index: u64) -> Option<(usize, usize)> {
        if index.leading_zeros() < self.value_shift {
            return None;
        }
        self.core.memory().layout().locate(index << self.value_shift).ok()
    }

    fn checked_locate(&self, index: u64) -> Result<(usize, usize), CollectionError> {
        self.locate(index).ok_or(CollectionError::IndexOutOfRange {
            index,
            size: self.core.size(),
        })
    }

    /// Writes without checking `index` against the size, growing the size to
    /// cover it.
    pub(crate) fn write_unchecked(
        &self,
        location: (usize, usize),
        index: u64,
        value: &D::Value,
    ) -> Result<(), CollectionError> {
        self.core.write(location, value)?;
        self.core.extend_to(index + 1);
        Ok(())
    }

    /// Reads without checking `index` against the size; unwritten slots decode
    /// as the codec's zero value.
    pub(crate) fn read_unchecked(&self, location: (usize, usize)) -> Result<D::Value, CollectionError> {
        self.core.read(location)
    }
}

impl<D: FixedSizeDataType> DataList for AlignedDataList<D> {
    type Value = D::Value;

    fn add(&self, value: &D::Value) -> Result<u64, CollectionError> {
        self.core.append(value, |index| self.checked_locate(index))
    }

    fn set(&self, index: u64, value: &D::Value) -> Result<(), CollectionError> {
        self.core.check_index(index)?;
        self.core.write(self.checked_locate(index)?, value)
    }

    fn get(&self, index: u64) -> Result<D::Value, CollectionError> {
        self.core.check_index(index)?;
        self.core.read(self.checked_locate(index)?)
    }

    fn size(&self) -> u64 {
        self.core.size()
    }

    fn flush(&self) -> Result<(), CollectionError> {
        self.core.flush()
    }

    fn close(&self) -> Result<(), CollectionError> {
        self.core.close()
    }

    fn clear(&self) -> Result<(), CollectionError> {
        self.core.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{IntegerDataType, LongDataType, PairDataType};
    use crate::memory::{MappedFileMemory, OnHeapMemory};
    use camino::Utf8PathBuf;
    use proptest::prelude::*;
    use rstest::rstest;

    fn longs(segment_size: usize) -> AlignedDataList<LongDataType> {
        AlignedDataList::new(OnHeapMemory::new(segment_size).expect("memory"), LongDataType)
            .expect("list")
    }

    #[rstest]
    fn rejects_strides_that_are_not_powers_of_two() {
        let codec = PairDataType::new(LongDataType, IntegerDataType);
        let err = AlignedDataList::new(OnHeapMemory::new(64).expect("memory"), codec)
            .expect_err("12-byte stride");
        assert!(matches!(
            err,
            CollectionError::UnalignedStride { element_size: 12 }
        ));
    }

    #[rstest]
    fn rejects_strides_larger_than_a_segment() {
        let err = AlignedDataList::new(OnHeapMemory::new(4).expect("memory"), LongDataType)
            .expect_err("stride exceeds segment");
        assert!(matches!(
            err,
            CollectionError::InvalidStride {
                element_size: 8,
                segment_size: 4
            }
        ));
    }

    #[rstest]
    fn get_and_set_respect_the_size() {
        let list = longs(64);
        list.add(&1).expect("add");
        list.set(0, &9).expect("set");
        assert_eq!(list.get(0).expect("get"), 9);
        assert!(matches!(
            list.get(1),
            Err(CollectionError::IndexOutOfRange { index: 1, size: 1 })
        ));
        assert!(matches!(
            list.set(3, &0),
            Err(CollectionError::IndexOutOfRange { index: 3, size: 1 })
        ));
    }

    #[rstest]
    fn size_survives_reopening_a_mapped_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = Utf8PathBuf::from_path_buf(dir.path().join("longs.bin")).expect("utf-8 path");
        let open = || {
            AlignedDataList::new(
                MappedFileMemory::open(&path, 64, 64).expect("memory"),
                LongDataType,
            )
            .expect("list")
        };
        {
            let list = open();
            for value in 0..20 {
                list.add(&(value * 3)).expect("add");
            }
            list.close().expect("close");
        }
        let list = open();
        assert_eq!(list.size(), 20);
        assert_eq!(list.get(19).expect("get"), 57);
    }

    #[rstest]
    fn clear_resets_the_list() {
        let list = longs(64);
        list.add(&1).expect("add");
        list.clear().expect("clear");
        assert!(list.is_empty());
        assert!(list.add(&1).is_err());
    }

    #[rstest]
    fn failed_adds_leave_the_size_unchanged() {
        let list = longs(64);
        list.add(&1).expect("add");
        list.clear().expect("clear");
        assert!(list.add(&2).is_err());
        assert!(list.add(&3).is_err());
        assert_eq!(list.size(), 0);
    }

    proptest! {
        #[test]
        fn sequential_adds_read_back_in_order(values in prop::collection::vec(any::<i64>(), 0..300)) {
            let list = longs(64);
            for value in &values {
                list.add(value).expect("add");
            }
            prop_assert_eq!(list.size(), values.len() as u64);
            let read: Vec<i64> = list.iter().collect::<Result<_, _>>().expect("iterate");
            prop_assert_eq!(read, values);
        }
    }
}
