use crate::codec::FixedSizeDataType;
use crate::error::CollectionError;
use crate::memory::{Memory, checked_segment_index};

use super::{DataList, ListCore};

/// Fixed-size elements of any stride no larger than the segment size.
///
/// Each segment holds `segment_size / stride` elements; the remaining tail
/// of every segment stays unused so no element crosses a segment boundary.
#[derive(Debug)]
pub struct FixedSizeDataList<D> {
    core: ListCore<D>,
    stride: usize,
    values_per_segment: u64,
}

impl<D: FixedSizeDataType> FixedSizeDataList<D> {
    /// Builds a list over `memory`, rejecting zero strides and strides larger
    /// than one segment.
    pub fn new(memory: impl Memory + 'static, data_type: D) -> Result<Self, CollectionError> {
        let stride = data_type.fixed_size();
        let segment_size = memory.segment_size();
        if stride == 0 || stride > segment_size {
            return Err(CollectionError::InvalidStride {
                element_size: stride,
                segment_size,
            });
        }
        Ok(Self {
            core: ListCore::open(Box::new(memory), data_type)?,
            stride,
            values_per_segment: (segment_size / stride) as u64,
        })
    }

    /// Elements stored per segment.
    pub const fn values_per_segment(&self) -> u64 {
        self.values_per_segment
    }

    fn locate(&self, index: u64) -> Result<(usize, usize), CollectionError> {
        let segment = checked_segment_index(index / self.values_per_segment)?;
        let slot = usize::try_from(index % self.values_per_segment).map_err(|_| {
            CollectionError::IndexOutOfRange {
                index,
                size: self.core.size(),
            }
        })?;
        Ok((segment, slot * self.stride))
    }
}

impl<D: FixedSizeDataType> DataList for FixedSizeDataList<D> {
    type Value = D::Value;

    fn add(&self, value: &D::Value) -> Result<u64, CollectionError> {
        self.core.append(value, |index| self.locate(index))
    }

    fn set(&self, index: u64, value: &D::Value) -> Result<(), CollectionError> {
        self.core.check_index(index)?;
        self.core.write(self.locate(index)?, value)
    }

    fn get(&self, index: u64) -> Result<D::Value, CollectionError> {
        self.core.check_index(index)?;
        self.core.read(self.locate(index)?)
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
