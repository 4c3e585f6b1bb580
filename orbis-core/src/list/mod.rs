//! Index-addressed lists over a [`Memory`].
//!
//! [`AlignedDataList`] and [`FixedSizeDataList`] store fixed-size elements at
//! `index * stride`; [`IndexedDataList`] stores variable-size elements in a
//! [`DataStore`](crate::DataStore) and keeps their positions in an aligned
//! list. Element counts are persisted in the memory header on `flush` and
//! `close`, and restored when a list is rebuilt over the same memory.

use std::sync::atomic::{AtomicU64, Ordering};

use log::warn;

use crate::codec::DataType;
use crate::error::CollectionError;
use crate::memory::Memory;

mod aligned;
mod fixed;
mod indexed;

pub use aligned::AlignedDataList;
pub use fixed::FixedSizeDataList;
pub use indexed::IndexedDataList;

const COUNT_SLOT: usize = 0;

/// A growable, index-addressed sequence of values.
///
/// `add` reserves its index with an atomic increment, so several threads may
/// append concurrently. Indices are 64-bit and may exceed the 32-bit range.
pub trait DataList: Send + Sync {
    /// Element type.
    type Value;

    /// Appends `value` and returns its index.
    fn add(&self, value: &Self::Value) -> Result<u64, CollectionError>;

    /// Overwrites the element at `index`, which must be below [`DataList::size`].
    fn set(&self, index: u64, value: &Self::Value) -> Result<(), CollectionError>;

    /// Reads the element at `index`, which must be below [`DataList::size`].
    fn get(&self, index: u64) -> Result<Self::Value, CollectionError>;

    /// Number of elements.
    fn size(&self) -> u64;

    /// Whether the list holds no element.
    fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Persists the element count and flushes the backing memory.
    fn flush(&self) -> Result<(), CollectionError>;

    /// Persists the element count and closes the backing memory.
    fn close(&self) -> Result<(), CollectionError>;

    /// Deletes the backing storage and resets the list to empty.
    fn clear(&self) -> Result<(), CollectionError>;

    /// Iterates the elements present when the iterator was created.
    fn iter(&self) -> DataListIter<'_, Self>
    where
        Self: Sized,
    {
        DataListIter {
            list: self,
            next: 0,
            end: self.size(),
        }
    }
}

/// Iterator returned by [`DataList::iter`].
#[derive(Debug)]
pub struct DataListIter<'a, L> {
    list: &'a L,
    next: u64,
    end: u64,
}

impl<L: DataList> Iterator for DataListIter<'_, L> {
    type Item = Result<L::Value, CollectionError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let item = self.list.get(self.next);
        self.next = if item.is_ok() { self.next + 1 } else { self.end };
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.end - self.next).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}

/// Storage and element count shared by the fixed-stride lists.
#[derive(Debug)]
pub(crate) struct ListCore<D> {
    memory: Box<dyn Memory>,
    data_type: D,
    size: AtomicU64,
}

impl<D> ListCore<D> {
    pub(crate) fn open(memory: Box<dyn Memory>, data_type: D) -> Result<Self, CollectionError> {
        let size = memory.header()?.read_u64(COUNT_SLOT)?;
        Ok(Self {
            memory,
            data_type,
            size: AtomicU64::new(size),
        })
    }

    pub(crate) fn memory(&self) -> &dyn Memory {
        &*self.memory
    }

    pub(crate) const fn data_type(&self) -> &D {
        &self.data_type
    }

    pub(crate) fn size(&self) -> u64 {
        self.size.load(Ordering::Acquire)
    }

    fn reserve(&self) -> u64 {
        self.size.fetch_add(1, Ordering::AcqRel)
    }

    /// Gives back the slot `index` took from [`ListCore::reserve`] when it is
    /// still the last one. A slot followed by later reservations stays
    /// counted.
    fn release(&self, index: u64) {
        let _ = self
            .size
            .compare_exchange(index + 1, index, Ordering::AcqRel, Ordering::Acquire);
    }

    /// Grows the element count to at least `len`.
    pub(crate) fn extend_to(&self, len: u64) {
        self.size.fetch_max(len, Ordering::AcqRel);
    }

    pub(crate) fn check_index(&self, index: u64) -> Result<(), CollectionError> {
        let size = self.size();
        if index >= size {
            return Err(CollectionError::IndexOutOfRange { index, size });
        }
        Ok(())
    }

    fn persist(&self) -> Result<(), CollectionError> {
        self.memory.header()?.write_u64(COUNT_SLOT, self.size())?;
        Ok(())
    }

    pub(crate) fn flush(&self) -> Result<(), CollectionError> {
        self.persist()?;
        Ok(self.memory.flush()?)
    }

    pub(crate) fn close(&self) -> Result<(), CollectionError> {
        if self.memory.is_closed() {
            return Ok(());
        }
        self.persist()?;
        Ok(self.memory.close()?)
    }

    pub(crate) fn clear(&self) -> Result<(), CollectionError> {
        self.size.store(0, Ordering::Release);
        Ok(self.memory.clear()?)
    }
}

impl<D: DataType> ListCore<D> {
    /// Appends `value` at the slot `locate` resolves for a fresh index,
    /// releasing the index again when the write fails.
    pub(crate) fn append(
        &self,
        value: &D::Value,
        locate: impl FnOnce(u64) -> Result<(usize, usize), CollectionError>,
    ) -> Result<u64, CollectionError> {
        let index = self.reserve();
        let written = locate(index).and_then(|location| self.write(location, value));
        if let Err(err) = written {
            self.release(index);
            return Err(err);
        }
        Ok(index)
    }

    pub(crate) fn write(
        &self,
        (segment, offset): (usize, usize),
        value: &D::Value,
    ) -> Result<(), CollectionError> {
        let segment = self.memory.segment(segment)?;
        Ok(segment.with_bytes_mut(|bytes| self.data_type.write(bytes, offset, value))?)
    }

    pub(crate) fn read(&self, (segment, offset): (usize, usize)) -> Result<D::Value, CollectionError> {
        let segment = self.memory.segment(segment)?;
        Ok(segment.with_bytes(|bytes| self.data_type.read(bytes, offset))?)
    }
}

impl<D> Drop for ListCore<D> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!("failed to persist list size: {err}");
        }
    }
}
