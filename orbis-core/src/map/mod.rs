//! Maps from `i64` keys to values.
//!
//! | Map | Key order | Missing key | Storage |
//! |-----|-----------|-------------|---------|
//! | [`DenseDataMap`] | any | zero value | key is the list index |
//! | [`SortedDataMap`] | non-decreasing | `None` | chunk directory + binary search |
//! | [`SparseDataMap`] | non-decreasing | `None` | chunk directory + direct index |
//! | [`IndexedDataMap`] | any | `None` | in-memory hash index into a [`DataStore`] |
//!
//! Sorted and sparse maps group keys into chunks of `1 << CHUNK_SHIFT` keys and
//! record where each chunk starts, so a lookup only touches one chunk.
//!
//! [`DataStore`]: crate::DataStore

use crate::error::CollectionError;

mod dense;
mod indexed;
mod sorted;
mod sparse;

pub use dense::DenseDataMap;
pub use indexed::IndexedDataMap;
pub use sorted::SortedDataMap;
pub use sparse::SparseDataMap;

/// Keys per chunk are `1 << CHUNK_SHIFT`.
pub const CHUNK_SHIFT: u32 = 8;

/// Entries yielded by [`DataMap::entries`].
pub type Entries<'a, V> = Box<dyn Iterator<Item = Result<(i64, V), CollectionError>> + 'a>;

/// A partial function from `i64` keys to values.
pub trait DataMap: Send + Sync {
    /// Value type.
    type Value;

    /// Stores `value` under `key`.
    fn put(&self, key: i64, value: &Self::Value) -> Result<(), CollectionError>;

    /// Reads the value stored under `key`.
    fn get(&self, key: i64) -> Result<Option<Self::Value>, CollectionError>;

    /// Whether `key` has a value.
    fn contains_key(&self, key: i64) -> Result<bool, CollectionError> {
        Ok(self.get(key)?.is_some())
    }

    /// Number of entries; for dense maps, the addressed span.
    fn size(&self) -> u64;

    /// Whether the map holds no entry.
    fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Entries in ascending key order.
    fn entries(&self) -> Entries<'_, Self::Value>;

    /// Flushes the backing memories.
    fn flush(&self) -> Result<(), CollectionError>;

    /// Closes the backing memories.
    fn close(&self) -> Result<(), CollectionError>;

    /// Deletes the backing storage.
    fn clear(&self) -> Result<(), CollectionError>;
}

/// Chunk holding a non-negative key.
pub(crate) const fn chunk_of(key: i64) -> u64 {
    key.unsigned_abs() >> CHUNK_SHIFT
}

/// Rejects keys that go backwards.
pub(crate) fn check_order(previous: Option<i64>, key: i64) -> Result<(), CollectionError> {
    match previous {
        Some(previous) if key < previous => Err(CollectionError::UnorderedKey { previous, key }),
        _ => Ok(()),
    }
}
