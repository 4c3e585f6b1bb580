//! Append-only log of variable-size values.

use log::debug;
use parking_lot::Mutex;

use crate::codec::{DataType, bytes};
use crate::error::{CodecError, CollectionError};
use crate::memory::{Memory, SegmentLayout};

const OFFSET_SLOT: usize = 0;
const COUNT_SLOT: usize = 8;

/// Leads every record. Padding is never written, so it reads as zero.
const RECORD_TAG: u8 = 1;
const TAG_LEN: usize = 1;

#[derive(Debug, Clone, Copy, Default)]
struct Cursor {
    offset: u64,
    count: u64,
}

/// Sequentially appends encoded values to a [`Memory`] and hands back their
/// byte position as an opaque handle.
///
/// Reservation of the byte range is the only serialised step; the encode runs
/// after the lock is released, so concurrent writers never share bytes. A value
/// that would straddle two segments starts at the next segment instead and the
/// skipped tail is never reused.
///
/// Each record is a one-byte tag followed by the encoded value. Skipped tails
/// stay zeroed, which is how iteration tells padding from records whatever
/// the codec decodes zeroed bytes as.
///
/// The write offset and value count live in the memory header (offset at byte
/// 0, count at byte 8) and are restored when a store is built over a
/// previously flushed memory.
///
/// # Examples
///
/// ```
/// use orbis_core::codec::StringDataType;
/// use orbis_core::{DataStore, OnHeapMemory};
///
/// # fn main() -> Result<(), orbis_core::CollectionError> {
/// let store = DataStore::new(OnHeapMemory::new(1024)?, StringDataType)?;
/// let first = store.add(&String::from("amenity"))?;
/// let second = store.add(&String::from("shop"))?;
/// assert_eq!(store.get(second)?, "shop");
/// assert_eq!(store.get(first)?, "amenity");
/// assert_eq!(store.size(), 2);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct DataStore<D> {
    memory: Box<dyn Memory>,
    data_type: D,
    cursor: Mutex<Cursor>,
}

impl<D: DataType> DataStore<D> {
    /// Builds a store over `memory`, resuming after any values recorded in its
    /// header.
    pub fn new(memory: impl Memory + 'static, data_type: D) -> Result<Self, CollectionError> {
        let memory: Box<dyn Memory> = Box::new(memory);
        let header = memory.header()?;
        let cursor = Cursor {
            offset: header.read_u64(OFFSET_SLOT)?,
            count: header.read_u64(COUNT_SLOT)?,
        };
        if cursor.count > 0 {
            debug!(
                "resuming data store at offset {} with {} values",
                cursor.offset, cursor.count
            );
        }
        Ok(Self {
            memory,
            data_type,
            cursor: Mutex::new(cursor),
        })
    }

    /// Appends `value` and returns its position.
    ///
    /// A failed write is not counted, and its byte range is given back when no
    /// later `add` has reserved past it.
    pub fn add(&self, value: &D::Value) -> Result<u64, CollectionError> {
        let layout = self.memory.layout();
        let size = TAG_LEN + self.data_type.size(value);
        let segment_size = layout.segment_size();
        if size > segment_size {
            return Err(CollectionError::ValueTooLarge { size, segment_size });
        }

        let (previous, position) = {
            let mut cursor = self.cursor.lock();
            let previous = cursor.offset;
            let mut position = previous;
            if layout.segment_offset(position) + size > segment_size {
                position = layout.position(layout.segment_index(position) + 1, 0);
            }
            cursor.offset = position + size as u64;
            cursor.count += 1;
            (previous, position)
        };

        if let Err(err) = self.write_record(position, value) {
            let mut cursor = self.cursor.lock();
            cursor.count -= 1;
            if cursor.offset == position + size as u64 {
                cursor.offset = previous;
            }
            return Err(err);
        }
        Ok(position)
    }

    fn write_record(&self, position: u64, value: &D::Value) -> Result<(), CollectionError> {
        let (index, offset) = self.memory.layout().locate(position)?;
        let segment = self.memory.segment(index)?;
        segment.with_bytes_mut(|buf| {
            self.data_type.write(buf, offset + TAG_LEN, value)?;
            bytes::write_bytes(buf, offset, &[RECORD_TAG])
        })?;
        Ok(())
    }

    /// Reads the value stored at `position`.
    ///
    /// Positions must come from [`DataStore::add`]; positions at or past the
    /// write offset, or not at the start of a record, are rejected.
    pub fn get(&self, position: u64) -> Result<D::Value, CollectionError> {
        if position >= self.cursor.lock().offset {
            return Err(CollectionError::InvalidPosition { position });
        }
        let (index, offset) = self.memory.layout().locate(position)?;
        let segment = self.memory.segment(index)?;
        segment
            .with_bytes(|buf| read_record(&self.data_type, buf, offset))?
            .map(|(_, value)| value)
            .ok_or(CollectionError::InvalidPosition { position })
    }

    /// Iterates `(position, value)` pairs in insertion order, stepping over
    /// segment tails skipped by [`DataStore::add`].
    pub fn iter(&self) -> DataStoreIter<'_, D> {
        let cursor = *self.cursor.lock();
        DataStoreIter {
            store: self,
            position: 0,
            end: cursor.offset,
            remaining: cursor.count,
        }
    }
}

impl<D> DataStore<D> {
    /// Number of values appended.
    pub fn size(&self) -> u64 {
        self.cursor.lock().count
    }

    /// Whether no value has been appended.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Bytes consumed, record tags and padding included.
    pub fn bytes(&self) -> u64 {
        self.cursor.lock().offset
    }

    /// Backing memory.
    pub fn memory(&self) -> &dyn Memory {
        &*self.memory
    }

    fn write_header(&self) -> Result<(), CollectionError> {
        let cursor = *self.cursor.lock();
        let header = self.memory.header()?;
        header.write_u64(OFFSET_SLOT, cursor.offset)?;
        header.write_u64(COUNT_SLOT, cursor.count)?;
        Ok(())
    }

    /// Records the cursor in the header and flushes the memory.
    pub fn flush(&self) -> Result<(), CollectionError> {
        self.write_header()?;
        Ok(self.memory.flush()?)
    }

    /// Records the cursor in the header and closes the memory.
    pub fn close(&self) -> Result<(), CollectionError> {
        if self.memory.is_closed() {
            return Ok(());
        }
        self.write_header()?;
        Ok(self.memory.close()?)
    }

    /// Deletes the backing storage and forgets every value.
    pub fn clear(&self) -> Result<(), CollectionError> {
        *self.cursor.lock() = Cursor::default();
        Ok(self.memory.clear()?)
    }
}

impl<D> Drop for DataStore<D> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            log::warn!("failed to persist data store header: {err}");
        }
    }
}

/// Iterator returned by [`DataStore::iter`].
#[derive(Debug)]
pub struct DataStoreIter<'a, D> {
    store: &'a DataStore<D>,
    position: u64,
    end: u64,
    remaining: u64,
}

/// Decodes the record at `offset` as `(record length, value)`, or `None`
/// when the byte there is not a record tag.
fn read_record<D: DataType>(
    data_type: &D,
    buf: &[u8],
    offset: usize,
) -> Result<Option<(usize, D::Value)>, CodecError> {
    let [tag] = bytes::read_array::<TAG_LEN>(buf, offset)?;
    if tag != RECORD_TAG {
        return Ok(None);
    }
    let start = offset + TAG_LEN;
    let size = data_type.size_at(buf, start)?;
    let value = data_type.read(buf, start)?;
    Ok(Some((TAG_LEN + size, value)))
}

impl<D: DataType> DataStoreIter<'_, D> {
    fn step(&mut self) -> Result<Option<(u64, D::Value)>, CollectionError> {
        let layout: SegmentLayout = self.store.memory.layout();
        while self.remaining > 0 && self.position < self.end {
            let (index, offset) = layout.locate(self.position)?;
            let segment = self.store.memory.segment(index)?;
            let data_type = &self.store.data_type;
            match segment.with_bytes(|buf| read_record(data_type, buf, offset))? {
                Some((size, value)) => {
                    let position = self.position;
                    self.position += size as u64;
                    self.remaining -= 1;
                    return Ok(Some((position, value)));
                }
                None => {
                    self.position = layout.position(layout.segment_index(self.position) + 1, 0);
                }
            }
        }
        Ok(None)
    }
}

impl<D: DataType> Iterator for DataStoreIter<'_, D> {
    type Item = Result<(u64, D::Value), CollectionError>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.step().transpose();
        if matches!(item, Some(Err(_))) {
            self.remaining = 0;
        }
        item
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{LongDataType, OptionalDataType, StringDataType};
    use crate::memory::{MappedDirectoryMemory, OnHeapMemory};
    use camino::Utf8PathBuf;
    use rstest::rstest;
    use std::sync::Arc;
    use std::thread;

    fn strings(segment_size: usize) -> DataStore<StringDataType> {
        DataStore::new(
            OnHeapMemory::with_sizes(16, segment_size).expect("memory"),
            StringDataType,
        )
        .expect("store")
    }

    #[rstest]
    fn values_never_straddle_segments() {
        let store = strings(16);
        let first = store.add(&"abcdefgh".to_owned()).expect("add");
        let second = store.add(&"ijklmnop".to_owned()).expect("add");
        assert_eq!(first, 0);
        assert_eq!(second, 16);
        assert_eq!(store.bytes(), 29);
        assert_eq!(store.get(second).expect("get"), "ijklmnop");
    }

    #[rstest]
    fn oversized_values_are_rejected() {
        let store = strings(16);
        let err = store.add(&"x".repeat(12)).expect_err("too large");
        assert!(matches!(
            err,
            CollectionError::ValueTooLarge {
                size: 17,
                segment_size: 16
            }
        ));
        assert!(store.is_empty());
    }

    #[rstest]
    fn unknown_positions_are_rejected() {
        let store = strings(64);
        store.add(&"a".to_owned()).expect("add");
        assert!(matches!(
            store.get(5),
            Err(CollectionError::InvalidPosition { position: 5 })
        ));
    }

    #[rstest]
    fn iteration_skips_segment_padding() {
        let store = strings(16);
        let values = ["abcdefgh", "", "ijk", "lmnopqrstu", "v"];
        let positions: Vec<_> = values
            .iter()
            .map(|value| store.add(&(*value).to_owned()).expect("add"))
            .collect();
        let read: Vec<_> = store.iter().collect::<Result<_, _>>().expect("iterate");
        let expected: Vec<_> = positions
            .into_iter()
            .zip(values.iter().map(|value| (*value).to_owned()))
            .collect();
        assert_eq!(read, expected);
    }

    #[rstest]
    fn zero_decodable_values_iterate_across_segments() {
        let store = DataStore::new(
            OnHeapMemory::with_sizes(16, 16).expect("memory"),
            OptionalDataType::new(LongDataType),
        )
        .expect("store");
        store.add(&Some(1)).expect("add");
        store.add(&Some(2)).expect("add");
        let read: Vec<_> = store.iter().collect::<Result<_, _>>().expect("iterate");
        assert_eq!(read, vec![(0, Some(1)), (16, Some(2))]);
    }

    #[rstest]
    fn none_values_are_stored_records() {
        let store = DataStore::new(
            OnHeapMemory::with_sizes(16, 16).expect("memory"),
            OptionalDataType::new(LongDataType),
        )
        .expect("store");
        let values = [Some(4), None, None, Some(5), None];
        for value in &values {
            store.add(value).expect("add");
        }
        let read: Vec<_> = store
            .iter()
            .map(|entry| entry.map(|(_, value)| value))
            .collect::<Result<_, _>>()
            .expect("iterate");
        assert_eq!(read, values);
    }

    #[rstest]
    fn failed_adds_are_not_counted() {
        let store = strings(64);
        store.add(&"kept".to_owned()).expect("add");
        store.memory().close().expect("close memory");
        assert!(store.add(&"lost".to_owned()).is_err());
        assert_eq!(store.size(), 1);
        assert_eq!(store.bytes(), 9);
    }

    #[rstest]
    fn fixed_values_iterate_across_segments() {
        let store = DataStore::new(OnHeapMemory::with_sizes(16, 32).expect("memory"), LongDataType)
            .expect("store");
        for value in 0..10 {
            store.add(&value).expect("add");
        }
        let read: Vec<_> = store
            .iter()
            .map(|entry| entry.map(|(_, value)| value))
            .collect::<Result<_, _>>()
            .expect("iterate");
        assert_eq!(read, (0..10).collect::<Vec<_>>());
    }

    #[rstest]
    fn concurrent_writers_receive_disjoint_positions() {
        let store = Arc::new(
            DataStore::new(OnHeapMemory::new(256).expect("memory"), LongDataType).expect("store"),
        );
        let handles: Vec<_> = (0..4_i64)
            .map(|writer| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    (0..250_i64)
                        .map(|i| {
                            let value = writer * 1_000 + i;
                            (store.add(&value).expect("add"), value)
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let written: Vec<_> = handles
            .into_iter()
            .flat_map(|handle| handle.join().expect("thread"))
            .collect();
        assert_eq!(store.size(), 1_000);
        for (position, value) in written {
            assert_eq!(store.get(position).expect("get"), value);
        }
    }

    #[rstest]
    fn mapped_store_resumes_after_reopen() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = Utf8PathBuf::from_path_buf(dir.path().join("store")).expect("utf-8 path");
        let open = || {
            DataStore::new(
                MappedDirectoryMemory::open(&path, 64, 64).expect("memory"),
                StringDataType,
            )
            .expect("store")
        };
        let position = {
            let store = open();
            store.add(&"first".to_owned()).expect("add")
        };
        let store = open();
        assert_eq!(store.size(), 1);
        assert_eq!(store.get(position).expect("get"), "first");
        let next = store.add(&"second".to_owned()).expect("add");
        assert!(next > position);
    }
}
