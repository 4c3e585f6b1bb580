//! Segment buffers and the allocate-once segment table shared by all backends.

use std::collections::BTreeMap;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;
use memmap2::MmapMut;
use parking_lot::{Mutex, RwLock};

use super::{SegmentLayout, checked_segment_index};
use crate::codec::bytes;
use crate::error::{CodecError, MemoryError};

enum SegmentBuf {
    Heap(Box<[u8]>),
    Anonymous(MmapMut),
    Mapped(MmapMut),
}

impl SegmentBuf {
    fn as_slice(&self) -> &[u8] {
        match self {
            Self::Heap(bytes) => bytes,
            Self::Anonymous(map) | Self::Mapped(map) => map,
        }
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        match self {
            Self::Heap(bytes) => bytes,
            Self::Anonymous(map) | Self::Mapped(map) => map,
        }
    }
}

/// One fixed-size byte region of a [`Memory`](super::Memory).
///
/// Readers share the region; a writer holds it exclusively only for the
/// duration of a single encode, so reserved byte ranges can be filled by
/// several threads without a collection-wide lock.
pub struct Segment {
    len: usize,
    bytes: RwLock<SegmentBuf>,
}

impl std::fmt::Debug for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match &*self.bytes.read() {
            SegmentBuf::Heap(_) => "heap",
            SegmentBuf::Anonymous(_) => "anonymous",
            SegmentBuf::Mapped(_) => "mapped",
        };
        f.debug_struct("Segment")
            .field("len", &self.len)
            .field("kind", &kind)
            .finish()
    }
}

impl Segment {
    /// Allocates a zeroed heap segment, reporting allocator failure instead
    /// of aborting.
    pub(crate) fn heap(index: usize, len: usize) -> Result<Self, MemoryError> {
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(len)
            .map_err(|source| MemoryError::OutOfMemory {
                index,
                size: len,
                source,
            })?;
        bytes.resize(len, 0);
        Ok(Self::from_buf(len, SegmentBuf::Heap(bytes.into_boxed_slice())))
    }

    /// Allocates a zeroed anonymous mapping.
    pub(crate) fn anonymous(index: usize, len: usize) -> Result<Self, MemoryError> {
        let map = MmapMut::map_anon(len).map_err(|source| MemoryError::Allocation { index, source })?;
        Ok(Self::from_buf(len, SegmentBuf::Anonymous(map)))
    }

    /// Wraps a file-backed mapping.
    pub(crate) fn mapped(map: MmapMut) -> Self {
        Self::from_buf(map.len(), SegmentBuf::Mapped(map))
    }

    fn from_buf(len: usize, buf: SegmentBuf) -> Self {
        Self {
            len,
            bytes: RwLock::new(buf),
        }
    }

    /// Length of the segment in bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the segment has no bytes (only possible for a zero-sized header).
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Runs `f` over the segment bytes under a shared lock.
    pub fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        f(self.bytes.read().as_slice())
    }

    /// Runs `f` over the segment bytes under an exclusive lock.
    pub fn with_bytes_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        f(self.bytes.write().as_mut_slice())
    }

    /// Copies `dst.len()` bytes starting at `offset` into `dst`.
    pub fn read(&self, offset: usize, dst: &mut [u8]) -> Result<(), CodecError> {
        self.with_bytes(|bytes| {
            dst.copy_from_slice(bytes::slice(bytes, offset, dst.len())?);
            Ok(())
        })
    }

    /// Copies `src` into the segment starting at `offset`.
    pub fn write(&self, offset: usize, src: &[u8]) -> Result<(), CodecError> {
        self.with_bytes_mut(|bytes| {
            bytes::slice_mut(bytes, offset, src.len())?.copy_from_slice(src);
            Ok(())
        })
    }

    /// Reads a little-endian `u64` at `offset`.
    pub fn read_u64(&self, offset: usize) -> Result<u64, CodecError> {
        self.with_bytes(|bytes| bytes::read_array(bytes, offset).map(u64::from_le_bytes))
    }

    /// Writes a little-endian `u64` at `offset`.
    pub fn write_u64(&self, offset: usize, value: u64) -> Result<(), CodecError> {
        self.write(offset, &value.to_le_bytes())
    }

    /// Flushes file-backed mappings; a no-op for heap and anonymous segments.
    pub fn flush(&self) -> io::Result<()> {
        match &*self.bytes.read() {
            SegmentBuf::Mapped(map) => map.flush(),
            SegmentBuf::Heap(_) | SegmentBuf::Anonymous(_) => Ok(()),
        }
    }
}

/// Materialised segments keyed by index, plus the table length.
///
/// Indices below `len` without an entry are placeholders. They cost nothing,
/// so touching a far index allocates one segment and no slot array.
#[derive(Debug, Default)]
struct Slots {
    len: usize,
    segments: BTreeMap<usize, Arc<Segment>>,
}

/// Lock-guarded arena of lazily allocated segments plus the header slot.
///
/// Lookups of existing segments take a shared lock only. The allocation path
/// takes the exclusive lock, re-checks the slot and materialises exactly one
/// segment, so concurrent callers never observe a duplicate or a partially
/// initialised buffer.
#[derive(Debug)]
pub(crate) struct SegmentTable {
    layout: SegmentLayout,
    slots: RwLock<Slots>,
    header: Mutex<Option<Arc<Segment>>>,
    closed: AtomicBool,
}

impl SegmentTable {
    pub(crate) fn new(layout: SegmentLayout) -> Self {
        Self {
            layout,
            slots: RwLock::new(Slots::default()),
            header: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) const fn layout(&self) -> SegmentLayout {
        self.layout
    }

    pub(crate) fn ensure_open(&self) -> Result<(), MemoryError> {
        if self.is_closed() {
            return Err(MemoryError::Closed);
        }
        Ok(())
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.read().len
    }

    pub(crate) fn get_or_allocate<F>(
        &self,
        index: usize,
        allocate: F,
    ) -> Result<Arc<Segment>, MemoryError>
    where
        F: FnOnce(usize) -> Result<Segment, MemoryError>,
    {
        self.ensure_open()?;
        checked_segment_index(index as u64)?;
        if let Some(segment) = self.slots.read().segments.get(&index) {
            return Ok(Arc::clone(segment));
        }

        let mut slots = self.slots.write();
        self.ensure_open()?;
        if let Some(segment) = slots.segments.get(&index) {
            return Ok(Arc::clone(segment));
        }
        let segment = Arc::new(allocate(index)?);
        debug!(
            "allocated segment {index} ({} bytes)",
            self.layout.segment_size()
        );
        slots.segments.insert(index, Arc::clone(&segment));
        slots.len = slots.len.max(index + 1);
        Ok(segment)
    }

    pub(crate) fn header_or_allocate<F>(&self, allocate: F) -> Result<Arc<Segment>, MemoryError>
    where
        F: FnOnce() -> Result<Segment, MemoryError>,
    {
        self.ensure_open()?;
        let mut header = self.header.lock();
        if let Some(segment) = header.as_ref() {
            return Ok(Arc::clone(segment));
        }
        let segment = Arc::new(allocate()?);
        *header = Some(Arc::clone(&segment));
        Ok(segment)
    }

    /// Every materialised segment, header first.
    pub(crate) fn allocated(&self) -> Vec<Arc<Segment>> {
        let header = self.header.lock().clone();
        header
            .into_iter()
            .chain(self.slots.read().segments.values().cloned())
            .collect()
    }

    /// Marks the table closed and hands back every materialised segment so
    /// the backend can flush it before the last reference drops.
    ///
    /// Returns `None` when the table was already closed.
    pub(crate) fn close(&self) -> Option<Vec<Arc<Segment>>> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return None;
        }
        let header = self.header.lock().take();
        let slots = std::mem::take(&mut *self.slots.write());
        Some(header.into_iter().chain(slots.segments.into_values()).collect())
    }
}
