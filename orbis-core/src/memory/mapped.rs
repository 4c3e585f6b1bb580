//! Memory-mapped backends that persist segments to disk.

use std::fs::File;
use std::io;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::fs_utf8::Dir;
use log::{debug, warn};
use memmap2::{MmapMut, MmapOptions};
use orbis_fs::{ensure_dir, ensure_parent_dir, open_dir_and_file, open_sized_file};

use super::{Memory, Segment, SegmentLayout, SegmentTable};
use crate::error::MemoryError;

const HEADER_FILE: &str = "header";
const PART_SUFFIX: &str = "part";

/// Maps `len` bytes of `file` starting at `offset`.
#[expect(unsafe_code, reason = "memmap2 exposes file mappings as unsafe")]
fn map_region(file: &File, offset: u64, len: usize) -> io::Result<MmapMut> {
    // SAFETY: the mapping is only reachable through its owning `Segment`, whose
    // lock serialises writers. The backing file is sized to cover the region
    // before it is mapped and is owned by exactly one memory instance.
    unsafe { MmapOptions::new().offset(offset).len(len).map_mut(file) }
}

/// Flushes then releases every segment handed back by a closing table.
fn flush_all(segments: &[Arc<Segment>], path: &Utf8Path) -> Result<(), MemoryError> {
    for segment in segments {
        segment.flush().map_err(|source| MemoryError::Flush {
            path: path.to_owned(),
            source,
        })?;
    }
    Ok(())
}

/// Every segment mapped from one shared file; segment `i` lives at byte
/// `i * segment_size`.
///
/// The header is kept in a sibling `<file>.header` file so the segment file
/// stays a plain concatenation of segments.
///
/// # Examples
///
/// ```
/// use camino::Utf8PathBuf;
/// use orbis_core::{MappedFileMemory, Memory};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let dir = tempfile::tempdir()?;
/// let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).map_err(|_| "utf-8")?;
/// let path = root.join("nodes.bin");
/// {
///     let memory = MappedFileMemory::open(&path, 16, 1024)?;
///     memory.segment(1)?.write(0, b"kept")?;
/// }
/// let memory = MappedFileMemory::open(&path, 16, 1024)?;
/// let mut buf = [0_u8; 4];
/// memory.segment(1)?.read(0, &mut buf)?;
/// assert_eq!(&buf, b"kept");
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct MappedFileMemory {
    path: Utf8PathBuf,
    dir: Dir,
    file_name: String,
    file: File,
    header_size: usize,
    table: SegmentTable,
}

impl MappedFileMemory {
    /// Opens (creating when absent) the file at `path`.
    pub fn open(
        path: impl AsRef<Utf8Path>,
        header_size: usize,
        segment_size: usize,
    ) -> Result<Self, MemoryError> {
        let path = path.as_ref();
        let layout = SegmentLayout::new(segment_size)?;
        let map_err = |source| MemoryError::Map {
            path: path.to_owned(),
            source,
        };
        ensure_parent_dir(path).map_err(map_err)?;
        let (dir, file_name) = open_dir_and_file(path).map_err(map_err)?;
        let file = open_sized_file(&dir, &file_name, 0).map_err(map_err)?;
        Ok(Self {
            path: path.to_owned(),
            dir,
            file_name,
            file,
            header_size,
            table: SegmentTable::new(layout),
        })
    }

    /// Path of the segment file.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    fn header_name(&self) -> String {
        format!("{}.{HEADER_FILE}", self.file_name)
    }

    fn map_segment(&self, index: usize) -> Result<Segment, MemoryError> {
        let segment_size = self.table.layout().segment_size();
        let offset = index as u64 * segment_size as u64;
        let end = offset + segment_size as u64;
        let mapped = self
            .file
            .metadata()
            .and_then(|meta| {
                if meta.len() < end {
                    self.file.set_len(end)?;
                }
                map_region(&self.file, offset, segment_size)
            })
            .map_err(|source| MemoryError::Map {
                path: self.path.clone(),
                source,
            })?;
        Ok(Segment::mapped(mapped))
    }

    fn map_header(&self) -> Result<Segment, MemoryError> {
        let name = self.header_name();
        let size = self.header_size;
        open_sized_file(&self.dir, &name, size as u64)
            .and_then(|file| map_region(&file, 0, size))
            .map(Segment::mapped)
            .map_err(|source| MemoryError::Map {
                path: self.path.with_file_name(&name),
                source,
            })
    }
}

impl Memory for MappedFileMemory {
    fn layout(&self) -> SegmentLayout {
        self.table.layout()
    }

    fn header(&self) -> Result<Arc<Segment>, MemoryError> {
        self.table.header_or_allocate(|| self.map_header())
    }

    fn segment(&self, index: usize) -> Result<Arc<Segment>, MemoryError> {
        self.table
            .get_or_allocate(index, |index| self.map_segment(index))
    }

    fn segment_count(&self) -> usize {
        self.table.len()
    }

    fn flush(&self) -> Result<(), MemoryError> {
        self.table.ensure_open()?;
        flush_all(&self.table.allocated(), &self.path)
    }

    fn close(&self) -> Result<(), MemoryError> {
        match self.table.close() {
            Some(segments) => flush_all(&segments, &self.path),
            None => Ok(()),
        }
    }

    fn clear(&self) -> Result<(), MemoryError> {
        self.close()?;
        for path in [self.path.clone(), self.path.with_file_name(self.header_name())] {
            orbis_fs::remove_file(&path).map_err(|source| MemoryError::Delete { path, source })?;
        }
        debug!("cleared mapped file {}", self.path);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.table.is_closed()
    }
}

impl Drop for MappedFileMemory {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!("failed to flush {} on drop: {err}", self.path);
        }
    }
}

/// One `<index>.part` file per segment plus a fixed-size `header` file, all
/// inside one directory.
///
/// Existing part files are discovered lazily: reopening a directory maps each
/// file again on first touch, with its previous content.
#[derive(Debug)]
pub struct MappedDirectoryMemory {
    path: Utf8PathBuf,
    dir: Dir,
    header_size: usize,
    table: SegmentTable,
}

impl MappedDirectoryMemory {
    /// Opens (creating when absent) the directory at `path`.
    pub fn open(
        path: impl AsRef<Utf8Path>,
        header_size: usize,
        segment_size: usize,
    ) -> Result<Self, MemoryError> {
        let path = path.as_ref();
        let layout = SegmentLayout::new(segment_size)?;
        let dir = ensure_dir(path).map_err(|source| MemoryError::Map {
            path: path.to_owned(),
            source,
        })?;
        Ok(Self {
            path: path.to_owned(),
            dir,
            header_size,
            table: SegmentTable::new(layout),
        })
    }

    /// Directory holding the segment files.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    fn map_file(&self, name: &str, len: usize) -> Result<Segment, MemoryError> {
        open_sized_file(&self.dir, name, len as u64)
            .and_then(|file| map_region(&file, 0, len))
            .map(Segment::mapped)
            .map_err(|source| MemoryError::Map {
                path: self.path.join(name),
                source,
            })
    }
}

impl Memory for MappedDirectoryMemory {
    fn layout(&self) -> SegmentLayout {
        self.table.layout()
    }

    fn header(&self) -> Result<Arc<Segment>, MemoryError> {
        self.table
            .header_or_allocate(|| self.map_file(HEADER_FILE, self.header_size))
    }

    fn segment(&self, index: usize) -> Result<Arc<Segment>, MemoryError> {
        let segment_size = self.table.layout().segment_size();
        self.table.get_or_allocate(index, |index| {
            self.map_file(&format!("{index}.{PART_SUFFIX}"), segment_size)
        })
    }

    fn segment_count(&self) -> usize {
        self.table.len()
    }

    fn flush(&self) -> Result<(), MemoryError> {
        self.table.ensure_open()?;
        flush_all(&self.table.allocated(), &self.path)
    }

    fn close(&self) -> Result<(), MemoryError> {
        match self.table.close() {
            Some(segments) => flush_all(&segments, &self.path),
            None => Ok(()),
        }
    }

    fn clear(&self) -> Result<(), MemoryError> {
        self.close()?;
        orbis_fs::remove_dir_all(&self.path).map_err(|source| MemoryError::Delete {
            path: self.path.clone(),
            source,
        })?;
        debug!("cleared mapped directory {}", self.path);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.table.is_closed()
    }
}

impl Drop for MappedDirectoryMemory {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!("failed to flush {} on drop: {err}", self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    #[fixture]
    fn root() -> (TempDir, Utf8PathBuf) {
        let dir = TempDir::new().expect("create temp dir");
        let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 temp dir");
        (dir, path)
    }

    fn write_then_reopen<M: Memory>(open: impl Fn() -> M) {
        {
            let memory = open();
            memory.header().expect("header").write_u64(0, 7).expect("header write");
            memory.segment(2).expect("segment").write_u64(8, 99).expect("write");
            memory.close().expect("close");
        }
        let memory = open();
        assert_eq!(memory.header().expect("header").read_u64(0).expect("read"), 7);
        assert_eq!(memory.segment(2).expect("segment").read_u64(8).expect("read"), 99);
        assert_eq!(memory.segment(0).expect("segment").read_u64(0).expect("read"), 0);
    }

    #[rstest]
    fn mapped_file_reopens_with_previous_bytes(
        #[from(root)] (_dir, root): (TempDir, Utf8PathBuf),
    ) {
        let path = root.join("data/values.bin");
        write_then_reopen(|| MappedFileMemory::open(&path, 32, 1024).expect("open"));
        let len = std::fs::metadata(&path).expect("metadata").len();
        assert_eq!(len, 3 * 1024);
        assert!(root.join("data/values.bin.header").is_file());
    }

    #[rstest]
    fn mapped_directory_reopens_with_previous_bytes(
        #[from(root)] (_dir, root): (TempDir, Utf8PathBuf),
    ) {
        let path = root.join("segments");
        write_then_reopen(|| MappedDirectoryMemory::open(&path, 32, 1024).expect("open"));
        assert!(path.join("2.part").is_file());
        assert!(path.join("header").is_file());
    }

    #[rstest]
    fn clear_deletes_backing_storage(#[from(root)] (_dir, root): (TempDir, Utf8PathBuf)) {
        let dir_path = root.join("segments");
        let directory = MappedDirectoryMemory::open(&dir_path, 32, 1024).expect("open");
        directory.segment(0).expect("segment");
        directory.clear().expect("clear");
        assert!(!dir_path.exists());
        assert!(matches!(directory.segment(0), Err(MemoryError::Closed)));

        let file_path = root.join("values.bin");
        let file = MappedFileMemory::open(&file_path, 32, 1024).expect("open");
        file.header().expect("header");
        file.segment(0).expect("segment");
        file.clear().expect("clear");
        file.clear().expect("clear twice");
        assert!(!file_path.exists());
        assert!(!root.join("values.bin.header").exists());
    }

    #[rstest]
    fn dropping_flushes_mapped_segments(#[from(root)] (_dir, root): (TempDir, Utf8PathBuf)) {
        let path = root.join("segments");
        {
            let memory = MappedDirectoryMemory::open(&path, 32, 1024).expect("open");
            memory.segment(0).expect("segment").write(0, b"drop").expect("write");
        }
        let bytes = std::fs::read(path.join("0.part")).expect("read part");
        assert_eq!(bytes.get(..4), Some(&b"drop"[..]));
    }
}
