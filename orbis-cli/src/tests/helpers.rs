//! Test helpers for staging binary inputs in temporary workspaces.

use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use tempfile::TempDir;

pub(super) struct Workspace {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Workspace {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 workspace");
        Self { _dir: dir, root }
    }

    pub(super) fn path(&self, name: &str) -> Utf8PathBuf {
        self.root.join(name)
    }
}

pub(super) fn write_values(path: &Utf8Path, values: &[i64]) {
    let bytes: Vec<u8> = values.iter().flat_map(|value| value.to_le_bytes()).collect();
    fs::write(path, bytes).expect("write values");
}

pub(super) fn read_values(path: &Utf8Path) -> Vec<i64> {
    let bytes = fs::read(path).expect("read values");
    bytes
        .chunks_exact(8)
        .map(|chunk| i64::from_le_bytes(chunk.try_into().expect("8-byte chunk")))
        .collect()
}

pub(super) fn parse_values(text: &str) -> Vec<i64> {
    text.trim_matches('"')
        .split_whitespace()
        .map(|value| value.parse().expect("integer value"))
        .collect()
}
