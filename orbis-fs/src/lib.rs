//! Shared filesystem helpers built on `cap-std` and `camino`.
//!
//! The mapped memory backends and the CLI resolve every path through these
//! helpers so that directory handles are opened once and files are created
//! relative to them.
#![forbid(unsafe_code)]

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::fs::OpenOptions;
use cap_std::{ambient_authority, fs_utf8};
use std::fs::File;
use std::io;
use std::path::Component;

/// Open a UTF-8 file path using ambient authority.
pub fn open_utf8_file(path: &Utf8Path) -> io::Result<fs_utf8::File> {
    fs_utf8::File::open_ambient(path, ambient_authority())
}

/// Create (or truncate) a file for writing, creating missing parent directories.
pub fn create_utf8_file(path: &Utf8Path) -> io::Result<fs_utf8::File> {
    ensure_parent_dir(path)?;
    let (dir, file_name) = open_dir_and_file(path)?;
    dir.create(file_name)
}

/// Resolve an ambient directory for the given path and return the directory with the file name.
pub fn open_dir_and_file(path: &Utf8Path) -> io::Result<(fs_utf8::Dir, String)> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::other("target should include a file name"))?
        .to_owned();
    let dir = fs_utf8::Dir::open_ambient_dir(parent, ambient_authority())?;
    Ok((dir, file_name))
}

/// Create `path` and any missing ancestors, then open it as a directory handle.
pub fn ensure_dir(path: &Utf8Path) -> io::Result<fs_utf8::Dir> {
    let (base_dir, relative) = base_dir_and_relative(path)?;
    if relative.as_os_str().is_empty() {
        return Ok(base_dir);
    }
    base_dir.create_dir_all(&relative)?;
    base_dir.open_dir(&relative)
}

/// Ensure the parent directory for `path` exists, handling absolute paths safely for cap-std.
pub fn ensure_parent_dir(path: &Utf8Path) -> io::Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() || parent == Utf8Path::new("/") {
        return Ok(());
    }
    ensure_dir(parent).map(drop)
}

/// Return whether a path exists and is a regular file using capability-based IO.
pub fn file_is_file(path: &Utf8Path) -> io::Result<bool> {
    let (dir, name) = open_dir_and_file(path)?;
    dir.metadata(name.as_str()).map(|meta| meta.is_file())
}

/// Open (creating when absent) a read-write file inside `dir` and grow it to
/// at least `min_len` bytes.
///
/// Existing content is never truncated, so reopening a file returns the bytes
/// a previous writer left behind.
pub fn open_sized_file(dir: &fs_utf8::Dir, name: &str, min_len: u64) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.read(true).write(true).create(true);
    let file = dir.open_with(name, &options)?;
    if file.metadata()?.len() < min_len {
        file.set_len(min_len)?;
    }
    Ok(file.into_std())
}

/// Remove a directory tree, treating an already missing directory as success.
pub fn remove_dir_all(path: &Utf8Path) -> io::Result<()> {
    let (dir, name) = open_dir_and_file(path)?;
    ignore_not_found(dir.remove_dir_all(name.as_str()))
}

/// Remove a single file, treating an already missing file as success.
pub fn remove_file(path: &Utf8Path) -> io::Result<()> {
    let (dir, name) = open_dir_and_file(path)?;
    ignore_not_found(dir.remove_file(name.as_str()))
}

fn ignore_not_found(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Split an absolute or relative path into an ambient base directory and a relative suffix.
pub fn base_dir_and_relative(parent: &Utf8Path) -> io::Result<(fs_utf8::Dir, Utf8PathBuf)> {
    let std_parent = parent.as_std_path();

    let (base, relative) = match std_parent.components().next() {
        // Windows absolute path with a drive or UNC prefix.
        Some(Component::Prefix(prefix)) => {
            let prefix_str = prefix
                .as_os_str()
                .to_str()
                .ok_or_else(|| io::Error::other("non-UTF-8 path prefix"))?;

            let base = Utf8PathBuf::from(prefix_str).join(std::path::MAIN_SEPARATOR.to_string());
            let relative = std_parent
                .strip_prefix(base.as_std_path())
                .or_else(|_| std_parent.strip_prefix(prefix.as_os_str()))
                .map_err(|_| io::Error::other("failed to strip prefix from path"))?
                .to_path_buf();
            (base, relative)
        }
        // Unix-style absolute path.
        Some(Component::RootDir) => {
            let base = Utf8PathBuf::from(std::path::MAIN_SEPARATOR.to_string());
            let relative = std_parent
                .strip_prefix(base.as_std_path())
                .map_err(|_| io::Error::other("failed to strip root from absolute path"))?
                .to_path_buf();
            (base, relative)
        }
        // Relative path: resolve from the current directory.
        _ => (Utf8PathBuf::from("."), std_parent.to_path_buf()),
    };

    let dir = fs_utf8::Dir::open_ambient_dir(&base, ambient_authority())?;
    let relative =
        Utf8PathBuf::from_path_buf(relative).map_err(|_| io::Error::other("non-UTF-8 path"))?;

    Ok((dir, relative))
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

    #[rstest]
    fn ensure_dir_creates_nested_directories(
        #[from(root)] (_dir, root): (TempDir, Utf8PathBuf),
    ) {
        let nested = root.join("a/b/c");
        ensure_dir(&nested).expect("create nested dir");
        assert!(nested.is_dir());
    }

    #[rstest]
    fn open_sized_file_grows_but_never_truncates(
        #[from(root)] (_dir, root): (TempDir, Utf8PathBuf),
    ) {
        let dir = ensure_dir(&root).expect("open root");
        let file = open_sized_file(&dir, "0.part", 64).expect("create file");
        assert_eq!(file.metadata().expect("metadata").len(), 64);
        drop(file);

        let reopened = open_sized_file(&dir, "0.part", 16).expect("reopen file");
        assert_eq!(reopened.metadata().expect("metadata").len(), 64);
    }

    #[rstest]
    fn remove_helpers_tolerate_missing_paths(
        #[from(root)] (_dir, root): (TempDir, Utf8PathBuf),
    ) {
        remove_dir_all(&root.join("missing")).expect("missing dir is fine");
        remove_file(&root.join("missing.part")).expect("missing file is fine");
    }

    #[rstest]
    fn remove_dir_all_deletes_tree(#[from(root)] (_dir, root): (TempDir, Utf8PathBuf)) {
        let tree = root.join("segments");
        let dir = ensure_dir(&tree).expect("create tree");
        open_sized_file(&dir, "header", 8).expect("create header");
        remove_dir_all(&tree).expect("remove tree");
        assert!(!tree.exists());
    }

    #[rstest]
    fn file_is_file_distinguishes_directories(
        #[from(root)] (_dir, root): (TempDir, Utf8PathBuf),
    ) {
        let dir = ensure_dir(&root).expect("open root");
        open_sized_file(&dir, "data.bin", 0).expect("create file");
        assert!(file_is_file(&root.join("data.bin")).expect("inspect file"));
        ensure_dir(&root.join("nested")).expect("create nested");
        assert!(!file_is_file(&root.join("nested")).expect("inspect dir"));
    }

    #[rstest]
    fn create_utf8_file_builds_parents_and_truncates(
        #[from(root)] (_dir, root): (TempDir, Utf8PathBuf),
    ) {
        use std::io::Write;

        let path = root.join("out/nested/values.bin");
        let mut file = create_utf8_file(&path).expect("create file");
        file.write_all(b"0123456789").expect("write");
        drop(file);
        let file = create_utf8_file(&path).expect("recreate file");
        assert_eq!(file.metadata().expect("metadata").len(), 0);
    }
}
