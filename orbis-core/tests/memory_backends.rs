//! Collections behave identically over every memory backend.

use camino::Utf8PathBuf;
use orbis_core::codec::{LongDataType, StringDataType};
use orbis_core::{
    AlignedDataList, DataList, DataMap, IndexedDataList, Memory, MemoryConfig, MemoryError,
    MemoryKind, SortedDataMap,
};
use rstest::{fixture, rstest};
use tempfile::TempDir;

#[fixture]
fn workspace() -> (TempDir, Utf8PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 tempdir");
    (dir, root)
}

fn config(kind: MemoryKind, root: &Utf8PathBuf, name: &str) -> MemoryConfig {
    let path = match kind {
        MemoryKind::OnHeap | MemoryKind::OffHeap => None,
        MemoryKind::MappedFile | MemoryKind::MappedDirectory => Some(root.join(name)),
    };
    MemoryConfig {
        kind,
        segment_size: 1024,
        header_size: 64,
        path,
    }
}

#[rstest]
#[case::on_heap(MemoryKind::OnHeap)]
#[case::off_heap(MemoryKind::OffHeap)]
#[case::mapped_file(MemoryKind::MappedFile)]
#[case::mapped_directory(MemoryKind::MappedDirectory)]
fn aligned_lists_span_segments(
    #[from(workspace)] (_dir, root): (TempDir, Utf8PathBuf),
    #[case] kind: MemoryKind,
) {
    let memory = config(kind, &root, "longs").open().expect("memory should open");
    let list = AlignedDataList::new(memory, LongDataType).expect("list should be created");
    for value in 0..1_000_i64 {
        list.add(&(value * value)).expect("add should succeed");
    }
    assert_eq!(list.get(999).expect("get should succeed"), 998_001);
    let values: Vec<i64> = list
        .iter()
        .collect::<Result<_, _>>()
        .expect("iteration should succeed");
    assert_eq!(values.len(), 1_000);
    list.clear().expect("clear should succeed");
    assert!(list.is_empty());
}

#[rstest]
#[case::mapped_file(MemoryKind::MappedFile)]
#[case::mapped_directory(MemoryKind::MappedDirectory)]
fn indexed_lists_survive_reopening(
    #[from(workspace)] (_dir, root): (TempDir, Utf8PathBuf),
    #[case] kind: MemoryKind,
) {
    let open = || {
        IndexedDataList::new(
            config(kind, &root, "index").open().expect("index should open"),
            config(kind, &root, "values").open().expect("values should open"),
            StringDataType,
        )
        .expect("list should be created")
    };
    {
        let list = open();
        for name in ["Rue de Rivoli", "Unter den Linden", "Nevsky Prospekt"] {
            list.add(&name.to_owned()).expect("add should succeed");
        }
        list.close().expect("close should succeed");
    }
    let list = open();
    assert_eq!(list.size(), 3);
    assert_eq!(list.get(1).expect("get should succeed"), "Unter den Linden");
}

#[rstest]
fn sorted_maps_resume_after_reopening(#[from(workspace)] (_dir, root): (TempDir, Utf8PathBuf)) {
    let kind = MemoryKind::MappedDirectory;
    let open = || {
        let values = AlignedDataList::new(
            config(kind, &root, "values").open().expect("values should open"),
            LongDataType,
        )
        .expect("values should be created");
        SortedDataMap::new(
            config(kind, &root, "chunks").open().expect("chunks should open"),
            config(kind, &root, "keys").open().expect("keys should open"),
            values,
        )
        .expect("map should be created")
    };
    {
        let map = open();
        map.put(10, &100).expect("put should succeed");
        map.put(300, &3_000).expect("put should succeed");
        map.close().expect("close should succeed");
    }
    let map = open();
    assert_eq!(map.get(300).expect("get should succeed"), Some(3_000));
    assert!(map.put(20, &0).is_err(), "keys must keep ascending");
    map.put(301, &3_010).expect("put should succeed");
    assert_eq!(map.size(), 3);
}

#[rstest]
#[case::mapped_file(MemoryKind::MappedFile)]
#[case::mapped_directory(MemoryKind::MappedDirectory)]
fn mapped_backends_need_a_path(#[case] kind: MemoryKind) {
    let config = MemoryConfig {
        kind,
        ..MemoryConfig::default()
    };
    assert!(matches!(
        config.open(),
        Err(MemoryError::MissingPath { kind: found }) if found == kind
    ));
}

#[rstest]
#[case(0)]
#[case(3)]
#[case(1000)]
fn segment_sizes_must_be_powers_of_two(#[case] segment_size: usize) {
    let config = MemoryConfig {
        segment_size,
        ..MemoryConfig::default()
    };
    assert!(matches!(
        config.open(),
        Err(MemoryError::InvalidSegmentSize { size }) if size == segment_size
    ));
}

#[rstest]
fn closed_memory_rejects_segment_requests() {
    let memory = MemoryConfig::default().open().expect("memory should open");
    memory.close().expect("close should succeed");
    assert!(memory.is_closed());
    assert!(matches!(memory.segment(0), Err(MemoryError::Closed)));
}
