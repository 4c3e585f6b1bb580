//! Behavioural tests for the dense and indexed data maps.

use std::cell::RefCell;

use orbis_core::codec::{IntegerDataType, StringDataType};
use orbis_core::{CollectionError, DataMap, DenseDataMap, IndexedDataMap, OnHeapMemory};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

/// World state shared by the data map scenarios.
#[derive(Debug, Default)]
struct MapWorld {
    dense: RefCell<Option<DenseDataMap<IntegerDataType>>>,
    indexed: RefCell<Option<IndexedDataMap<StringDataType>>>,
}

#[fixture]
fn world() -> MapWorld {
    MapWorld::default()
}

#[given("a dense integer map over 1024-byte segments")]
fn given_dense_map(world: &MapWorld) {
    let memory = OnHeapMemory::new(1024).expect("memory should be created");
    let map = DenseDataMap::new(memory, IntegerDataType).expect("map should be created");
    world.dense.replace(Some(map));
}

#[given("an indexed string map")]
fn given_indexed_map(world: &MapWorld) {
    let memory = OnHeapMemory::new(1024).expect("memory should be created");
    let map = IndexedDataMap::new(memory, StringDataType).expect("map should be created");
    world.indexed.replace(Some(map));
}

#[when("key {key} is set to {value}")]
fn when_dense_put(world: &MapWorld, key: i64, value: i32) {
    let borrowed = world.dense.borrow();
    let map = borrowed.as_ref().expect("dense map should exist");
    map.put(key, &value).expect("put should succeed");
}

#[when("key {key} is mapped to {value}")]
fn when_indexed_put(world: &MapWorld, key: i64, value: String) {
    let borrowed = world.indexed.borrow();
    let map = borrowed.as_ref().expect("indexed map should exist");
    map.put(key, &value.trim_matches('"').to_owned())
        .expect("put should succeed");
}

#[then("key {key} reads {value}")]
fn then_dense_reads(world: &MapWorld, key: i64, value: i32) {
    let borrowed = world.dense.borrow();
    let map = borrowed.as_ref().expect("dense map should exist");
    assert_eq!(map.get(key).expect("get should succeed"), Some(value));
}

#[then("writing the largest key is a range error")]
fn then_largest_key_fails(world: &MapWorld) {
    let borrowed = world.dense.borrow();
    let map = borrowed.as_ref().expect("dense map should exist");
    let result = map.put(i64::MAX, &1);
    assert!(
        matches!(result, Err(CollectionError::KeyOutOfRange { key: i64::MAX })),
        "expected a range error, got {result:?}"
    );
}

#[then("key {key} maps to {value}")]
fn then_indexed_maps_to(world: &MapWorld, key: i64, value: String) {
    let borrowed = world.indexed.borrow();
    let map = borrowed.as_ref().expect("indexed map should exist");
    let found = map.get(key).expect("get should succeed");
    assert_eq!(found.as_deref(), Some(value.trim_matches('"')));
}

#[then("key {key} is absent")]
fn then_indexed_absent(world: &MapWorld, key: i64) {
    let borrowed = world.indexed.borrow();
    let map = borrowed.as_ref().expect("indexed map should exist");
    assert_eq!(map.get(key).expect("get should succeed"), None);
    assert!(!map.contains_key(key).expect("contains should succeed"));
}

#[scenario(path = "tests/features/data_map.feature", index = 0)]
fn scenario_dense_boundary(world: MapWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/data_map.feature", index = 1)]
fn scenario_indexed_last_write(world: MapWorld) {
    let _ = world;
}
