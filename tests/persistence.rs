// Copyright 2024 The Bookmark Sync Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Round-trips a mapping table through a JSON file, the same shape of
//! persistence `src/bin/sync_demo.rs` does against `std::env::temp_dir()`.

use bookmark_sync_core::item::ItemId;
use bookmark_sync_core::item::ItemKind;
use bookmark_sync_core::mapping::InMemoryMappingStore;
use bookmark_sync_core::mapping::MappingStore;
use bookmark_sync_core::mapping::MappingTables;
use bookmark_sync_core::mapping::Side;
use pretty_assertions::assert_eq;

#[test]
fn mapping_tables_round_trip_through_a_file() {
    let store = InMemoryMappingStore::new();
    store.add_mapping(Side::Local, ItemKind::Folder, ItemId::from("l-f1"), ItemId::from("s-f1"));
    store.add_mapping(Side::Local, ItemKind::Bookmark, ItemId::from("l-b1"), ItemId::from("s-b1"));

    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("mapping.json");

    let tables = store.into_tables();
    let json = serde_json::to_string_pretty(&tables).expect("serialize mapping tables");
    std::fs::write(&path, &json).expect("write mapping file");

    let contents = std::fs::read_to_string(&path).expect("read mapping file");
    let restored: MappingTables = serde_json::from_str(&contents).expect("deserialize mapping tables");
    let restored_store = InMemoryMappingStore::from_tables(restored);
    let snapshot = restored_store.snapshot();

    assert_eq!(snapshot.to_server(ItemKind::Folder, &ItemId::from("l-f1")), Some(&ItemId::from("s-f1")));
    assert_eq!(snapshot.to_local(ItemKind::Bookmark, &ItemId::from("s-b1")), Some(&ItemId::from("l-b1")));
}

#[test]
fn missing_mapping_file_yields_an_empty_store() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("does-not-exist.json");

    let store = match std::fs::read_to_string(&path) {
        Ok(contents) => {
            let tables: MappingTables = serde_json::from_str(&contents).unwrap_or_default();
            InMemoryMappingStore::from_tables(tables)
        }
        Err(_) => InMemoryMappingStore::new(),
    };

    assert!(store.snapshot().is_empty());
}
