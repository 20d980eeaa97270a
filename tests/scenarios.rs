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

//! Scenario-level coverage against the crate's public API: the six
//! concrete scenarios and a couple of the general invariants.

use bookmark_sync_core::action::ActionKind;
use bookmark_sync_core::item::ItemId;
use bookmark_sync_core::item::ItemKind;
use bookmark_sync_core::mapping::InMemoryMappingStore;
use bookmark_sync_core::mapping::MappingStore;
use bookmark_sync_core::mapping::Side;
use bookmark_sync_core::reconcile::reconcile_first_sync;
use bookmark_sync_core::reconcile::reconcile_normal;
use bookmark_sync_core::reconcile::reconcile_reorder;
use bookmark_sync_core::scanner;
use bookmark_sync_core::scanner::ScanOptions;
use bookmark_sync_core::Tree;
use pretty_assertions::assert_eq;

fn empty_diff(tree: &Tree) -> bookmark_sync_core::Diff {
    scanner::scan(&Tree::empty(), tree, &scanner::never_merge, ScanOptions::default())
        .unwrap()
        .diff
}

/// S1: local and server trees contain the same layout under different ids.
#[test]
fn s1_first_sync_identity() {
    let mut local = Tree::empty();
    local.create_folder(ItemId::from("l-f1"), ItemId::root(), "Work".into());
    local.create_folder(ItemId::from("l-f2"), ItemId::root(), "Personal".into());
    local.create_bookmark(
        ItemId::from("l-b1"),
        ItemId::from("l-f1"),
        "Example".into(),
        "https://example.com".into(),
    );
    local.create_bookmark(
        ItemId::from("l-b2"),
        ItemId::from("l-f1"),
        "Other".into(),
        "https://other.example".into(),
    );
    local.create_bookmark(
        ItemId::from("l-b3"),
        ItemId::from("l-f2"),
        "Home".into(),
        "https://home.example".into(),
    );

    let mut server = Tree::empty();
    server.create_folder(ItemId::from("s-f1"), ItemId::root(), "Work".into());
    server.create_folder(ItemId::from("s-f2"), ItemId::root(), "Personal".into());
    server.create_bookmark(
        ItemId::from("s-b1"),
        ItemId::from("s-f1"),
        "Example".into(),
        "https://example.com".into(),
    );
    server.create_bookmark(
        ItemId::from("s-b2"),
        ItemId::from("s-f1"),
        "Other".into(),
        "https://other.example".into(),
    );
    server.create_bookmark(
        ItemId::from("s-b3"),
        ItemId::from("s-f2"),
        "Home".into(),
        "https://home.example".into(),
    );

    let local_diff = empty_diff(&local);
    let server_diff = empty_diff(&server);

    let reconciliation = reconcile_first_sync(&local_diff, &server_diff, &local, &server).unwrap();

    assert!(reconciliation.local_plan.is_empty());
    assert!(reconciliation.server_plan.is_empty());
    assert_eq!(reconciliation.new_mappings.len(), 5);

    let store = InMemoryMappingStore::new();
    for mapping in &reconciliation.new_mappings {
        store.add_mapping(Side::Local, mapping.kind, mapping.local_id.clone(), mapping.server_id.clone());
    }
    let snapshot = store.snapshot();
    assert_eq!(snapshot.to_server(ItemKind::Folder, &ItemId::from("l-f1")), Some(&ItemId::from("s-f1")));
    assert_eq!(snapshot.to_server(ItemKind::Bookmark, &ItemId::from("l-b3")), Some(&ItemId::from("s-b3")));
}

/// S2: both sides independently create a bookmark with the same URL under
/// the same (already paired) folder.
#[test]
fn s2_concurrent_create() {
    let mut local = Tree::empty();
    local.create_folder(ItemId::from("l-f"), ItemId::root(), "Work".into());
    local.create_bookmark(
        ItemId::from("l-new"),
        ItemId::from("l-f"),
        "New".into(),
        "https://new.example".into(),
    );

    let mut server = Tree::empty();
    server.create_folder(ItemId::from("s-f"), ItemId::root(), "Work".into());
    server.create_bookmark(
        ItemId::from("s-new"),
        ItemId::from("s-f"),
        "New".into(),
        "https://new.example".into(),
    );

    let store = InMemoryMappingStore::new();
    store.add_mapping(Side::Local, ItemKind::Folder, ItemId::from("l-f"), ItemId::from("s-f"));
    let mapping = store.snapshot();

    let mut local_baseline = Tree::empty();
    local_baseline.create_folder(ItemId::from("l-f"), ItemId::root(), "Work".into());
    let local_diff = scanner::scan(&local_baseline, &local, &scanner::never_merge, ScanOptions::default())
        .unwrap()
        .diff;
    let mut server_baseline = Tree::empty();
    server_baseline.create_folder(ItemId::from("s-f"), ItemId::root(), "Work".into());
    let server_diff = scanner::scan(&server_baseline, &server, &scanner::never_merge, ScanOptions::default())
        .unwrap()
        .diff;

    let reconciliation = reconcile_normal(&local_diff, &server_diff, &mapping, &local, &server).unwrap();

    assert!(reconciliation.server_plan.actions_of_kind(ActionKind::Create).next().is_none());
    assert!(reconciliation.local_plan.actions_of_kind(ActionKind::Create).next().is_none());
    assert_eq!(reconciliation.new_mappings.len(), 1);
    assert_eq!(reconciliation.new_mappings[0].local_id, ItemId::from("l-new"));
    assert_eq!(reconciliation.new_mappings[0].server_id, ItemId::from("s-new"));
}

/// S3: local moves folder A into B while server moves B into A.
#[test]
fn s3_concurrent_move_cycle() {
    let mut local = Tree::empty();
    local.create_folder(ItemId::from("l-a"), ItemId::root(), "A".into());
    local.create_folder(ItemId::from("l-b"), ItemId::root(), "B".into());
    local.move_item(&ItemId::from("l-a"), ItemId::from("l-b"));

    let mut server = Tree::empty();
    server.create_folder(ItemId::from("s-a"), ItemId::root(), "A".into());
    server.create_folder(ItemId::from("s-b"), ItemId::root(), "B".into());
    server.move_item(&ItemId::from("s-b"), ItemId::from("s-a"));

    let store = InMemoryMappingStore::new();
    store.add_mapping(Side::Local, ItemKind::Folder, ItemId::from("l-a"), ItemId::from("s-a"));
    store.add_mapping(Side::Local, ItemKind::Folder, ItemId::from("l-b"), ItemId::from("s-b"));
    let mapping = store.snapshot();

    let mut baseline = Tree::empty();
    baseline.create_folder(ItemId::from("l-a"), ItemId::root(), "A".into());
    baseline.create_folder(ItemId::from("l-b"), ItemId::root(), "B".into());
    let local_diff = scanner::scan(&baseline, &local, &scanner::never_merge, ScanOptions::default())
        .unwrap()
        .diff;
    let mut server_baseline = Tree::empty();
    server_baseline.create_folder(ItemId::from("s-a"), ItemId::root(), "A".into());
    server_baseline.create_folder(ItemId::from("s-b"), ItemId::root(), "B".into());
    let server_diff = scanner::scan(&server_baseline, &server, &scanner::never_merge, ScanOptions::default())
        .unwrap()
        .diff;

    let reconciliation = reconcile_normal(&local_diff, &server_diff, &mapping, &local, &server).unwrap();

    let server_moves: Vec<_> = reconciliation.server_plan.actions_of_kind(ActionKind::Move).collect();
    assert_eq!(server_moves.len(), 2, "expected a revert plus the local move");
    assert_eq!(server_moves[0].payload.id(), &ItemId::from("s-b"));
    assert_eq!(server_moves[1].payload.id(), &ItemId::from("s-a"));

    assert!(reconciliation.local_plan.actions_of_kind(ActionKind::Move).next().is_none());
}

/// S4: concurrent title updates to the same (mapped) bookmark; local wins.
#[test]
fn s4_update_precedence_local_wins() {
    let mut local = Tree::empty();
    local.create_bookmark(ItemId::from("l-x"), ItemId::root(), "L".into(), "https://x.example".into());
    let mut server = Tree::empty();
    server.create_bookmark(ItemId::from("s-x"), ItemId::root(), "S".into(), "https://x.example".into());

    let store = InMemoryMappingStore::new();
    store.add_mapping(Side::Local, ItemKind::Bookmark, ItemId::from("l-x"), ItemId::from("s-x"));
    let mapping = store.snapshot();

    let mut baseline = Tree::empty();
    baseline.create_bookmark(ItemId::from("l-x"), ItemId::root(), "X".into(), "https://x.example".into());
    let local_diff = scanner::scan(&baseline, &local, &scanner::never_merge, ScanOptions::default())
        .unwrap()
        .diff;
    let mut server_baseline = Tree::empty();
    server_baseline.create_bookmark(ItemId::from("s-x"), ItemId::root(), "X".into(), "https://x.example".into());
    let server_diff = scanner::scan(&server_baseline, &server, &scanner::never_merge, ScanOptions::default())
        .unwrap()
        .diff;

    let reconciliation = reconcile_normal(&local_diff, &server_diff, &mapping, &local, &server).unwrap();

    let server_update = reconciliation
        .server_plan
        .actions_of_kind(ActionKind::Update)
        .find(|a| a.payload.id() == &ItemId::from("s-x"))
        .expect("local update mirrored to server");
    assert_eq!(server_update.payload.title(), "L");

    assert!(
        reconciliation
            .local_plan
            .actions_of_kind(ActionKind::Update)
            .all(|a| a.payload.id() != &ItemId::from("l-x"))
    );
}

/// S5: local deletes a folder while server renames a bookmark inside it;
/// the removal never reaches the server plan.
#[test]
fn s5_remove_safety() {
    let mut local = Tree::empty();
    local.create_folder(ItemId::from("l-f"), ItemId::root(), "Work".into());
    local.create_bookmark(
        ItemId::from("l-b"),
        ItemId::from("l-f"),
        "Example".into(),
        "https://example.com".into(),
    );
    local.remove(&ItemId::from("l-f"));

    let mut server = Tree::empty();
    server.create_folder(ItemId::from("s-f"), ItemId::root(), "Work".into());
    server.create_bookmark(
        ItemId::from("s-b"),
        ItemId::from("s-f"),
        "Renamed".into(),
        "https://example.com".into(),
    );

    let store = InMemoryMappingStore::new();
    store.add_mapping(Side::Local, ItemKind::Folder, ItemId::from("l-f"), ItemId::from("s-f"));
    store.add_mapping(Side::Local, ItemKind::Bookmark, ItemId::from("l-b"), ItemId::from("s-b"));
    let mapping = store.snapshot();

    let mut baseline = Tree::empty();
    baseline.create_folder(ItemId::from("l-f"), ItemId::root(), "Work".into());
    baseline.create_bookmark(
        ItemId::from("l-b"),
        ItemId::from("l-f"),
        "Example".into(),
        "https://example.com".into(),
    );
    let local_diff = scanner::scan(&baseline, &local, &scanner::never_merge, ScanOptions::default())
        .unwrap()
        .diff;
    let mut server_baseline = Tree::empty();
    server_baseline.create_folder(ItemId::from("s-f"), ItemId::root(), "Work".into());
    server_baseline.create_bookmark(
        ItemId::from("s-b"),
        ItemId::from("s-f"),
        "Example".into(),
        "https://example.com".into(),
    );
    let server_diff = scanner::scan(&server_baseline, &server, &scanner::never_merge, ScanOptions::default())
        .unwrap()
        .diff;

    let reconciliation = reconcile_normal(&local_diff, &server_diff, &mapping, &local, &server).unwrap();

    assert!(reconciliation.server_plan.actions_of_kind(ActionKind::Remove).next().is_none());
    let local_update = reconciliation
        .local_plan
        .actions_of_kind(ActionKind::Update)
        .find(|a| a.payload.id() == &ItemId::from("l-b"))
        .expect("server rename mirrored to local");
    assert_eq!(local_update.payload.title(), "Renamed");
}

/// S6: local reorders two siblings within a folder; server is unchanged.
/// The server plan gets exactly one REORDER for that parent, never also a
/// MOVE for the same pair.
#[test]
fn s6_reorder_after_move() {
    let mut local = Tree::empty();
    local.create_folder(ItemId::from("l-f"), ItemId::root(), "Work".into());
    local.create_bookmark(ItemId::from("l-b1"), ItemId::from("l-f"), "A".into(), "https://a.example".into());
    local.create_bookmark(ItemId::from("l-b2"), ItemId::from("l-f"), "B".into(), "https://b.example".into());
    local.reorder_children(&ItemId::from("l-f"), &[ItemId::from("l-b2"), ItemId::from("l-b1")]);

    let mut server = Tree::empty();
    server.create_folder(ItemId::from("s-f"), ItemId::root(), "Work".into());
    server.create_bookmark(ItemId::from("s-b1"), ItemId::from("s-f"), "A".into(), "https://a.example".into());
    server.create_bookmark(ItemId::from("s-b2"), ItemId::from("s-f"), "B".into(), "https://b.example".into());

    let store = InMemoryMappingStore::new();
    store.add_mapping(Side::Local, ItemKind::Folder, ItemId::from("l-f"), ItemId::from("s-f"));
    store.add_mapping(Side::Local, ItemKind::Bookmark, ItemId::from("l-b1"), ItemId::from("s-b1"));
    store.add_mapping(Side::Local, ItemKind::Bookmark, ItemId::from("l-b2"), ItemId::from("s-b2"));
    let mapping = store.snapshot();

    let mut baseline = Tree::empty();
    baseline.create_folder(ItemId::from("l-f"), ItemId::root(), "Work".into());
    baseline.create_bookmark(ItemId::from("l-b1"), ItemId::from("l-f"), "A".into(), "https://a.example".into());
    baseline.create_bookmark(ItemId::from("l-b2"), ItemId::from("l-f"), "B".into(), "https://b.example".into());
    let local_diff = scanner::scan(&baseline, &local, &scanner::never_merge, ScanOptions::default())
        .unwrap()
        .diff;
    let mut server_baseline = Tree::empty();
    server_baseline.create_folder(ItemId::from("s-f"), ItemId::root(), "Work".into());
    server_baseline.create_bookmark(ItemId::from("s-b1"), ItemId::from("s-f"), "A".into(), "https://a.example".into());
    server_baseline.create_bookmark(ItemId::from("s-b2"), ItemId::from("s-f"), "B".into(), "https://b.example".into());
    let server_diff = scanner::scan(&server_baseline, &server, &scanner::never_merge, ScanOptions::default())
        .unwrap()
        .diff;

    let mut reconciliation = reconcile_normal(&local_diff, &server_diff, &mapping, &local, &server).unwrap();
    assert!(reconciliation.server_plan.is_empty());

    reconcile_reorder(&mut reconciliation.server_plan, &local, &server, &mapping, true);

    let reorders: Vec<_> = reconciliation.server_plan.actions_of_kind(ActionKind::Reorder).collect();
    assert_eq!(reorders.len(), 1);
    let order = reorders[0].order.as_ref().unwrap();
    assert_eq!(order, &vec![
        (ItemKind::Bookmark, ItemId::from("s-b2")),
        (ItemKind::Bookmark, ItemId::from("s-b1")),
    ]);
    assert!(reconciliation.server_plan.actions_of_kind(ActionKind::Move).next().is_none());
}

/// Invariant 1: diffing a tree against itself is always empty.
#[test]
fn invariant_idempotence_of_diffing() {
    let mut tree = Tree::empty();
    tree.create_folder(ItemId::from("f1"), ItemId::root(), "Work".into());
    tree.create_bookmark(
        ItemId::from("b1"),
        ItemId::from("f1"),
        "Example".into(),
        "https://example.com".into(),
    );
    let result = scanner::scan(&tree, &tree, &scanner::never_merge, ScanOptions::default()).unwrap();
    assert!(result.diff.is_empty());
}

/// Invariant 5: normal-sync plans never contain REMOVE, even when both
/// sides have unrelated deletions.
#[test]
fn invariant_no_spurious_remove() {
    let mut local = Tree::empty();
    local.create_bookmark(ItemId::from("l-b1"), ItemId::root(), "Keep".into(), "https://keep.example".into());
    let mut server = Tree::empty();
    server.create_bookmark(ItemId::from("s-b1"), ItemId::root(), "Keep".into(), "https://keep.example".into());
    server.create_bookmark(ItemId::from("s-b2"), ItemId::root(), "Gone".into(), "https://gone.example".into());
    server.remove(&ItemId::from("s-b2"));

    let store = InMemoryMappingStore::new();
    store.add_mapping(Side::Local, ItemKind::Bookmark, ItemId::from("l-b1"), ItemId::from("s-b1"));
    let mapping = store.snapshot();

    let mut baseline = Tree::empty();
    baseline.create_bookmark(ItemId::from("l-b1"), ItemId::root(), "Keep".into(), "https://keep.example".into());
    let local_diff = scanner::scan(&baseline, &local, &scanner::never_merge, ScanOptions::default())
        .unwrap()
        .diff;
    let mut server_baseline = Tree::empty();
    server_baseline.create_bookmark(ItemId::from("s-b1"), ItemId::root(), "Keep".into(), "https://keep.example".into());
    server_baseline.create_bookmark(ItemId::from("s-b2"), ItemId::root(), "Gone".into(), "https://gone.example".into());
    let server_diff = scanner::scan(&server_baseline, &server, &scanner::never_merge, ScanOptions::default())
        .unwrap()
        .diff;

    let reconciliation = reconcile_normal(&local_diff, &server_diff, &mapping, &local, &server).unwrap();
    assert!(reconciliation.local_plan.actions_of_kind(ActionKind::Remove).next().is_none());
    assert!(reconciliation.server_plan.actions_of_kind(ActionKind::Remove).next().is_none());
}
