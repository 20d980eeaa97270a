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

//! Runs one sync between two in-memory fixture trees and a file-backed
//! mapping store, printing the resulting plans. Not the CLI the spec
//! excludes: the only "argument" is which built-in fixture to load.

use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use bookmark_sync_core::adapter::SyncConfig;
use bookmark_sync_core::adapter::TreeProvider;
use bookmark_sync_core::error::AdapterError;
use bookmark_sync_core::item::ItemId;
use bookmark_sync_core::mapping::InMemoryMappingStore;
use bookmark_sync_core::mapping::MappingTables;
use bookmark_sync_core::sync::sync;
use bookmark_sync_core::Action;
use bookmark_sync_core::ActionKind;
use bookmark_sync_core::Item;
use bookmark_sync_core::Plan;
use bookmark_sync_core::Tree;

struct InMemoryTreeProvider {
    tree: Mutex<Tree>,
}

impl InMemoryTreeProvider {
    fn new(tree: Tree) -> Self {
        Self { tree: Mutex::new(tree) }
    }
}

#[async_trait]
impl TreeProvider for InMemoryTreeProvider {
    async fn get_tree(&self) -> Result<Tree, AdapterError> {
        Ok(self.tree.lock().expect("mutex never poisoned").clone())
    }

    async fn load_folder_children(&self, _id: &ItemId) -> Result<Tree, AdapterError> {
        self.get_tree().await
    }

    async fn apply_plan(&self, plan: &Plan) -> Result<(), AdapterError> {
        let mut tree = self.tree.lock().expect("mutex never poisoned");
        for action in plan.actions() {
            apply_action(&mut tree, action);
        }
        Ok(())
    }
}

fn apply_action(tree: &mut Tree, action: &Action) {
    match action.kind {
        ActionKind::Create => match &action.payload {
            Item::Folder(f) => {
                let parent = f.parent_id.clone().unwrap_or_else(ItemId::root);
                tree.create_folder(f.id.clone(), parent, f.title.clone());
            }
            Item::Bookmark(b) => {
                tree.create_bookmark(b.id.clone(), b.parent_id.clone(), b.title.clone(), b.url.clone());
            }
        },
        ActionKind::Update => match &action.payload {
            Item::Folder(f) => tree.update_folder(&f.id, f.title.clone()),
            Item::Bookmark(b) => tree.update_bookmark(&b.id, b.title.clone(), b.url.clone()),
        },
        ActionKind::Move => {
            let parent = action.payload.parent_id().cloned().unwrap_or_else(ItemId::root);
            tree.move_item(action.payload.id(), parent);
        }
        ActionKind::Remove => tree.remove(action.payload.id()),
        ActionKind::Reorder => {
            if let Some(order) = &action.order {
                let ids: Vec<ItemId> = order.iter().map(|(_, id)| id.clone()).collect();
                tree.reorder_children(action.payload.id(), &ids);
            }
        }
    }
}

fn fixture(name: &str) -> (Tree, Tree) {
    let mut local = Tree::empty();
    let mut server = Tree::empty();
    match name {
        "first-sync" => {
            local.create_folder(ItemId::from("l-work"), ItemId::root(), "Work".into());
            local.create_bookmark(
                ItemId::from("l-b1"),
                ItemId::from("l-work"),
                "Example".into(),
                "https://example.com".into(),
            );
            server.create_folder(ItemId::from("s-work"), ItemId::root(), "Work".into());
            server.create_bookmark(
                ItemId::from("s-b1"),
                ItemId::from("s-work"),
                "Example".into(),
                "https://example.com".into(),
            );
        }
        _ => {
            local.create_bookmark(
                ItemId::from("l-b1"),
                ItemId::root(),
                "Example".into(),
                "https://example.com".into(),
            );
            server.create_bookmark(
                ItemId::from("s-b1"),
                ItemId::root(),
                "Example".into(),
                "https://example.com".into(),
            );
        }
    }
    (local, server)
}

fn mapping_store_path() -> PathBuf {
    std::env::temp_dir().join("bookmark-sync-demo-mapping.json")
}

fn load_mapping_store() -> InMemoryMappingStore {
    let path = mapping_store_path();
    match std::fs::read_to_string(&path) {
        Ok(contents) => {
            let tables: MappingTables = serde_json::from_str(&contents).unwrap_or_default();
            InMemoryMappingStore::from_tables(tables)
        }
        Err(_) => InMemoryMappingStore::new(),
    }
}

fn save_mapping_store(tables: &MappingTables) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(tables)?;
    std::fs::write(mapping_store_path(), json)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let fixture_name = std::env::args().nth(1).unwrap_or_else(|| "first-sync".to_owned());
    let (local_tree, server_tree) = fixture(&fixture_name);

    let local = InMemoryTreeProvider::new(local_tree);
    let server = InMemoryTreeProvider::new(server_tree);
    let mapping_store = load_mapping_store();
    let config = SyncConfig::default();

    match sync(&local, &server, &mapping_store, &config).await {
        Ok(outcome) => {
            println!(
                "sync ok: {} local action(s), {} server action(s), {} new mapping(s), first_sync={}",
                outcome.local_plan.len(),
                outcome.server_plan.len(),
                outcome.new_mappings.len(),
                outcome.was_first_sync,
            );
            if let Err(err) = save_mapping_store(&mapping_store.to_tables()) {
                eprintln!("warning: failed to persist mapping store: {err}");
            }
        }
        Err(err) => {
            eprintln!("sync failed: {err}");
            std::process::exit(1);
        }
    }
}
