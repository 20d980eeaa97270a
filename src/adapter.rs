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

//! The adapter boundary (§6): the core drives a [`TreeProvider`] for each
//! side and a [`MappingStore`] for the pairing table, but implements neither
//! — those belong to the embedding application.

use async_trait::async_trait;

use crate::action::Plan;
use crate::error::AdapterError;
use crate::item::ItemId;
use crate::tree::Tree;

/// Sync-wide tunables the embedding application collects; the core never
/// reads files or environment variables itself (§6c).
#[derive(Clone, Copy, Debug)]
pub struct SyncConfig {
    /// Emit REORDER actions at all. Disabling this drops §4.5 entirely.
    pub preserve_order: bool,
    /// Skip recursing into folders whose hash is unchanged across sides.
    pub check_hashes: bool,
    /// Whether first-sync heuristic pairing (§4.4) is allowed. When `false`
    /// and the mapping table is empty, every item is created on both sides
    /// instead of paired.
    pub allow_first_sync_merge: bool,
    /// Upper bound on items a single `bulk_import_folder` call may place;
    /// advisory only, the core never calls that adapter method itself.
    pub bulk_import_cap: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            preserve_order: true,
            check_hashes: true,
            allow_first_sync_merge: true,
            bulk_import_cap: 500,
        }
    }
}

/// One side's tree store (§6: "Tree provider"). The core calls this to load
/// a tree and, separately, to apply the actions a reconciliation produced
/// for this side.
#[async_trait]
pub trait TreeProvider: Send + Sync {
    /// Full tree load. A sparse provider may return folders with
    /// `loaded = false`; the core does not currently request incremental
    /// loads (see DESIGN.md) and expects a fully loaded tree back.
    async fn get_tree(&self) -> Result<Tree, AdapterError>;

    /// Loads the children of a folder previously returned unloaded.
    async fn load_folder_children(&self, id: &ItemId) -> Result<Tree, AdapterError>;

    /// Applies every action in `plan`, in order. Adapters that cannot apply
    /// an action atomically should fail fast rather than skip it, since the
    /// caller records mapping additions only for actions it believes
    /// succeeded.
    async fn apply_plan(&self, plan: &Plan) -> Result<(), AdapterError>;
}
