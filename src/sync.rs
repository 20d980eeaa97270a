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

//! The top-level sync driver: loads both trees, diffs and reconciles them,
//! reorders, and applies the two resulting plans. Owns the only suspension
//! points in the engine (§5): every `.await` here is a single adapter call.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use tracing::debug_span;
use tracing::info;
use tracing::info_span;
use tracing::warn;
use tracing::Instrument;

use crate::action::Plan;
use crate::adapter::SyncConfig;
use crate::adapter::TreeProvider;
use crate::error::SyncError;
use crate::item::Item;
use crate::item::ItemId;
use crate::item::ItemKind;
use crate::mapping::MappingSnapshot;
use crate::mapping::MappingStore;
use crate::mapping::NewMapping;
use crate::mapping::Side;
use crate::reconcile;
use crate::scanner;
use crate::scanner::ScanOptions;
use crate::tree::Tree;

static NEXT_SYNC_ID: AtomicU64 = AtomicU64::new(1);

/// What a completed run did, for the caller to report or assert on in tests.
#[derive(Debug, Default)]
pub struct SyncOutcome {
    pub local_plan: Plan,
    pub server_plan: Plan,
    pub new_mappings: Vec<NewMapping>,
    pub was_first_sync: bool,
}

pub async fn sync(
    local: &dyn TreeProvider,
    server: &dyn TreeProvider,
    mapping_store: &dyn MappingStore,
    config: &SyncConfig,
) -> Result<SyncOutcome, SyncError> {
    let sync_id = NEXT_SYNC_ID.fetch_add(1, Ordering::Relaxed);
    let span = info_span!("sync", sync_id);
    async move {
        info!("starting sync");
        let local_tree = local.get_tree().await?;
        let server_tree = server.get_tree().await?;
        let mapping = mapping_store.snapshot();

        let options = ScanOptions {
            preserve_order: config.preserve_order,
            check_hashes: config.check_hashes,
        };

        let is_first_sync = mapping.is_empty() && config.allow_first_sync_merge;
        let mut outcome = if is_first_sync {
            first_sync(&local_tree, &server_tree, &options)?
        } else {
            normal_sync(&local_tree, &server_tree, &mapping, &options)?
        };

        for stale in &outcome.stale_mappings {
            let reported = SyncError::InconsistentMapping { id: stale.id.clone(), kind: stale.kind };
            warn!(error = %reported, "dropping stale mapping");
            mapping_store.remove_mapping(stale.side, stale.kind, &stale.id);
        }

        {
            let _span = debug_span!("reorder").entered();
            if config.preserve_order {
                reconcile::reconcile_reorder(&mut outcome.server_plan, &local_tree, &server_tree, &mapping, true);
                if !is_first_sync {
                    reconcile::reconcile_reorder(&mut outcome.local_plan, &server_tree, &local_tree, &mapping, false);
                }
            }
        }

        local.apply_plan(&outcome.local_plan).await?;
        server.apply_plan(&outcome.server_plan).await?;

        for mapping in &outcome.new_mappings {
            mapping_store.add_mapping(Side::Local, mapping.kind, mapping.local_id.clone(), mapping.server_id.clone());
        }

        info!(
            local_actions = outcome.local_plan.len(),
            server_actions = outcome.server_plan.len(),
            new_mappings = outcome.new_mappings.len(),
            "sync complete"
        );

        Ok(SyncOutcome {
            local_plan: outcome.local_plan,
            server_plan: outcome.server_plan,
            new_mappings: outcome.new_mappings,
            was_first_sync: is_first_sync,
        })
    }
    .instrument(span)
    .await
}

fn first_sync(local_tree: &Tree, server_tree: &Tree, options: &ScanOptions) -> Result<reconcile::Reconciliation, SyncError> {
    let _span = debug_span!("scan", side = "first-sync").entered();
    let empty = Tree::empty();
    let local_diff = scanner::scan(&empty, local_tree, &scanner::never_merge, *options)?.diff;
    let server_diff = scanner::scan(&empty, server_tree, &scanner::never_merge, *options)?.diff;
    drop(_span);
    let _span = debug_span!("reconcile").entered();
    reconcile::reconcile_first_sync(&local_diff, &server_diff, local_tree, server_tree)
}

fn normal_sync(
    local_tree: &Tree,
    server_tree: &Tree,
    mapping: &MappingSnapshot,
    options: &ScanOptions,
) -> Result<reconcile::Reconciliation, SyncError> {
    let (local_diff, server_diff) = {
        let _span = debug_span!("scan", side = "local").entered();
        let mirror_of_server = mirror_tree(server_tree, mapping, true);
        let local_diff = scanner::scan(&mirror_of_server, local_tree, &scanner::never_merge, *options)?.diff;
        drop(_span);
        let _span = debug_span!("scan", side = "server").entered();
        let mirror_of_local = mirror_tree(local_tree, mapping, false);
        let server_diff = scanner::scan(&mirror_of_local, server_tree, &scanner::never_merge, *options)?.diff;
        (local_diff, server_diff)
    };
    let _span = debug_span!("reconcile").entered();
    reconcile::reconcile_normal(&local_diff, &server_diff, mapping, local_tree, server_tree)
}

/// Rebuilds `source` with every id translated through `mapping`, dropping
/// nodes with no counterpart yet (they have no place in a baseline — they
/// are, by construction, the other side's pending creates). This stands in
/// for the last-synced snapshot that isn't otherwise persisted (§3: the
/// mapping table *is* the implicit common ancestor).
fn mirror_tree(source: &Tree, mapping: &MappingSnapshot, to_local: bool) -> Tree {
    let mut mirror = Tree::empty();
    mirror_children(source, source.root_id(), &mut mirror, &ItemId::root(), mapping, to_local);
    mirror
}

fn mirror_children(src: &Tree, src_parent: &ItemId, dst: &mut Tree, dst_parent: &ItemId, mapping: &MappingSnapshot, to_local: bool) {
    for child in src.children(src_parent) {
        let kind = if src.is_folder(child) { ItemKind::Folder } else { ItemKind::Bookmark };
        let translated = if to_local {
            mapping.to_local(kind, child)
        } else {
            mapping.to_server(kind, child)
        };
        let Some(new_id) = translated.cloned() else { continue };
        match src.find_item(child) {
            Some(Item::Folder(folder)) => {
                dst.create_folder(new_id.clone(), dst_parent.clone(), folder.title);
                mirror_children(src, child, dst, &new_id, mapping, to_local);
            }
            Some(Item::Bookmark(bookmark)) => {
                dst.create_bookmark(new_id, dst_parent.clone(), bookmark.title, bookmark.url);
            }
            None => {}
        }
    }
}
