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

//! The first-sync (merge) reconciler (§4.4): run when the mapping table is
//! empty, both trees may describe the same logical items under unrelated
//! ids.

use tracing::debug;

use crate::action::Diff;
use crate::error::SyncError;
use crate::item::ItemKind;
use crate::mapping::MappingSnapshot;
use crate::mapping::NewMapping;
use crate::reconcile::Reconciliation;
use crate::reconcile::normal::reconcile_normal;
use crate::tree::Tree;

/// Pairs the two trees by `can_merge_with` and persists the result, then
/// reconciles `local_diff`/`server_diff` (each normally a full-CREATE diff
/// produced by scanning each tree against an empty baseline) exactly as
/// `reconcile_normal` would, now that the fresh pairings make its
/// concurrent-create handling recognize already-paired items.
pub fn reconcile_first_sync(
    local_diff: &Diff,
    server_diff: &Diff,
    local_tree: &Tree,
    server_tree: &Tree,
) -> Result<Reconciliation, SyncError> {
    let pairing = crate::reconcile::pair_subtree(local_tree, local_tree.root_id(), server_tree, server_tree.root_id());

    let mut mapping = MappingSnapshot::default();
    let mut new_mappings = Vec::with_capacity(pairing.len());
    for (local_item, server_item) in pairing {
        debug!(local = %local_item.id(), server = %server_item.id(), "merge: paired");
        mapping = mapping.with_pairing(local_item.kind(), local_item.id().clone(), server_item.id().clone());
        new_mappings.push(NewMapping {
            kind: local_item.kind(),
            local_id: local_item.id().clone(),
            server_id: server_item.id().clone(),
        });
    }

    // Root pairing is implicit in the tree model (both roots use the
    // sentinel id), so it is not persisted as a mapping entry; folder ids
    // below it are.
    new_mappings.retain(|m| m.kind != ItemKind::Folder || !m.local_id.is_root());

    let mut reconciliation = reconcile_normal(local_diff, server_diff, &mapping, local_tree, server_tree)?;
    reconciliation.new_mappings.splice(0..0, new_mappings);
    crate::reconcile::dedup_mappings(&mut reconciliation.new_mappings);
    Ok(reconciliation)
}
