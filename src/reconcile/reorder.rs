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

//! The reorder reconciler (§4.5): a post-processing pass that appends
//! REORDER actions to an otherwise-final plan.

use std::collections::HashSet;

use tracing::trace;

use crate::action::Action;
use crate::action::ActionKind;
use crate::action::Plan;
use crate::item::Item;
use crate::item::ItemKind;
use crate::item::ItemId;
use crate::mapping::MappingSnapshot;
use crate::tree::Tree;

/// Appends REORDER actions to `target_plan` for every folder touched by a
/// CREATE or MOVE in it, using `source_tree`'s child order as authoritative.
///
/// `to_server` is `true` when `target_plan` is the server plan (source is
/// local); per §4.5 it is forced `true` when called from the merge path, so
/// local order always wins on first sync.
pub fn reconcile_reorder(target_plan: &mut Plan, source_tree: &Tree, target_tree: &Tree, mapping: &MappingSnapshot, to_server: bool) {
    let mut touched_folders: Vec<ItemId> = Vec::new();
    for action in target_plan.actions() {
        if matches!(action.kind, ActionKind::Create | ActionKind::Move) {
            if let Some(parent) = action.payload.parent_id() {
                if !touched_folders.contains(parent) {
                    touched_folders.push(parent.clone());
                }
            }
        }
    }

    let removed: HashSet<ItemId> = target_plan
        .actions_of_kind(ActionKind::Remove)
        .map(|a| a.payload.id().clone())
        .collect();

    for target_folder_id in touched_folders {
        // Open Question 2: a folder the plan itself removes has no final
        // order worth expressing.
        if removed.contains(&target_folder_id) {
            continue;
        }

        let source_folder_id = source_id_for(&target_folder_id, mapping, to_server);
        let desired: Vec<(ItemKind, ItemId)> = source_tree
            .children(&source_folder_id)
            .iter()
            // Open Question 2 policy: ids this plan drops (suppressed
            // Removes are never in `source_tree` to begin with, but a
            // not-yet-resolved id might be) are skipped rather than guessed.
            .filter(|id| !removed.contains(id))
            .map(|id| {
                let kind = if source_tree.is_folder(id) {
                    ItemKind::Folder
                } else {
                    ItemKind::Bookmark
                };
                (kind, target_id_for(id, kind, mapping, to_server))
            })
            .collect();
        if desired.is_empty() {
            continue;
        }

        let current = target_tree.children(&target_folder_id);
        if current.iter().eq(desired.iter().map(|(_, id)| id)) {
            continue;
        }

        let folder_item = if target_tree.contains(&target_folder_id) {
            target_tree.find_folder(&target_folder_id)
        } else {
            target_plan
                .actions_of_kind(ActionKind::Create)
                .find(|a| a.payload.id() == &target_folder_id)
                .and_then(|a| a.payload.as_folder().cloned())
        };
        let Some(folder_item) = folder_item else { continue };

        trace!(folder = %target_folder_id, "reorder: appending");
        target_plan.commit(Action::reorder(Item::Folder(folder_item), desired));
    }
}

fn target_id_for(source_id: &ItemId, kind: ItemKind, mapping: &MappingSnapshot, to_server: bool) -> ItemId {
    if source_id.is_root() {
        return ItemId::root();
    }
    let translated = if to_server {
        mapping.to_server(kind, source_id)
    } else {
        mapping.to_local(kind, source_id)
    };
    translated.cloned().unwrap_or_else(|| source_id.clone())
}

fn source_id_for(target_id: &ItemId, mapping: &MappingSnapshot, to_server: bool) -> ItemId {
    if target_id.is_root() {
        return ItemId::root();
    }
    let translated = if to_server {
        mapping.to_local(ItemKind::Folder, target_id)
    } else {
        mapping.to_server(ItemKind::Folder, target_id)
    };
    translated.cloned().unwrap_or_else(|| target_id.clone())
}
