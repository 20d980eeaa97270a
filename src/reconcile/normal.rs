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

//! The normal-sync reconciler (§4.3): local wins on content conflicts,
//! REMOVE is never applied, and concurrent folder moves that would form a
//! cycle are detected and compensated.

use tracing::debug;

use crate::action::Action;
use crate::action::ActionKind;
use crate::action::Diff;
use crate::action::Plan;
use crate::error::SyncError;
use crate::item::Item;
use crate::item::ItemId;
use crate::item::ItemKind;
use crate::mapping::MappingSnapshot;
use crate::mapping::NewMapping;
use crate::reconcile::Reconciliation;
use crate::reconcile::StaleMapping;
use crate::reconcile::is_hierarchy_reversal;
use crate::reconcile::pair_subtree;
use crate::tree::Tree;

pub fn reconcile_normal(
    local_diff: &Diff,
    server_diff: &Diff,
    mapping: &MappingSnapshot,
    local_tree: &Tree,
    server_tree: &Tree,
) -> Result<Reconciliation, SyncError> {
    let server_pass = build_pass(&PassParams {
        mirror_diff: local_diff,
        opposite_diff: server_diff,
        mirror_is_local: true,
        mapping,
        local_tree,
        server_tree,
    })?;
    let local_pass = build_pass(&PassParams {
        mirror_diff: server_diff,
        opposite_diff: local_diff,
        mirror_is_local: false,
        mapping,
        local_tree,
        server_tree,
    })?;

    // Mapping-aware commit (§4.3): Move and Reorder are exempted because
    // their payloads were already placed in the destination coordinate
    // system by `build_pass`.
    let server_plan = server_pass
        .plan
        .map(mapping, true, |a| a.kind != ActionKind::Move && a.kind != ActionKind::Reorder);
    let local_plan = local_pass
        .plan
        .map(mapping, false, |a| a.kind != ActionKind::Move && a.kind != ActionKind::Reorder);

    let mut new_mappings = server_pass.new_mappings;
    new_mappings.extend(local_pass.new_mappings);
    crate::reconcile::dedup_mappings(&mut new_mappings);

    let mut stale_mappings = server_pass.stale_mappings;
    stale_mappings.extend(local_pass.stale_mappings);

    Ok(Reconciliation {
        local_plan,
        server_plan,
        new_mappings,
        stale_mappings,
    })
}

pub(crate) struct PassParams<'a> {
    pub mirror_diff: &'a Diff,
    pub opposite_diff: &'a Diff,
    /// `true` when `mirror_diff` is the local diff (building `serverPlan`).
    pub mirror_is_local: bool,
    pub mapping: &'a MappingSnapshot,
    pub local_tree: &'a Tree,
    pub server_tree: &'a Tree,
}

pub(crate) struct PassOutput {
    pub plan: Plan,
    pub new_mappings: Vec<NewMapping>,
    pub stale_mappings: Vec<StaleMapping>,
}

/// Builds one direction of reconciliation: mirrors `mirror_diff`'s actions
/// into a plan for the opposite side, checking each against `opposite_diff`
/// for a conflict. Called twice with the two diffs and directions swapped.
pub(crate) fn build_pass(p: &PassParams<'_>) -> Result<PassOutput, SyncError> {
    let mut plan = Plan::new();
    let mut new_mappings = Vec::new();
    let mut stale_mappings = Vec::new();

    for action in p.mirror_diff.actions() {
        match action.kind {
            ActionKind::Create => {
                if let Some(pairing) = match_concurrent_create(action, p) {
                    debug!(id = %action.payload.id(), "reconcile: concurrent create");
                    new_mappings.extend(pairing);
                    continue;
                }
                plan.commit(action.clone());
            }
            ActionKind::Update => {
                if !p.mirror_is_local && has_conflicting_update(action, p.opposite_diff, p.mapping) {
                    debug!(id = %action.payload.id(), "reconcile: dropping server update (local wins)");
                    continue;
                }
                plan.commit(action.clone());
            }
            ActionKind::Move if action.payload.kind() == ItemKind::Folder => {
                if let Some(conflict) = find_conflicting_move(action, p, &mut stale_mappings) {
                    if p.mirror_is_local {
                        if !already_compensated(&plan, p.mirror_diff, conflict, p.mapping) {
                            let compensation = build_compensation(conflict, p.mapping);
                            if compensation_creates_cycle(&compensation, p.server_tree) {
                                return Err(SyncError::HierarchyReversalUnresolvable {
                                    first: action.payload.id().clone(),
                                    second: conflict.payload.id().clone(),
                                });
                            }
                            debug!(
                                moved = %action.payload.id(),
                                reverted = %conflict.payload.id(),
                                "reconcile: hierarchy reversal, compensating"
                            );
                            plan.commit(compensation);
                        }
                        plan.commit(action.translate_ids(p.mapping, true));
                    } else {
                        debug!(
                            moved = %action.payload.id(),
                            reverted_by = %conflict.payload.id(),
                            "reconcile: hierarchy reversal, dropping server move (local wins)"
                        );
                    }
                    continue;
                }
                plan.commit(action.translate_ids(p.mapping, p.mirror_is_local));
            }
            ActionKind::Move => {
                plan.commit(action.translate_ids(p.mapping, p.mirror_is_local));
            }
            ActionKind::Remove => {
                // Never applied in normal-sync mode (§4.3).
            }
            ActionKind::Reorder => {
                // Handled by the reorder reconciler (§4.5).
            }
        }
    }

    Ok(PassOutput { plan, new_mappings, stale_mappings })
}

fn parent_in_opposite_coords(action: &Action, p: &PassParams<'_>) -> Option<ItemId> {
    let parent = action.payload.parent_id()?;
    if parent.is_root() {
        return Some(ItemId::root());
    }
    if p.mirror_is_local {
        p.mapping.to_server(ItemKind::Folder, parent).cloned()
    } else {
        p.mapping.to_local(ItemKind::Folder, parent).cloned()
    }
}

fn match_concurrent_create(action: &Action, p: &PassParams<'_>) -> Option<Vec<NewMapping>> {
    let target_parent = parent_in_opposite_coords(action, p)?;
    let candidate = p.opposite_diff.actions_of_kind(ActionKind::Create).find(|other| {
        other.payload.parent_id() == Some(&target_parent) && other.payload.can_merge_with(&action.payload)
    })?;

    let (local_item, server_item): (Item, Item) = if p.mirror_is_local {
        (action.payload.clone(), candidate.payload.clone())
    } else {
        (candidate.payload.clone(), action.payload.clone())
    };

    let mut mappings = vec![NewMapping {
        kind: local_item.kind(),
        local_id: local_item.id().clone(),
        server_id: server_item.id().clone(),
    }];
    if local_item.kind() == ItemKind::Folder {
        let pairs = pair_subtree(p.local_tree, local_item.id(), p.server_tree, server_item.id());
        for (local, server) in pairs.into_iter().skip(1) {
            mappings.push(NewMapping {
                kind: local.kind(),
                local_id: local.id().clone(),
                server_id: server.id().clone(),
            });
        }
    }
    Some(mappings)
}

fn has_conflicting_update(action: &Action, local_diff: &Diff, mapping: &MappingSnapshot) -> bool {
    let kind = action.payload.kind();
    let Some(local_id) = mapping.to_local(kind, action.payload.id()) else {
        return false;
    };
    local_diff
        .actions_of_kind(ActionKind::Update)
        .any(|a| a.payload.id() == local_id)
}

fn find_conflicting_move<'d>(action: &Action, p: &PassParams<'d>, stale: &mut Vec<StaleMapping>) -> Option<&'d Action> {
    p.opposite_diff.actions_of_kind(ActionKind::Move).find(|other| {
        let (local_move, server_move) = if p.mirror_is_local { (action, *other) } else { (*other, action) };
        is_hierarchy_reversal(p.local_tree, p.server_tree, p.mapping, local_move, server_move, stale)
    })
}

/// Would committing `compensation` (a Move) place its item under its own
/// descendant in `tree`'s current shape? That is the one way reverting a
/// hierarchy reversal can itself be unresolvable (§7 `HierarchyReversalUnresolvable`).
fn compensation_creates_cycle(compensation: &Action, tree: &Tree) -> bool {
    let Some(new_parent) = compensation.payload.parent_id() else {
        return false;
    };
    tree.is_descendant_or_self(new_parent, compensation.payload.id())
}

/// `conflict` is always a server Move (the action being reverted); its
/// payload/old_item are in server coordinates already.
fn build_compensation(conflict: &Action, mapping: &MappingSnapshot) -> Action {
    let payload = conflict
        .old_item
        .clone()
        .expect("a Move action always carries old_item");
    let mut old_item = conflict.payload.clone();
    crate::action::translate_item(&mut old_item, mapping, false);
    Action {
        kind: ActionKind::Move,
        payload,
        old_item: Some(old_item),
        order: None,
        index: None,
        old_index: None,
    }
}

fn already_compensated(plan: &Plan, local_diff: &Diff, conflict: &Action, mapping: &MappingSnapshot) -> bool {
    if plan.find_move(conflict.payload.id()).is_some() {
        return true;
    }
    mapping
        .to_local(conflict.payload.kind(), conflict.payload.id())
        .is_some_and(|local_id| local_diff.find_move(local_id).is_some())
}
