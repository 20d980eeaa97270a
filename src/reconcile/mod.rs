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

//! Turns two [`Diff`](crate::action::Diff)s into two [`Plan`](crate::action::Plan)s.
//!
//! [`normal`] implements §4.3, [`merge`] implements §4.4 on top of it, and
//! [`reorder`] implements §4.5 as a post-processing pass over both.

pub mod merge;
pub mod normal;
pub mod reorder;

use std::collections::HashSet;

use itertools::Itertools;

use crate::action::Action;
use crate::item::Item;
use crate::item::ItemId;
use crate::item::ItemKind;
use crate::mapping::MappingSnapshot;
use crate::tree::Tree;

pub use merge::reconcile_first_sync;
pub use normal::reconcile_normal;
pub use reorder::reconcile_reorder;

/// Drops repeat `(kind, local_id, server_id)` entries, keeping the first
/// occurrence. The same pairing is often rediscovered more than once in one
/// reconciliation: once per direction of `build_pass`, and again through a
/// folder's subtree recursion in `match_concurrent_create` for each of its
/// children's own top-level Create action.
pub(crate) fn dedup_mappings(mappings: &mut Vec<crate::mapping::NewMapping>) {
    let deduped = std::mem::take(mappings)
        .into_iter()
        .unique_by(|m| (m.kind, m.local_id.clone(), m.server_id.clone()))
        .collect();
    *mappings = deduped;
}

/// The outcome of reconciliation: two plans plus the pairings discovered
/// along the way, queued for the caller to persist (§3 Lifecycle point (i)).
#[derive(Debug, Default)]
pub struct Reconciliation {
    pub local_plan: crate::action::Plan,
    pub server_plan: crate::action::Plan,
    pub new_mappings: Vec<crate::mapping::NewMapping>,
    pub stale_mappings: Vec<StaleMapping>,
}

/// A mapping entry discovered to point at an id no longer present in its
/// target tree (§7 `InconsistentMapping`). Recoverable: the caller drops the
/// entry and continues, rather than treating it as a match in the hierarchy-
/// reversal check that found it.
#[derive(Debug, Clone)]
pub struct StaleMapping {
    pub side: crate::mapping::Side,
    pub kind: ItemKind,
    pub id: ItemId,
}

/// Records a stale mapping once, for the id on the side that no longer has
/// it (`side`/`id` name the *target* of the translation that came up empty).
fn note_stale_mapping(stale: &mut Vec<StaleMapping>, side: crate::mapping::Side, kind: ItemKind, id: &ItemId) {
    if !stale.iter().any(|s| s.side == side && s.kind == kind && s.id == *id) {
        stale.push(StaleMapping { side, kind, id: id.clone() });
    }
}

/// Recursively pairs a subtree rooted at `a_id`/`b_id` by `can_merge_with`,
/// starting with the unconditional root pairing (§4.4: "pairings for the two
/// roots themselves are recorded unconditionally"). Used both by the
/// first-sync pre-pass and by normal-sync's CREATE/CREATE sub-scan.
pub(crate) fn pair_subtree(a: &Tree, a_id: &ItemId, b: &Tree, b_id: &ItemId) -> Vec<(Item, Item)> {
    let mut pairs = Vec::new();
    let Some(a_item) = a.find_item(a_id) else {
        return pairs;
    };
    let Some(b_item) = b.find_item(b_id) else {
        return pairs;
    };
    pairs.push((a_item, b_item));
    if !a.is_folder(a_id) || !b.is_folder(b_id) {
        return pairs;
    }

    let a_children = a.children(a_id).to_vec();
    let mut used: HashSet<ItemId> = HashSet::new();
    for b_child in b.children(b_id) {
        let b_item = b.find_item(b_child).expect("listed as a child");
        let found = a_children.iter().find(|id| {
            !used.contains(*id) && {
                let a_item = a.find_item(id).expect("listed as a child");
                a_item.kind() == b_item.kind() && a_item.can_merge_with(&b_item)
            }
        });
        let Some(a_child) = found else { continue };
        used.insert(a_child.clone());
        pairs.extend(pair_subtree(a, a_child, b, b_child));
    }
    pairs
}

/// §4.3's hierarchy-reversal test: would applying `local_move` and
/// `server_move` jointly create a cycle?
///
/// Mapping lookups that resolve but point at an id absent from the target
/// tree (§7 `InconsistentMapping`) are recorded in `stale` and treated as a
/// non-match rather than silently ignored.
pub(crate) fn is_hierarchy_reversal(
    local_tree: &Tree,
    server_tree: &Tree,
    mapping: &MappingSnapshot,
    local_move: &Action,
    server_move: &Action,
    stale: &mut Vec<StaleMapping>,
) -> bool {
    if local_move.payload.kind() != ItemKind::Folder || server_move.payload.kind() != ItemKind::Folder {
        return false;
    }
    let (Some(p_l), Some(l_id)) = (local_move.payload.parent_id(), Some(local_move.payload.id())) else {
        return false;
    };
    let (Some(p_s), Some(s_id)) = (server_move.payload.parent_id(), Some(server_move.payload.id())) else {
        return false;
    };

    let local_chain = std::iter::once(p_l.clone()).chain(local_tree.ancestors(p_l));
    let cond_a = local_chain.into_iter().any(|ancestor| {
        let Some(mapped) = mapping.to_server(ItemKind::Folder, &ancestor) else {
            return false;
        };
        if !server_tree.contains(mapped) {
            note_stale_mapping(stale, crate::mapping::Side::Local, ItemKind::Folder, &ancestor);
            return false;
        }
        server_tree.is_descendant_or_self(mapped, s_id)
    });
    if !cond_a {
        return false;
    }

    let server_chain = std::iter::once(p_s.clone()).chain(server_tree.ancestors(p_s));
    server_chain.into_iter().any(|ancestor| {
        let Some(mapped) = mapping.to_local(ItemKind::Folder, &ancestor) else {
            return false;
        };
        if !local_tree.contains(mapped) {
            note_stale_mapping(stale, crate::mapping::Side::Server, ItemKind::Folder, &ancestor);
            return false;
        }
        local_tree.is_descendant_or_self(mapped, l_id)
    })
}
