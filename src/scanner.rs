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

//! The two-tree differ (§4.1). Produces a [`Diff`] that, applied in order to
//! a copy of `old`, yields a tree structurally equal to `new`.

use std::collections::HashSet;

use tracing::trace;

use crate::action::Action;
use crate::action::Diff;
use crate::error::SyncError;
use crate::item::Item;
use crate::item::ItemId;
use crate::item::ItemKind;
use crate::tree::Tree;

/// `mergeFn(old, new)` from §4.1: decides whether two items not related by
/// id should be treated as the same node. Normal-sync scans always pass a
/// predicate that returns `false`; first-sync merge scans pass
/// [`Item::can_merge_with`].
pub type MergeFn<'a> = dyn Fn(&Item, &Item) -> bool + 'a;

#[derive(Clone, Copy, Debug, Default)]
pub struct ScanOptions {
    pub preserve_order: bool,
    pub check_hashes: bool,
}

pub struct ScanResult {
    pub diff: Diff,
    /// Pairs discovered by `merge_fn` rather than by id — candidate
    /// mappings, per §4.4. Empty whenever `merge_fn` never returns `true`.
    pub merged_pairs: Vec<(Item, Item)>,
}

struct Scan<'a> {
    old: &'a Tree,
    new: &'a Tree,
    merge_fn: &'a MergeFn<'a>,
    options: ScanOptions,
    only_old: HashSet<ItemId>,
    only_new: HashSet<ItemId>,
    diff: Diff,
    merged_pairs: Vec<(Item, Item)>,
}

/// Computes the actions that transform `old` into `new`.
pub fn scan(old: &Tree, new: &Tree, merge_fn: &MergeFn<'_>, options: ScanOptions) -> Result<ScanResult, SyncError> {
    old.check_consistency()?;
    new.check_consistency()?;

    let old_ids: HashSet<ItemId> = old.ids().filter(|id| !id.is_root()).cloned().collect();
    let new_ids: HashSet<ItemId> = new.ids().filter(|id| !id.is_root()).cloned().collect();

    let mut scan = Scan {
        old,
        new,
        merge_fn,
        options,
        only_old: old_ids.difference(&new_ids).cloned().collect(),
        only_new: new_ids.difference(&old_ids).cloned().collect(),
        diff: Diff::new(),
        merged_pairs: Vec::new(),
    };

    // Matched-by-id items: same id present on both sides, possibly under a
    // different parent (a Move) and/or with different content (an Update).
    // This is scored globally rather than per-folder since a Move is, by
    // definition, a change of which folder an id lives under.
    let matched: Vec<ItemId> = old_ids.intersection(&new_ids).cloned().collect();
    for id in &matched {
        scan.emit_matched(id)?;
    }

    // Heuristic pairing and reorder detection are scoped to folder pairs,
    // walked top-down starting at the two roots (paired by convention).
    scan.walk_folder_pair(old.root_id().clone(), new.root_id().clone())?;

    scan.emit_creates();
    scan.emit_removes();

    Ok(ScanResult {
        diff: scan.diff,
        merged_pairs: scan.merged_pairs,
    })
}

impl<'a> Scan<'a> {
    fn emit_matched(&mut self, id: &ItemId) -> Result<(), SyncError> {
        let old_item = self.old.find_item(id).ok_or_else(|| SyncError::InconsistentTree {
            reason: format!("{id} vanished from the old tree mid-scan"),
        })?;
        let new_item = self.new.find_item(id).ok_or_else(|| SyncError::InconsistentTree {
            reason: format!("{id} vanished from the new tree mid-scan"),
        })?;
        if old_item.kind() != new_item.kind() {
            // A bookmark was replaced by a folder (or vice versa) under the
            // same id: not one of the listed cases, treated as a swap.
            self.diff.commit(Action::remove(old_item.clone_item(false)));
            self.diff.commit(Action::create(new_item.clone_item(false)));
            return Ok(());
        }
        let moved = old_item.parent_id() != new_item.parent_id();
        let changed = old_item.content_differs(&new_item);
        if moved {
            trace!(%id, "scan: move");
            self.diff
                .commit(Action::move_to(new_item.clone_item(false), old_item.clone_item(false)));
        }
        if changed {
            trace!(%id, "scan: update");
            self.diff
                .commit(Action::update(new_item.clone_item(false), old_item.clone_item(false)));
        }
        Ok(())
    }

    fn walk_folder_pair(&mut self, old_folder_id: ItemId, new_folder_id: ItemId) -> Result<(), SyncError> {
        if self.options.check_hashes {
            if let (Some(oh), Some(nh)) = (self.old.hash(&old_folder_id), self.new.hash(&new_folder_id)) {
                if oh == nh {
                    return Ok(());
                }
            }
        }

        let old_children: Vec<ItemId> = self.old.children(&old_folder_id).to_vec();
        let new_children: Vec<ItemId> = self.new.children(&new_folder_id).to_vec();

        // Heuristic pairing among this folder's not-yet-consumed,
        // not-matched-by-id children (§4.1's "only-in-new"/"only-in-old").
        let old_pool: Vec<ItemId> = old_children
            .iter()
            .filter(|id| self.only_old.contains(*id))
            .cloned()
            .collect();
        let mut recurse_pairs = Vec::new();
        let new_pool: Vec<ItemId> = new_children
            .iter()
            .filter(|id| self.only_new.contains(*id))
            .cloned()
            .collect();
        for new_id in new_pool.iter() {
            let new_item = self.new.find_item(new_id).expect("listed as a child");
            let Some(old_id) = old_pool.iter().find(|old_id| {
                self.only_old.contains(*old_id) && {
                    let old_item = self.old.find_item(old_id).expect("listed as a child");
                    old_item.kind() == new_item.kind() && (self.merge_fn)(&old_item, &new_item)
                }
            }) else {
                continue;
            };
            let old_item = self.old.find_item(old_id).expect("listed as a child");
            trace!(old = %old_id, new = %new_id, "scan: heuristic pair");
            self.only_old.remove(old_id);
            self.only_new.remove(new_id);
            if new_item.kind() == ItemKind::Folder {
                recurse_pairs.push((old_id.clone(), new_id.clone()));
            }
            self.merged_pairs.push((old_item, new_item));
        }
        for (old_id, new_id) in recurse_pairs {
            self.walk_folder_pair(old_id, new_id)?;
        }

        // Matched-by-id folder children: continue the walk so nested
        // heuristic pairs and reorders are still found.
        let matched_folder_children: Vec<ItemId> = old_children
            .iter()
            .filter(|id| new_children.contains(id) && self.old.is_folder(id))
            .cloned()
            .collect();
        for id in matched_folder_children {
            self.walk_folder_pair(id.clone(), id)?;
        }

        if self.options.preserve_order && old_folder_id == new_folder_id {
            self.maybe_emit_reorder(&old_folder_id, &old_children, &new_children);
        }
        Ok(())
    }

    fn maybe_emit_reorder(&mut self, folder_id: &ItemId, old_children: &[ItemId], new_children: &[ItemId]) {
        let old_ids: HashSet<&ItemId> = old_children.iter().collect();
        let new_ids: HashSet<&ItemId> = new_children.iter().collect();
        let common_old: Vec<&ItemId> = old_children.iter().filter(|id| new_ids.contains(id)).collect();
        let common_new: Vec<&ItemId> = new_children.iter().filter(|id| old_ids.contains(id)).collect();
        if common_old == common_new {
            return;
        }
        let folder = match self.new.find_folder(folder_id) {
            Some(f) => f,
            None => return,
        };
        let order = new_children
            .iter()
            .map(|id| {
                let kind = if self.new.is_folder(id) {
                    ItemKind::Folder
                } else {
                    ItemKind::Bookmark
                };
                (kind, id.clone())
            })
            .collect();
        trace!(%folder_id, "scan: reorder");
        self.diff.commit(Action::reorder(Item::Folder(folder), order));
    }

    fn emit_creates(&mut self) {
        let mut remaining: Vec<ItemId> = self.only_new.iter().cloned().collect();
        remaining.sort_by_key(|id| self.new.ancestors(id).len());
        for id in remaining {
            if let Some(item) = self.new.find_item(&id) {
                trace!(%id, "scan: create");
                self.diff.commit(Action::create(item.clone_item(false)));
            }
        }
    }

    fn emit_removes(&mut self) {
        let mut remaining: Vec<ItemId> = self.only_old.iter().cloned().collect();
        remaining.sort_by_key(|id| std::cmp::Reverse(self.old.ancestors(id).len()));
        for id in remaining {
            if let Some(item) = self.old.find_item(&id) {
                trace!(%id, "scan: remove");
                self.diff.commit(Action::remove(item.clone_item(false)));
            }
        }
    }
}

/// `mergeFn` used for normal-sync scans: ids are stable within a side, so
/// two items not related by id are never the same node.
pub fn never_merge(_old: &Item, _new: &Item) -> bool {
    false
}
