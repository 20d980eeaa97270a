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

//! The action algebra: [`Action`], the append-only [`Diff`] log, and the
//! `map` operation that rewrites a diff's identifiers through a mapping
//! direction to turn it into a [`Plan`].

use crate::item::Item;
use crate::item::ItemId;
use crate::item::ItemKind;
use crate::mapping::MappingSnapshot;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Create,
    Update,
    Move,
    Remove,
    Reorder,
}

/// One structural edit. `payload` is always the post-state; `old_item` is
/// populated for `Move` and `Update` and carries the pre-state under the
/// same id. `order` is populated only for `Reorder`, where `payload` is the
/// parent folder itself.
#[derive(Clone, Debug)]
pub struct Action {
    pub kind: ActionKind,
    pub payload: Item,
    pub old_item: Option<Item>,
    /// Desired child order, `Reorder` only.
    pub order: Option<Vec<(ItemKind, ItemId)>>,
    /// Position hint for `Create`/`Move`, when the source side tracked one.
    pub index: Option<usize>,
    pub old_index: Option<usize>,
}

impl Action {
    pub fn create(payload: Item) -> Self {
        Self {
            kind: ActionKind::Create,
            payload,
            old_item: None,
            order: None,
            index: None,
            old_index: None,
        }
    }

    pub fn update(payload: Item, old_item: Item) -> Self {
        Self {
            kind: ActionKind::Update,
            payload,
            old_item: Some(old_item),
            order: None,
            index: None,
            old_index: None,
        }
    }

    pub fn move_to(payload: Item, old_item: Item) -> Self {
        Self {
            kind: ActionKind::Move,
            payload,
            old_item: Some(old_item),
            order: None,
            index: None,
            old_index: None,
        }
    }

    pub fn remove(payload: Item) -> Self {
        Self {
            kind: ActionKind::Remove,
            payload,
            old_item: None,
            order: None,
            index: None,
            old_index: None,
        }
    }

    pub fn reorder(parent: Item, order: Vec<(ItemKind, ItemId)>) -> Self {
        Self {
            kind: ActionKind::Reorder,
            payload: parent,
            old_item: None,
            order: Some(order),
            index: None,
            old_index: None,
        }
    }

    /// Rewrites every id this action carries (`payload.id`, `payload.parent_id`,
    /// and the same on `old_item`/`order`) through `mapping`, in the
    /// direction selected by `to_server`. Ids with no entry in the mapping
    /// are left unchanged, per §4.2: they are treated as newly created on
    /// the opposite side and the downstream plan executor is expected to
    /// resolve them from the results of earlier actions in the same plan.
    pub(crate) fn translate_ids(&self, mapping: &MappingSnapshot, to_server: bool) -> Self {
        let mut out = self.clone();
        translate_item(&mut out.payload, mapping, to_server);
        if let Some(old) = &mut out.old_item {
            translate_item(old, mapping, to_server);
        }
        if let Some(order) = &mut out.order {
            for (kind, id) in order.iter_mut() {
                if let Some(mapped) = mapping.translate(*kind, id, to_server) {
                    *id = mapped.clone();
                }
            }
        }
        out
    }
}

pub(crate) fn translate_item(item: &mut Item, mapping: &MappingSnapshot, to_server: bool) {
    let kind = item.kind();
    if let Some(mapped_id) = mapping.translate(kind, item.id(), to_server) {
        let mapped_id = mapped_id.clone();
        item.set_id(mapped_id);
    }
    if let Some(parent_id) = item.parent_id() {
        if let Some(mapped_parent) = mapping.translate(ItemKind::Folder, parent_id, to_server) {
            let mapped_parent = mapped_parent.clone();
            item.set_parent_id(mapped_parent);
        }
    }
}

/// An ordered, append-only log of [`Action`]s. A [`Plan`] is a `Diff` whose
/// payloads have already been translated into the coordinate system of the
/// side it will be applied to.
#[derive(Clone, Debug, Default)]
pub struct Diff {
    actions: Vec<Action>,
}

pub type Plan = Diff;

impl Diff {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commit(&mut self, action: Action) {
        self.actions.push(action);
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn actions_of_kind(&self, kind: ActionKind) -> impl Iterator<Item = &Action> {
        self.actions.iter().filter(move |a| a.kind == kind)
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Finds the Move action, if any, whose payload has the given id
    /// (pre-translation).
    pub fn find_move(&self, id: &ItemId) -> Option<&Action> {
        self.actions_of_kind(ActionKind::Move)
            .find(|a| a.payload.id() == id)
    }

    pub fn find_create(&self, parent_id: &ItemId) -> impl Iterator<Item = &Action> {
        self.actions_of_kind(ActionKind::Create)
            .filter(move |a| a.payload.parent_id() == Some(parent_id))
    }

    /// Returns a new `Diff` where every action passing `filter` has had its
    /// identifiers translated through `mapping` (§4.2). Actions that don't
    /// pass `filter` are carried over unchanged, in their original
    /// coordinate system — used to exempt `Move`/`Reorder` actions that the
    /// reconciler already translated inline (see the `reconcile` module).
    pub fn map(&self, mapping: &MappingSnapshot, to_server: bool, filter: impl Fn(&Action) -> bool) -> Self {
        let actions = self
            .actions
            .iter()
            .map(|a| {
                if filter(a) {
                    a.translate_ids(mapping, to_server)
                } else {
                    a.clone()
                }
            })
            .collect();
        Self { actions }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::BookmarkItem;
    use crate::mapping::InMemoryMappingStore;
    use crate::mapping::MappingStore;
    use crate::mapping::Side;

    #[test]
    fn map_translates_known_ids_and_passes_through_unknown() {
        let store = InMemoryMappingStore::new();
        store.add_mapping(
            Side::Local,
            ItemKind::Bookmark,
            ItemId::from("l1"),
            ItemId::from("s1"),
        );
        let snapshot = store.snapshot();

        let mut diff = Diff::new();
        diff.commit(Action::create(Item::Bookmark(BookmarkItem {
            id: ItemId::from("l1"),
            parent_id: ItemId::root(),
            title: "Example".into(),
            url: "https://example.com".into(),
        })));
        diff.commit(Action::create(Item::Bookmark(BookmarkItem {
            id: ItemId::from("l2"),
            parent_id: ItemId::root(),
            title: "New".into(),
            url: "https://new.example".into(),
        })));

        let mapped = diff.map(&snapshot, true, |_| true);
        assert_eq!(mapped.actions()[0].payload.id(), &ItemId::from("s1"));
        // l2 has no mapping yet: left as-is for the executor to resolve.
        assert_eq!(mapped.actions()[1].payload.id(), &ItemId::from("l2"));
    }
}
