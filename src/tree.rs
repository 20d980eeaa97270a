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

//! A mutable, one-sided bookmark tree plus its id index.
//!
//! Nodes are stored flat, keyed by id, rather than as an owning recursive
//! structure: a folder's children are just a `Vec<ItemId>`, so the id map
//! itself *is* the index referenced by §3 and §9 of the design, and the
//! "non-owning handles" the design notes call for fall out for free.

use std::collections::HashMap;

use crate::error::SyncError;
use crate::item::BookmarkItem;
use crate::item::FolderItem;
use crate::item::Item;
use crate::item::ItemId;
use crate::item::ItemKind;

#[derive(Clone, Debug)]
enum Node {
    Folder {
        parent_id: Option<ItemId>,
        title: String,
        children: Vec<ItemId>,
        hash: Option<String>,
        loaded: bool,
    },
    Bookmark {
        parent_id: ItemId,
        title: String,
        url: String,
    },
}

impl Node {
    fn parent_id(&self) -> Option<&ItemId> {
        match self {
            Node::Folder { parent_id, .. } => parent_id.as_ref(),
            Node::Bookmark { parent_id, .. } => Some(parent_id),
        }
    }

    fn title(&self) -> &str {
        match self {
            Node::Folder { title, .. } => title,
            Node::Bookmark { title, .. } => title,
        }
    }

    fn kind(&self) -> ItemKind {
        match self {
            Node::Folder { .. } => ItemKind::Folder,
            Node::Bookmark { .. } => ItemKind::Bookmark,
        }
    }
}

/// One side's bookmark tree: a local tree or a server tree. Acyclic, with a
/// single sentinel root (see the invariants in §3).
#[derive(Clone, Debug)]
pub struct Tree {
    nodes: HashMap<ItemId, Node>,
    root_id: ItemId,
}

impl Tree {
    /// A fresh tree containing only the root folder.
    pub fn empty() -> Self {
        let root_id = ItemId::root();
        let mut nodes = HashMap::new();
        nodes.insert(
            root_id.clone(),
            Node::Folder {
                parent_id: None,
                title: String::new(),
                children: Vec::new(),
                hash: None,
                loaded: true,
            },
        );
        Self { nodes, root_id }
    }

    pub fn root_id(&self) -> &ItemId {
        &self.root_id
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn is_folder(&self, id: &ItemId) -> bool {
        matches!(self.nodes.get(id), Some(Node::Folder { .. }))
    }

    pub fn parent_id(&self, id: &ItemId) -> Option<&ItemId> {
        self.nodes.get(id).and_then(Node::parent_id)
    }

    /// Children of a folder, in order. Empty for an unknown id or a
    /// bookmark.
    pub fn children(&self, id: &ItemId) -> &[ItemId] {
        match self.nodes.get(id) {
            Some(Node::Folder { children, .. }) => children,
            _ => &[],
        }
    }

    pub fn loaded(&self, id: &ItemId) -> bool {
        matches!(self.nodes.get(id), Some(Node::Folder { loaded, .. } ) if *loaded)
            || !self.is_folder(id)
    }

    pub fn hash(&self, id: &ItemId) -> Option<&str> {
        match self.nodes.get(id) {
            Some(Node::Folder { hash, .. }) => hash.as_deref(),
            _ => None,
        }
    }

    /// A detached snapshot of the node's own fields (no children).
    pub fn find_item(&self, id: &ItemId) -> Option<Item> {
        let node = self.nodes.get(id)?;
        Some(match node {
            Node::Folder {
                parent_id,
                title,
                hash,
                ..
            } => Item::Folder(FolderItem {
                id: id.clone(),
                parent_id: parent_id.clone(),
                title: title.clone(),
                hash: hash.clone(),
            }),
            Node::Bookmark {
                parent_id,
                title,
                url,
            } => Item::Bookmark(BookmarkItem {
                id: id.clone(),
                parent_id: parent_id.clone(),
                title: title.clone(),
                url: url.clone(),
            }),
        })
    }

    pub fn find_folder(&self, id: &ItemId) -> Option<FolderItem> {
        match self.find_item(id)? {
            Item::Folder(f) => Some(f),
            Item::Bookmark(_) => None,
        }
    }

    /// Recursive count of descendants under `id` (not counting `id` itself).
    pub fn count(&self, id: &ItemId) -> usize {
        self.children(id)
            .iter()
            .map(|child| 1 + self.count(child))
            .sum()
    }

    /// `id`'s ancestors, nearest first, not including `id` itself or the
    /// root's non-existent parent.
    pub fn ancestors(&self, id: &ItemId) -> Vec<ItemId> {
        let mut out = Vec::new();
        let mut current = self.parent_id(id).cloned();
        while let Some(p) = current {
            current = self.parent_id(&p).cloned();
            out.push(p);
        }
        out
    }

    /// True iff `maybe_descendant` is `ancestor` itself or a descendant of
    /// it.
    pub fn is_descendant_or_self(&self, maybe_descendant: &ItemId, ancestor: &ItemId) -> bool {
        if maybe_descendant == ancestor {
            return true;
        }
        let mut current = self.parent_id(maybe_descendant).cloned();
        while let Some(p) = current {
            if &p == ancestor {
                return true;
            }
            current = self.parent_id(&p).cloned();
        }
        false
    }

    /// Validates the invariants in §3: acyclic, parent pointers agree with
    /// the folder they're listed under, every id unique (guaranteed by the
    /// map itself).
    pub fn check_consistency(&self) -> Result<(), SyncError> {
        for (id, node) in &self.nodes {
            if let Some(parent_id) = node.parent_id() {
                let parent_children = self.children(parent_id);
                if !parent_children.contains(id) {
                    return Err(SyncError::InconsistentTree {
                        reason: format!(
                            "{id} claims parent {parent_id} but isn't listed among its children"
                        ),
                    });
                }
            } else if id != &self.root_id {
                return Err(SyncError::InconsistentTree {
                    reason: format!("{id} has no parent but isn't the root"),
                });
            }
        }
        // Acyclicity: every node must reach the root in a bounded number of
        // hops.
        for id in self.nodes.keys() {
            let mut current = id.clone();
            let mut hops = 0;
            while current != self.root_id {
                let Some(parent) = self.parent_id(&current).cloned() else {
                    return Err(SyncError::InconsistentTree {
                        reason: format!("{current} has no path to the root"),
                    });
                };
                current = parent;
                hops += 1;
                if hops > self.nodes.len() {
                    return Err(SyncError::InconsistentTree {
                        reason: format!("cycle detected reaching {id}"),
                    });
                }
            }
        }
        Ok(())
    }

    // -- mutation: mirrors the tree-provider contract in §6, used by the
    // in-memory adapter and to apply plans in tests/the demo binary.

    pub fn create_folder(&mut self, id: ItemId, parent_id: ItemId, title: String) {
        self.link(&parent_id, id.clone());
        self.nodes.insert(
            id,
            Node::Folder {
                parent_id: Some(parent_id),
                title,
                children: Vec::new(),
                hash: None,
                loaded: true,
            },
        );
    }

    pub fn create_bookmark(&mut self, id: ItemId, parent_id: ItemId, title: String, url: String) {
        self.link(&parent_id, id.clone());
        self.nodes.insert(
            id,
            Node::Bookmark {
                parent_id,
                title,
                url,
            },
        );
    }

    pub fn update_folder(&mut self, id: &ItemId, title: String) {
        if let Some(Node::Folder { title: t, .. }) = self.nodes.get_mut(id) {
            *t = title;
        }
    }

    pub fn update_bookmark(&mut self, id: &ItemId, title: String, url: String) {
        if let Some(Node::Bookmark { title: t, url: u, .. }) = self.nodes.get_mut(id) {
            *t = title;
            *u = url;
        }
    }

    pub fn move_item(&mut self, id: &ItemId, new_parent_id: ItemId) {
        if let Some(old_parent) = self.parent_id(id).cloned() {
            self.unlink(&old_parent, id);
        }
        self.link(&new_parent_id, id.clone());
        match self.nodes.get_mut(id) {
            Some(Node::Folder { parent_id, .. }) => *parent_id = Some(new_parent_id),
            Some(Node::Bookmark { parent_id, .. }) => *parent_id = new_parent_id,
            None => {}
        }
    }

    pub fn remove(&mut self, id: &ItemId) {
        let children = self.children(id).to_vec();
        for child in children {
            self.remove(&child);
        }
        if let Some(parent_id) = self.parent_id(id).cloned() {
            self.unlink(&parent_id, id);
        }
        self.nodes.remove(id);
    }

    pub fn reorder_children(&mut self, folder_id: &ItemId, order: &[ItemId]) {
        if let Some(Node::Folder { children, .. }) = self.nodes.get_mut(folder_id) {
            let mut new_children = Vec::with_capacity(children.len());
            for id in order {
                if children.contains(id) {
                    new_children.push(id.clone());
                }
            }
            for id in children.iter() {
                if !new_children.contains(id) {
                    new_children.push(id.clone());
                }
            }
            *children = new_children;
        }
    }

    pub fn set_loaded(&mut self, id: &ItemId, loaded: bool) {
        if let Some(Node::Folder { loaded: l, .. }) = self.nodes.get_mut(id) {
            *l = loaded;
        }
    }

    pub fn set_hash(&mut self, id: &ItemId, hash: Option<String>) {
        if let Some(Node::Folder { hash: h, .. }) = self.nodes.get_mut(id) {
            *h = hash;
        }
    }

    fn link(&mut self, parent_id: &ItemId, child_id: ItemId) {
        if let Some(Node::Folder { children, .. }) = self.nodes.get_mut(parent_id) {
            if !children.contains(&child_id) {
                children.push(child_id);
            }
        }
    }

    fn unlink(&mut self, parent_id: &ItemId, child_id: &ItemId) {
        if let Some(Node::Folder { children, .. }) = self.nodes.get_mut(parent_id) {
            children.retain(|c| c != child_id);
        }
    }

    /// All ids currently present, in unspecified order.
    pub fn ids(&self) -> impl Iterator<Item = &ItemId> {
        self.nodes.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_tree_has_only_root() {
        let tree = Tree::empty();
        assert_eq!(tree.children(&ItemId::root()), &[] as &[ItemId]);
        assert!(tree.is_folder(&ItemId::root()));
        tree.check_consistency().unwrap();
    }

    #[test]
    fn create_and_move() {
        let mut tree = Tree::empty();
        tree.create_folder(ItemId::from("f1"), ItemId::root(), "Folder 1".into());
        tree.create_bookmark(
            ItemId::from("b1"),
            ItemId::from("f1"),
            "Example".into(),
            "https://example.com".into(),
        );
        assert_eq!(tree.children(&ItemId::from("f1")), &[ItemId::from("b1")]);
        tree.check_consistency().unwrap();

        tree.move_item(&ItemId::from("b1"), ItemId::root());
        assert_eq!(tree.children(&ItemId::from("f1")), &[] as &[ItemId]);
        assert_eq!(tree.children(&ItemId::root()), &[ItemId::from("b1")]);
        tree.check_consistency().unwrap();
    }

    #[test]
    fn remove_recursively_removes_descendants() {
        let mut tree = Tree::empty();
        tree.create_folder(ItemId::from("f1"), ItemId::root(), "Folder 1".into());
        tree.create_bookmark(
            ItemId::from("b1"),
            ItemId::from("f1"),
            "Example".into(),
            "https://example.com".into(),
        );
        tree.remove(&ItemId::from("f1"));
        assert!(!tree.contains(&ItemId::from("f1")));
        assert!(!tree.contains(&ItemId::from("b1")));
    }

    #[test]
    fn ancestors_walks_to_root() {
        let mut tree = Tree::empty();
        tree.create_folder(ItemId::from("f1"), ItemId::root(), "F1".into());
        tree.create_folder(ItemId::from("f2"), ItemId::from("f1"), "F2".into());
        assert_eq!(
            tree.ancestors(&ItemId::from("f2")),
            vec![ItemId::from("f1"), ItemId::root()]
        );
        assert!(tree.is_descendant_or_self(&ItemId::from("f2"), &ItemId::from("f1")));
        assert!(!tree.is_descendant_or_self(&ItemId::from("f1"), &ItemId::from("f2")));
    }
}
