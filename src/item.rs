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

//! The bookmark tree data model: opaque ids, the `Folder`/`Bookmark` item
//! variant, and the mutable `Tree` that adapters build and the core diffs.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// An opaque identifier, unique within one side (local or server). Ids may
/// originate as integers or strings on the adapter side; the core only ever
/// compares them as strings and never parses them (see Open Question 3).
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemId(pub String);

impl ItemId {
    /// The sentinel id of the root folder, by convention `-1`.
    pub fn root() -> Self {
        Self("-1".to_owned())
    }

    pub fn is_root(&self) -> bool {
        self.0 == "-1"
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Which of the two item variants a node is. Dispatch on this tag is the only
/// polymorphism the core needs (§9 design notes).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    Folder,
    Bookmark,
}

/// A detached, shallow snapshot of one node: the payload carried by an
/// [`crate::action::Action`]. Folders never carry their children here; a
/// folder's descendants are represented by their own actions in the diff.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Item {
    Folder(FolderItem),
    Bookmark(BookmarkItem),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FolderItem {
    pub id: ItemId,
    /// `None` only for the root folder.
    pub parent_id: Option<ItemId>,
    pub title: String,
    /// Content hash used by sparse server loading (§6); not meaningful for
    /// equality or merge decisions.
    pub hash: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BookmarkItem {
    pub id: ItemId,
    pub parent_id: ItemId,
    pub title: String,
    pub url: String,
}

impl Item {
    pub fn id(&self) -> &ItemId {
        match self {
            Self::Folder(f) => &f.id,
            Self::Bookmark(b) => &b.id,
        }
    }

    pub fn parent_id(&self) -> Option<&ItemId> {
        match self {
            Self::Folder(f) => f.parent_id.as_ref(),
            Self::Bookmark(b) => Some(&b.parent_id),
        }
    }

    pub fn set_parent_id(&mut self, parent_id: ItemId) {
        match self {
            Self::Folder(f) => f.parent_id = Some(parent_id),
            Self::Bookmark(b) => b.parent_id = parent_id,
        }
    }

    pub fn set_id(&mut self, id: ItemId) {
        match self {
            Self::Folder(f) => f.id = id,
            Self::Bookmark(b) => b.id = id,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Self::Folder(f) => &f.title,
            Self::Bookmark(b) => &b.title,
        }
    }

    pub fn kind(&self) -> ItemKind {
        match self {
            Self::Folder(_) => ItemKind::Folder,
            Self::Bookmark(_) => ItemKind::Bookmark,
        }
    }

    pub fn as_folder(&self) -> Option<&FolderItem> {
        match self {
            Self::Folder(f) => Some(f),
            Self::Bookmark(_) => None,
        }
    }

    /// True iff `self` and `other` are the same variant and have the same
    /// identity-neutral content: same URL for bookmarks, same title for
    /// folders. Used only for first-sync heuristic pairing, never for
    /// matched-by-id comparison.
    pub fn can_merge_with(&self, other: &Item) -> bool {
        match (self, other) {
            (Self::Folder(a), Self::Folder(b)) => a.title == b.title,
            (Self::Bookmark(a), Self::Bookmark(b)) => a.url == b.url,
            _ => false,
        }
    }

    /// True iff the two items differ in an observable field that a scan
    /// should surface as an UPDATE: title for both kinds, plus URL for
    /// bookmarks. Ids and parent ids are not observed here; moves are
    /// detected separately.
    pub fn content_differs(&self, other: &Item) -> bool {
        match (self, other) {
            (Self::Folder(a), Self::Folder(b)) => a.title != b.title,
            (Self::Bookmark(a), Self::Bookmark(b)) => a.title != b.title || a.url != b.url,
            _ => true,
        }
    }

    /// Deep copy. When `with_hash` is false, the folder hash annotation is
    /// dropped, e.g. when snapshotting an item to commit as an action
    /// payload where a stale hash would be misleading.
    pub fn clone_item(&self, with_hash: bool) -> Self {
        match self {
            Self::Folder(f) => Self::Folder(FolderItem {
                hash: if with_hash { f.hash.clone() } else { None },
                ..f.clone()
            }),
            Self::Bookmark(b) => Self::Bookmark(b.clone()),
        }
    }
}
