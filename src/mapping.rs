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

//! The mapping table: a bidirectional, per-variant dictionary between local
//! and server ids, plus the persistence trait adapters implement for it.

use std::sync::Mutex;

use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;

use crate::item::ItemId;
use crate::item::ItemKind;

/// Which side an id being added to the store belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Local,
    Server,
}

/// Two maps (one per variant) in one direction. Serializable on its own so
/// the whole table is "two maps per variant per direction", per §6's
/// persistence contract.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DirectionTables {
    pub folder: IndexMap<ItemId, ItemId>,
    pub bookmark: IndexMap<ItemId, ItemId>,
}

impl DirectionTables {
    fn table(&self, kind: ItemKind) -> &IndexMap<ItemId, ItemId> {
        match kind {
            ItemKind::Folder => &self.folder,
            ItemKind::Bookmark => &self.bookmark,
        }
    }

    fn table_mut(&mut self, kind: ItemKind) -> &mut IndexMap<ItemId, ItemId> {
        match kind {
            ItemKind::Folder => &mut self.folder,
            ItemKind::Bookmark => &mut self.bookmark,
        }
    }
}

/// The full bidirectional table, as persisted by an adapter (§6,
/// "Persistence"). No schema version is defined, matching the spec.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MappingTables {
    pub local_to_server: DirectionTables,
    pub server_to_local: DirectionTables,
}

/// An immutable view of the mapping table taken at the start of
/// reconciliation. Cheap to clone: it owns its data, so later mutation of
/// the live store never affects an outstanding snapshot.
#[derive(Clone, Debug, Default)]
pub struct MappingSnapshot {
    tables: MappingTables,
}

impl MappingSnapshot {
    pub fn from_tables(tables: MappingTables) -> Self {
        Self { tables }
    }

    pub fn translate(&self, kind: ItemKind, id: &ItemId, to_server: bool) -> Option<&ItemId> {
        let direction = if to_server {
            &self.tables.local_to_server
        } else {
            &self.tables.server_to_local
        };
        direction.table(kind).get(id)
    }

    pub fn to_server(&self, kind: ItemKind, local_id: &ItemId) -> Option<&ItemId> {
        self.translate(kind, local_id, true)
    }

    pub fn to_local(&self, kind: ItemKind, server_id: &ItemId) -> Option<&ItemId> {
        self.translate(kind, server_id, false)
    }

    /// True iff the table has no pairings at all, the signal used to decide
    /// whether a run is a first sync.
    pub fn is_empty(&self) -> bool {
        self.tables.local_to_server.folder.is_empty()
            && self.tables.local_to_server.bookmark.is_empty()
            && self.tables.server_to_local.folder.is_empty()
            && self.tables.server_to_local.bookmark.is_empty()
    }

    /// A snapshot with one more pairing folded in, without touching the
    /// backing store. Used by the reconciler to resolve ids it has just
    /// paired itself (concurrent creates, first-sync merges) before those
    /// pairings have been persisted.
    pub fn with_pairing(&self, kind: ItemKind, local_id: ItemId, server_id: ItemId) -> Self {
        let mut tables = self.tables.clone();
        tables
            .local_to_server
            .table_mut(kind)
            .insert(local_id.clone(), server_id.clone());
        tables
            .server_to_local
            .table_mut(kind)
            .insert(server_id, local_id);
        Self { tables }
    }
}

/// A pairing discovered during reconciliation, queued for persistence once
/// the plan that depends on it has been applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewMapping {
    pub kind: ItemKind,
    pub local_id: ItemId,
    pub server_id: ItemId,
}

/// The persistent mapping store. `add_mapping`/`remove_mapping` calls are
/// expected to be applied in FIFO order with later duplicates silently
/// overwriting earlier ones for the same `(kind, old_id)` — which is exactly
/// what inserting into an ordered map in call order gives for free.
pub trait MappingStore: Send + Sync {
    fn snapshot(&self) -> MappingSnapshot;
    fn add_mapping(&self, side: Side, kind: ItemKind, local_id: ItemId, server_id: ItemId);
    fn remove_mapping(&self, side: Side, kind: ItemKind, id: &ItemId);
}

/// A `MappingStore` backed by an in-process mutex. Adequate for adapters
/// that persist the table as a single file (see `src/bin/sync_demo.rs`):
/// the mutex is held only for the duration of a single map mutation, never
/// across an await point.
#[derive(Debug, Default)]
pub struct InMemoryMappingStore {
    tables: Mutex<MappingTables>,
}

impl InMemoryMappingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tables(tables: MappingTables) -> Self {
        Self {
            tables: Mutex::new(tables),
        }
    }

    pub fn into_tables(self) -> MappingTables {
        self.tables.into_inner().expect("mutex never poisoned")
    }

    /// A clone of the current tables, for adapters that persist after every
    /// sync rather than only at shutdown.
    pub fn to_tables(&self) -> MappingTables {
        self.tables.lock().expect("mutex never poisoned").clone()
    }
}

impl MappingStore for InMemoryMappingStore {
    fn snapshot(&self) -> MappingSnapshot {
        let tables = self.tables.lock().expect("mutex never poisoned");
        MappingSnapshot::from_tables(tables.clone())
    }

    fn add_mapping(&self, _side: Side, kind: ItemKind, local_id: ItemId, server_id: ItemId) {
        let mut tables = self.tables.lock().expect("mutex never poisoned");
        if let Some(old_server_id) = tables.local_to_server.table_mut(kind).insert(local_id.clone(), server_id.clone()) {
            if old_server_id != server_id {
                tables.server_to_local.table_mut(kind).shift_remove(&old_server_id);
            }
        }
        if let Some(old_local_id) = tables.server_to_local.table_mut(kind).insert(server_id, local_id.clone()) {
            if old_local_id != local_id {
                tables.local_to_server.table_mut(kind).shift_remove(&old_local_id);
            }
        }
    }

    fn remove_mapping(&self, side: Side, kind: ItemKind, id: &ItemId) {
        let mut tables = self.tables.lock().expect("mutex never poisoned");
        match side {
            Side::Local => {
                if let Some(server_id) = tables.local_to_server.table_mut(kind).shift_remove(id) {
                    tables.server_to_local.table_mut(kind).shift_remove(&server_id);
                }
            }
            Side::Server => {
                if let Some(local_id) = tables.server_to_local.table_mut(kind).shift_remove(id) {
                    tables.local_to_server.table_mut(kind).shift_remove(&local_id);
                }
            }
        }
    }
}
