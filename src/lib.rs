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

//! A three-way merge engine for syncing a hierarchical bookmark tree
//! between a local store and a remote server.
//!
//! The entry point is [`sync::sync`]; everything else is exported for
//! adapters and tests that want to drive the pieces directly.

pub mod action;
pub mod adapter;
pub mod error;
pub mod item;
pub mod mapping;
pub mod reconcile;
pub mod scanner;
pub mod sync;
pub mod tree;

pub use action::Action;
pub use action::ActionKind;
pub use action::Diff;
pub use action::Plan;
pub use adapter::SyncConfig;
pub use adapter::TreeProvider;
pub use error::AdapterError;
pub use error::SyncError;
pub use error::SyncResult;
pub use item::Item;
pub use item::ItemId;
pub use item::ItemKind;
pub use mapping::InMemoryMappingStore;
pub use mapping::MappingStore;
pub use sync::sync;
pub use tree::Tree;
