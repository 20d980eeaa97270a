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

//! Error taxonomy for the sync core.

use thiserror::Error;

use crate::item::ItemId;

/// Error raised by an external collaborator (tree provider, mapping
/// persistence, plan executor). The core passes these through unchanged.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("authentication failed")]
    Authentication {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("item {id} not found")]
    NotFound { id: ItemId },
    #[error("server unavailable")]
    Unavailable {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("request timed out")]
    Timeout,
    #[error("adapter error: {message}")]
    Other {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Errors raised by the sync core itself (§7 of the design).
#[derive(Debug, Error)]
pub enum SyncError {
    /// A tree violates one of the invariants in the data model: a cycle, an
    /// orphaned node, or a duplicate id. Fatal: the caller should abort the
    /// sync rather than try to reconcile against a broken tree.
    #[error("tree is inconsistent: {reason}")]
    InconsistentTree { reason: String },

    /// The mapping snapshot references an id that is required to be present
    /// in one of the trees but isn't. Recoverable: the caller should drop the
    /// stale mapping entry and retry.
    #[error("mapping references unknown id {id} ({kind:?})")]
    InconsistentMapping { id: ItemId, kind: crate::item::ItemKind },

    /// Compensating for a hierarchy-reversal conflict would itself produce a
    /// cycle. Fatal: the reconcile cannot proceed.
    #[error("hierarchy reversal between {first} and {second} cannot be resolved")]
    HierarchyReversalUnresolvable { first: ItemId, second: ItemId },

    /// Passed through unchanged from an external collaborator.
    #[error(transparent)]
    Adapter(#[from] AdapterError),
}

pub type SyncResult<T> = Result<T, SyncError>;
