// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0
//! Scope resolver types.

use serde::{Deserialize, Serialize};

use crate::common::types::ProviderKind;

/// Operation the caller wants to perform against the storage location.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageOperation {
    Read,
    Write,
    ReadWrite,
}

/// Operations a vended credential is allowed to exercise.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationSet {
    ReadOnly,
    ReadWrite,
}

impl From<StorageOperation> for OperationSet {
    fn from(operation: StorageOperation) -> Self {
        match operation {
            StorageOperation::Read => Self::ReadOnly,
            StorageOperation::Write | StorageOperation::ReadWrite => Self::ReadWrite,
        }
    }
}

/// Least-privilege access descriptor a credential is issued for.
///
/// Derived per request, never persisted. The path set is always a subset of
/// the catalog-resolved location prefix: resolution only narrows, it never
/// widens.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize)]
pub struct AccessScope {
    /// Backend the scope is expressed for.
    pub provider: ProviderKind,

    /// Bucket or container the scope is confined to.
    pub bucket: String,

    /// Canonical path prefixes (sorted, deduplicated, no leading slash).
    /// An empty prefix grants the bucket root.
    pub prefixes: Vec<String>,

    /// Granted operation set.
    pub operations: OperationSet,

    /// Whether object deletion is granted. Requires explicit upstream
    /// authorization; plain writes stay non-destructive.
    pub allow_delete: bool,

    /// Server-side encryption key the scope is constrained to, where the
    /// backend supports key-level constraints.
    pub encryption_key_id: Option<String>,
}

impl AccessScope {
    /// Bring the prefix set into canonical form.
    ///
    /// Cache keys hash the scope, so two requests for the same grant must
    /// produce byte-equal prefix sets regardless of the order or slashes
    /// the catalog recorded.
    pub fn canonicalize(&mut self) {
        for prefix in &mut self.prefixes {
            while prefix.starts_with('/') {
                prefix.remove(0);
            }
        }
        self.prefixes.sort_unstable();
        self.prefixes.dedup();
    }

    /// A scope with no bucket or no prefix entry grants nothing and must
    /// never reach an issuer.
    pub fn is_well_formed(&self) -> bool {
        !self.bucket.is_empty() && !self.prefixes.is_empty()
    }
}
