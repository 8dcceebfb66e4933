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
//! # Scope resolver
//!
//! Turns a (storage location, requested operation) pair into the minimal
//! access descriptor a credential can be issued for. Resolution is a pure
//! narrowing function: the produced scope covers exactly the location's
//! prefix and the requested operation, never more. Destructive capability
//! (object deletion) is excluded from plain writes and granted only when
//! the caller asked for it explicitly, which the catalog authorizes
//! separately.

pub mod error;
pub mod types;

pub use error::ScopeResolverError;
pub use types::*;

use crate::catalog::StorageLocation;
use crate::common::types::ProviderKind;
use crate::config::Config;

#[derive(Clone, Debug, Default)]
pub struct ScopeResolver {
    /// KMS key constraint stamped onto S3 scopes, when configured.
    s3_encryption_key: Option<String>,
}

impl ScopeResolver {
    pub fn new(config: &Config) -> Self {
        Self {
            s3_encryption_key: config.s3.as_ref().and_then(|s3| s3.kms_key_id.clone()),
        }
    }

    /// Narrow a location and a requested operation into an [`AccessScope`].
    ///
    /// Fails with [`ScopeResolverError::Denied`] when the operation is not
    /// representable as a least-privilege grant on the provider, signaling
    /// the caller to fall back to proxied I/O.
    pub fn resolve(
        &self,
        provider: ProviderKind,
        location: &StorageLocation,
        operation: StorageOperation,
        with_delete: bool,
    ) -> Result<AccessScope, ScopeResolverError> {
        if location.bucket.is_empty() {
            return Err(ScopeResolverError::MalformedLocation(
                "bucket identifier is empty".into(),
            ));
        }

        if with_delete {
            if operation == StorageOperation::Read {
                return Err(ScopeResolverError::Denied {
                    provider,
                    operation: "delete on a read-only grant".into(),
                });
            }
            // Downscoped GCS tokens are built from access-boundary rules,
            // and no boundary role grants deletion without administration.
            if provider == ProviderKind::Gcs {
                return Err(ScopeResolverError::Denied {
                    provider,
                    operation: "delete".into(),
                });
            }
        }

        let mut scope = AccessScope {
            provider,
            bucket: location.bucket.clone(),
            prefixes: vec![location.prefix.clone()],
            operations: operation.into(),
            allow_delete: with_delete,
            encryption_key_id: match provider {
                ProviderKind::S3 => self.s3_encryption_key.clone(),
                _ => None,
            },
        };
        scope.canonicalize();
        Ok(scope)
    }
}
