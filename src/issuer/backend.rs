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
//! Credential issuer backends.
//!
//! One backend per storage provider family. Every backend validates the
//! scope it receives, exchanges it through the injected base-identity
//! capability and translates upstream failures into [`IssuerError`];
//! provider-specific error shapes never leave a backend.

use async_trait::async_trait;

use crate::common::types::ProviderKind;
use crate::issuer::error::IssuerError;
use crate::issuer::types::VendedCredential;
use crate::scope::AccessScope;

pub mod azure;
pub mod gcs;
pub mod s3;

/// Credential issuer backend interface.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialIssuer: Send + Sync {
    /// Provider family this backend issues for.
    fn provider(&self) -> ProviderKind;

    /// Maximum credential lifetime (seconds) the backend supports.
    fn max_lifetime_secs(&self) -> u64;

    /// Exchange an access scope for a native credential.
    async fn issue<'a>(
        &self,
        scope: &'a AccessScope,
        principal: &'a str,
        lifetime_secs: u64,
    ) -> Result<VendedCredential, IssuerError>;
}

/// Shared pre-flight checks every backend runs before going upstream.
pub(crate) fn check_scope(
    scope: &AccessScope,
    issuer: ProviderKind,
) -> Result<(), IssuerError> {
    if scope.provider != issuer {
        return Err(IssuerError::ProviderMismatch {
            scope: scope.provider,
            issuer,
        });
    }
    if !scope.is_well_formed() {
        return Err(IssuerError::MalformedScope(
            "scope grants no bucket or prefix".into(),
        ));
    }
    Ok(())
}
