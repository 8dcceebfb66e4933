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
//! Azure blob storage credential issuance.
//!
//! Generates a shared access signature bound to the container and prefix
//! with an explicit expiry. Signing happens behind the injected delegation
//! capability (user-delegation key or account key stays with the
//! deployment); this backend decides the permission set and the expiry.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;

use crate::common::types::ProviderKind;
use crate::config::AzureSection;
use crate::issuer::backend::{CredentialIssuer, check_scope};
use crate::issuer::error::{IssuerError, UpstreamError};
use crate::issuer::types::{AzureSasCredential, CredentialPayload, VendedCredential};
use crate::scope::{AccessScope, OperationSet};

/// SAS generation through the service's base identity.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SasDelegationApi: Send + Sync {
    async fn generate_sas(&self, request: SasTokenRequest) -> Result<SasToken, UpstreamError>;
}

/// Parameters of one SAS generation.
#[derive(Clone, Debug)]
pub struct SasTokenRequest {
    pub account: String,
    pub container: String,
    /// Directory path the signature is bound to; empty binds the container.
    pub directory: String,
    /// Permission letters in canonical Azure order.
    pub permissions: String,
    pub expires_at: DateTime<Utc>,
}

/// Signed SAS token.
#[derive(Clone, Debug)]
pub struct SasToken {
    pub token: String,
}

pub struct AzureSasIssuer {
    account: String,
    max_lifetime: u64,
    delegate: Box<dyn SasDelegationApi>,
}

impl AzureSasIssuer {
    pub fn new(section: &AzureSection, delegate: Box<dyn SasDelegationApi>) -> Self {
        Self {
            account: section.account.clone(),
            max_lifetime: section.max_lifetime,
            delegate,
        }
    }
}

/// Permission letters for the operation set, in canonical `racwdl` order.
fn sas_permissions(operations: OperationSet, allow_delete: bool) -> String {
    match (operations, allow_delete) {
        (OperationSet::ReadOnly, _) => "rl".into(),
        (OperationSet::ReadWrite, false) => "racwl".into(),
        (OperationSet::ReadWrite, true) => "racwdl".into(),
    }
}

#[async_trait]
impl CredentialIssuer for AzureSasIssuer {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Azure
    }

    fn max_lifetime_secs(&self) -> u64 {
        self.max_lifetime
    }

    async fn issue<'a>(
        &self,
        scope: &'a AccessScope,
        principal: &'a str,
        lifetime_secs: u64,
    ) -> Result<VendedCredential, IssuerError> {
        check_scope(scope, ProviderKind::Azure)?;

        let lifetime_secs = lifetime_secs.min(self.max_lifetime);
        let expires_at = Utc::now()
            .checked_add_signed(TimeDelta::seconds(lifetime_secs as i64))
            .ok_or(IssuerError::ExpiryCalculation)?;
        let permissions = sas_permissions(scope.operations, scope.allow_delete);
        // SAS binds to a single directory; the canonical scope has exactly
        // one prefix per location.
        let directory = scope.prefixes.first().cloned().unwrap_or_default();

        debug!(
            principal,
            container = %scope.bucket,
            %permissions,
            "requesting sas token"
        );

        let response = self
            .delegate
            .generate_sas(SasTokenRequest {
                account: self.account.clone(),
                container: scope.bucket.clone(),
                directory,
                permissions,
                expires_at,
            })
            .await
            .map_err(|source| IssuerError::Upstream {
                provider: ProviderKind::Azure,
                source,
            })?;

        let credential = VendedCredential {
            provider: ProviderKind::Azure,
            payload: CredentialPayload::Azure(AzureSasCredential {
                sas_token: response.token,
            }),
            expires_at,
            scope: scope.clone(),
        };
        validator::Validate::validate(&credential)
            .map_err(|err| IssuerError::InvalidCredential(err.to_string()))?;

        Ok(credential)
    }
}
