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
//! # Vending engine
//!
//! Orchestrates one credential vending request end to end:
//! resolve the entity's storage location through the catalog collaborator,
//! narrow it into an access scope, consult the credential cache and, on a
//! miss, issue through the provider adapter selected by the location's
//! provider tag. Successful issuance is written through to the cache before
//! the response leaves the engine, so the next request for an equivalent
//! scope needs no upstream round trip.
//!
//! The engine never retries a failed issuance; upstream token services
//! rate-limit aggressively and blind engine-level retries would amplify an
//! outage. Retry policy belongs to the caller.

use std::sync::Arc;

use chrono::Utc;
use derive_builder::Builder;
use mockall_double::double;
use tracing::{error, info};
use validator::Validate;

pub mod types;

use crate::cache::{CacheKey, CredentialCache};
use crate::catalog::{LocationApi, StorageLocation};
use crate::common::types::ProviderKind;
use crate::config::Config;
use crate::error::VendorError;
use crate::expiry::ExpiryGovernor;
#[double]
use crate::issuer::IssuerProvider;
use crate::issuer::{BaseIdentities, IssuerApi, VendedCredential};
use crate::scope::{ScopeResolver, StorageOperation};

pub use types::{VendingRequest, VendingResponse};

/// Per-request flow:
/// `Resolving → ScopeBuilt → CacheCheck →
/// {CacheHit → Done, CacheMiss → Issuing → {Issued, Failed} → Done}`.
#[derive(Builder)]
// The owned pattern avoids builder-internal clones that confuse mockall in
// tests.
#[builder(pattern = "owned")]
pub struct VendingEngine {
    /// Configuration.
    pub config: Config,
    /// Catalog collaborator resolving entities to storage locations.
    locations: Arc<dyn LocationApi>,
    /// Scope resolver.
    scope: ScopeResolver,
    /// Lifetime policy.
    governor: ExpiryGovernor,
    /// Credential cache.
    cache: Arc<CredentialCache>,
    /// Issuer provider.
    issuer: Arc<IssuerProvider>,
}

impl VendingEngine {
    pub fn new(
        config: Config,
        locations: Arc<dyn LocationApi>,
        identities: BaseIdentities,
    ) -> Result<Self, VendorError> {
        config.validate()?;
        let issuer = Arc::new(IssuerProvider::new(&config, identities)?);
        let scope = ScopeResolver::new(&config);
        let governor = ExpiryGovernor::new(&config);
        let cache = Arc::new(CredentialCache::new(
            config.cache.capacity,
            governor.safety_margin(),
        ));
        Ok(Self {
            config,
            locations,
            scope,
            governor,
            cache,
            issuer,
        })
    }

    /// Vend a credential for a catalog entity.
    #[tracing::instrument(level = "info", skip(self, request), fields(principal = %request.principal, entity = %request.entity))]
    pub async fn vend(&self, request: &VendingRequest) -> Result<VendingResponse, VendorError> {
        if request.principal.trim().is_empty() {
            return Err(VendorError::PrincipalMissing);
        }
        request.validate()?;

        // Resolving
        let location = self
            .locations
            .resolve_location(&request.entity)
            .await?
            .ok_or_else(|| VendorError::LocationUnresolved(request.entity.clone()))?;

        self.vend_for_location(
            &request.principal,
            &location,
            request.operation,
            request.with_delete,
            request.requested_lifetime_secs,
        )
        .await
    }

    /// Vend a credential for a pre-resolved storage location.
    #[tracing::instrument(level = "info", skip(self, location), fields(provider = %location.provider, bucket = %location.bucket))]
    pub async fn vend_for_location(
        &self,
        principal: &str,
        location: &StorageLocation,
        operation: StorageOperation,
        with_delete: bool,
        requested_lifetime_secs: Option<u64>,
    ) -> Result<VendingResponse, VendorError> {
        if principal.trim().is_empty() {
            return Err(VendorError::PrincipalMissing);
        }

        let provider = match ProviderKind::from_tag(&location.provider) {
            Some(provider) => provider,
            None => {
                error!(
                    tag = %location.provider,
                    "unknown provider tag on storage location"
                );
                return Err(VendorError::ProviderUnsupported(location.provider.clone()));
            }
        };
        if !self.issuer.supports(provider) {
            error!(
                tag = %location.provider,
                "provider tag has no configured backend; configuration defect"
            );
            return Err(VendorError::ProviderUnsupported(location.provider.clone()));
        }

        // ScopeBuilt
        let scope = self
            .scope
            .resolve(provider, location, operation, with_delete)?;

        let provider_max = self
            .issuer
            .max_lifetime_secs(provider)
            .ok_or_else(|| VendorError::ProviderUnsupported(location.provider.clone()))?;
        let lifetime_secs = self
            .governor
            .effective_lifetime(requested_lifetime_secs, provider_max);

        // CacheCheck; on a miss the cache runs the issuance single-flight
        // and writes through before releasing the waiters.
        let key = CacheKey::new(principal, &scope);
        let issuer = Arc::clone(&self.issuer);
        let issue_scope = scope.clone();
        let issue_principal = principal.to_owned();
        let credential = self
            .cache
            .get_or_issue(key, Utc::now(), async move {
                issuer
                    .issue_credential(provider, &issue_scope, &issue_principal, lifetime_secs)
                    .await
            })
            .await?;

        Ok(respond(credential))
    }

    /// Drop all cached credentials.
    pub async fn terminate(&self) -> Result<(), VendorError> {
        info!("Terminating vending engine");
        self.cache.clear();
        Ok(())
    }
}

fn respond(credential: VendedCredential) -> VendingResponse {
    VendingResponse {
        provider: credential.provider.as_str().to_string(),
        expires_at_epoch_secs: credential.expires_at.timestamp(),
        credential_properties: credential.to_properties(),
    }
}

#[cfg(test)]
impl VendingEngine {
    pub fn mocked_builder() -> VendingEngineBuilder {
        let config = Config::default();
        let governor = ExpiryGovernor::new(&config);
        let cache = Arc::new(CredentialCache::new(
            config.cache.capacity,
            governor.safety_margin(),
        ));
        let issuer_mock = crate::issuer::MockIssuerProvider::default();

        VendingEngineBuilder::default()
            .scope(ScopeResolver::new(&config))
            .governor(governor)
            .cache(cache)
            .issuer(Arc::new(issuer_mock))
            .config(config)
    }
}
