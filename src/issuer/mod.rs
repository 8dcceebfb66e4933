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
//! # Credential issuer provider
//!
//! Owns one credential issuer backend per configured storage provider and
//! dispatches issuance on the provider kind alone. Backends are built from
//! the matching configuration section plus the base-identity capability the
//! deployment injects; a section without its capability is a construction
//! error, never a silent gap discovered at request time.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

pub mod backend;
pub mod error;
#[cfg(test)]
mod mock;
pub mod types;

use crate::common::types::ProviderKind;
use crate::config::Config;
use crate::scope::AccessScope;
use backend::CredentialIssuer;
use backend::azure::{AzureSasIssuer, SasDelegationApi};
use backend::gcs::{GcsTokenIssuer, TokenBrokerApi};
use backend::s3::{AssumeRoleApi, S3TokenIssuer};

pub use error::{IssuerError, UpstreamError};
#[cfg(test)]
pub use mock::MockIssuerProvider;
pub use types::*;

/// Base-identity capabilities injected by the deployment.
///
/// Each capability wraps the service's own long-lived cloud identity for
/// one provider; none of them ever leaves this crate towards a client.
#[derive(Default)]
pub struct BaseIdentities {
    pub s3: Option<Box<dyn AssumeRoleApi>>,
    pub gcs: Option<Box<dyn TokenBrokerApi>>,
    pub azure: Option<Box<dyn SasDelegationApi>>,
}

pub struct IssuerProvider {
    backends: HashMap<ProviderKind, Arc<dyn CredentialIssuer>>,
}

impl std::fmt::Debug for IssuerProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuerProvider")
            .field("backends", &self.backends.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl IssuerProvider {
    pub fn new(config: &Config, identities: BaseIdentities) -> Result<Self, IssuerError> {
        let mut backends: HashMap<ProviderKind, Arc<dyn CredentialIssuer>> = HashMap::new();

        if let Some(section) = &config.s3 {
            let sts = identities
                .s3
                .ok_or(IssuerError::IdentityNotConfigured(ProviderKind::S3))?;
            backends.insert(
                ProviderKind::S3,
                Arc::new(S3TokenIssuer::new(section, sts)),
            );
        }
        if let Some(section) = &config.gcs {
            let broker = identities
                .gcs
                .ok_or(IssuerError::IdentityNotConfigured(ProviderKind::Gcs))?;
            backends.insert(
                ProviderKind::Gcs,
                Arc::new(GcsTokenIssuer::new(section, broker)),
            );
        }
        if let Some(section) = &config.azure {
            let delegate = identities
                .azure
                .ok_or(IssuerError::IdentityNotConfigured(ProviderKind::Azure))?;
            backends.insert(
                ProviderKind::Azure,
                Arc::new(AzureSasIssuer::new(section, delegate)),
            );
        }

        debug!(providers = backends.len(), "issuer backends configured");
        Ok(Self { backends })
    }
}

#[async_trait]
impl IssuerApi for IssuerProvider {
    fn supports(&self, provider: ProviderKind) -> bool {
        self.backends.contains_key(&provider)
    }

    fn max_lifetime_secs(&self, provider: ProviderKind) -> Option<u64> {
        self.backends
            .get(&provider)
            .map(|backend| backend.max_lifetime_secs())
    }

    /// Issue a credential through the backend for the provider.
    #[tracing::instrument(level = "debug", skip(self, scope))]
    async fn issue_credential<'a>(
        &self,
        provider: ProviderKind,
        scope: &'a AccessScope,
        principal: &'a str,
        lifetime_secs: u64,
    ) -> Result<VendedCredential, IssuerError> {
        let backend = self
            .backends
            .get(&provider)
            .ok_or(IssuerError::IdentityNotConfigured(provider))?;
        backend.issue(scope, principal, lifetime_secs).await
    }
}
