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
//! Google Cloud Storage credential issuance.
//!
//! Obtains a short-lived downscoped access token through an impersonation
//! call made with the service's base identity. The token broker applies a
//! credential access boundary narrowing the token to the scope's object
//! prefixes; brokers that cannot express object-level conditions fall back
//! to bucket-level scope, and the vended credential then carries a caveat
//! that is surfaced to the caller verbatim.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::common::types::ProviderKind;
use crate::config::GcsSection;
use crate::issuer::backend::{CredentialIssuer, check_scope};
use crate::issuer::error::{IssuerError, UpstreamError};
use crate::issuer::types::{CredentialPayload, GcsTokenCredential, VendedCredential};
use crate::scope::{AccessScope, OperationSet};

/// Downscoped-token exchange against the Google token broker.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenBrokerApi: Send + Sync {
    async fn fetch_access_token(
        &self,
        request: DownscopedTokenRequest,
    ) -> Result<BrokeredToken, UpstreamError>;
}

/// Parameters of one downscoped-token exchange.
#[derive(Clone, Debug)]
pub struct DownscopedTokenRequest {
    /// Service account impersonated for the exchange.
    pub service_account: String,
    pub bucket: String,
    /// Object prefixes for the access-boundary availability condition.
    pub prefixes: Vec<String>,
    pub read_only: bool,
    pub lifetime_secs: u64,
}

/// Token broker response.
#[derive(Clone, Debug)]
pub struct BrokeredToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    /// Whether the broker applied the object-level boundary conditions.
    /// `false` means the token is scoped to the whole bucket.
    pub object_level: bool,
}

pub struct GcsTokenIssuer {
    service_account: String,
    max_lifetime: u64,
    broker: Box<dyn TokenBrokerApi>,
}

impl GcsTokenIssuer {
    pub fn new(section: &GcsSection, broker: Box<dyn TokenBrokerApi>) -> Self {
        Self {
            service_account: section.service_account.clone(),
            max_lifetime: section.max_lifetime,
            broker,
        }
    }
}

#[async_trait]
impl CredentialIssuer for GcsTokenIssuer {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Gcs
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
        check_scope(scope, ProviderKind::Gcs)?;
        if scope.allow_delete {
            // The scope resolver refuses these already; a scope that slips
            // through must not widen into a bucket-level token.
            return Err(IssuerError::MalformedScope(
                "delete capability is not scopable on gcs".into(),
            ));
        }

        let lifetime_secs = lifetime_secs.min(self.max_lifetime);
        debug!(
            principal,
            bucket = %scope.bucket,
            lifetime_secs,
            "requesting downscoped gcs token"
        );

        let response = self
            .broker
            .fetch_access_token(DownscopedTokenRequest {
                service_account: self.service_account.clone(),
                bucket: scope.bucket.clone(),
                prefixes: scope.prefixes.clone(),
                read_only: scope.operations == OperationSet::ReadOnly,
                lifetime_secs,
            })
            .await
            .map_err(|source| IssuerError::Upstream {
                provider: ProviderKind::Gcs,
                source,
            })?;

        // The bucket root needs no object-level condition; anything
        // narrower that the broker could not express gets a caveat.
        let wants_object_level = scope.prefixes.iter().any(|prefix| !prefix.is_empty());
        let scope_caveat = if wants_object_level && !response.object_level {
            warn!(
                bucket = %scope.bucket,
                "token broker fell back to bucket-level scope"
            );
            Some(format!(
                "token is scoped to bucket {} rather than the requested prefixes",
                scope.bucket
            ))
        } else {
            None
        };

        let credential = VendedCredential {
            provider: ProviderKind::Gcs,
            payload: CredentialPayload::Gcs(GcsTokenCredential {
                token: response.token,
                scope_caveat,
            }),
            expires_at: response.expires_at,
            scope: scope.clone(),
        };
        validator::Validate::validate(&credential)
            .map_err(|err| IssuerError::InvalidCredential(err.to_string()))?;

        Ok(credential)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;
    use crate::issuer::types::GCS_SCOPE_CAVEAT;

    fn scope(prefix: &str) -> AccessScope {
        AccessScope {
            provider: ProviderKind::Gcs,
            bucket: "lake".into(),
            prefixes: vec![prefix.into()],
            operations: OperationSet::ReadOnly,
            allow_delete: false,
            encryption_key_id: None,
        }
    }

    fn section() -> GcsSection {
        GcsSection {
            service_account: "vendor@prj.iam.gserviceaccount.com".into(),
            max_lifetime: 3600,
        }
    }

    fn token(object_level: bool) -> BrokeredToken {
        BrokeredToken {
            token: "ya29.downscoped".into(),
            expires_at: Utc::now() + TimeDelta::hours(1),
            object_level,
        }
    }

    #[tokio::test]
    async fn test_issue_passes_boundary_conditions() {
        let mut broker = MockTokenBrokerApi::default();
        broker
            .expect_fetch_access_token()
            .withf(|request: &DownscopedTokenRequest| {
                request.bucket == "lake"
                    && request.prefixes == vec!["orders/".to_string()]
                    && request.read_only
                    && request.service_account == "vendor@prj.iam.gserviceaccount.com"
            })
            .returning(|_| Ok(token(true)));

        let issuer = GcsTokenIssuer::new(&section(), Box::new(broker));
        let credential = issuer.issue(&scope("orders/"), "svc-etl", 3600).await.unwrap();
        assert!(
            !credential
                .to_properties()
                .contains_key(GCS_SCOPE_CAVEAT)
        );
    }

    #[tokio::test]
    async fn test_bucket_fallback_carries_caveat() {
        let mut broker = MockTokenBrokerApi::default();
        broker
            .expect_fetch_access_token()
            .returning(|_| Ok(token(false)));

        let issuer = GcsTokenIssuer::new(&section(), Box::new(broker));
        let credential = issuer.issue(&scope("orders/"), "svc-etl", 3600).await.unwrap();

        let properties = credential.to_properties();
        let caveat = properties.get(GCS_SCOPE_CAVEAT).unwrap();
        assert!(caveat.contains("bucket lake"));
    }

    #[tokio::test]
    async fn test_bucket_root_scope_needs_no_caveat() {
        let mut broker = MockTokenBrokerApi::default();
        broker
            .expect_fetch_access_token()
            .returning(|_| Ok(token(false)));

        let issuer = GcsTokenIssuer::new(&section(), Box::new(broker));
        let credential = issuer.issue(&scope(""), "svc-etl", 3600).await.unwrap();
        assert!(
            !credential
                .to_properties()
                .contains_key(GCS_SCOPE_CAVEAT)
        );
    }

    #[tokio::test]
    async fn test_delete_scope_is_refused_before_upstream() {
        let mut broker = MockTokenBrokerApi::default();
        broker.expect_fetch_access_token().never();

        let issuer = GcsTokenIssuer::new(&section(), Box::new(broker));
        let mut wrong = scope("orders/");
        wrong.allow_delete = true;
        assert!(matches!(
            issuer.issue(&wrong, "svc-etl", 3600).await,
            Err(IssuerError::MalformedScope(..))
        ));
    }

    #[tokio::test]
    async fn test_throttled_upstream_is_translated() {
        let mut broker = MockTokenBrokerApi::default();
        broker
            .expect_fetch_access_token()
            .returning(|_| Err(UpstreamError::Throttled));

        let issuer = GcsTokenIssuer::new(&section(), Box::new(broker));
        match issuer.issue(&scope("orders/"), "svc-etl", 3600).await {
            Err(IssuerError::Upstream { provider, source }) => {
                assert_eq!(provider, ProviderKind::Gcs);
                assert!(matches!(source, UpstreamError::Throttled));
            }
            other => panic!("expected upstream error, got {other:?}"),
        }
    }
}
