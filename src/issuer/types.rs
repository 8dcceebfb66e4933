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
//! Credential issuer types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use validator::Validate;

pub mod provider_api;

pub use provider_api::IssuerApi;

use crate::common::types::ProviderKind;
use crate::scope::AccessScope;

/// Property keys a credential payload renders to.
///
/// These are the flat map handed back to catalog clients, which translate
/// them into engine-specific settings (Iceberg `s3.access-key-id` and the
/// like) on their side.
pub const S3_ACCESS_KEY_ID: &str = "s3-access-key-id";
pub const S3_SECRET_ACCESS_KEY: &str = "s3-secret-access-key";
pub const S3_SESSION_TOKEN: &str = "s3-session-token";
pub const GCS_TOKEN: &str = "gcs-token";
pub const GCS_TOKEN_EXPIRES_AT_MS: &str = "expires-at-ms";
pub const GCS_SCOPE_CAVEAT: &str = "scope-caveat";
pub const ADLS_SAS_TOKEN: &str = "adls-sas-token";

/// STS session credential triple for S3-compatible storage.
#[derive(Clone, Eq, PartialEq)]
pub struct S3SessionCredential {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
}

impl std::fmt::Debug for S3SessionCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3SessionCredential")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &"<redacted>")
            .finish()
    }
}

/// Downscoped bearer token for Google Cloud Storage.
#[derive(Clone, Eq, PartialEq)]
pub struct GcsTokenCredential {
    pub token: String,

    /// Set when the token broker could not apply object-level conditions
    /// and the token is bound to the whole bucket instead. Surfaced to the
    /// caller verbatim.
    pub scope_caveat: Option<String>,
}

impl std::fmt::Debug for GcsTokenCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcsTokenCredential")
            .field("token", &"<redacted>")
            .field("scope_caveat", &self.scope_caveat)
            .finish()
    }
}

/// Shared access signature for Azure blob storage.
#[derive(Clone, Eq, PartialEq)]
pub struct AzureSasCredential {
    pub sas_token: String,
}

impl std::fmt::Debug for AzureSasCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureSasCredential")
            .field("sas_token", &"<redacted>")
            .finish()
    }
}

/// Provider-specific opaque credential material.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CredentialPayload {
    S3(S3SessionCredential),
    Gcs(GcsTokenCredential),
    Azure(AzureSasCredential),
}

/// A credential as issued by a provider adapter.
///
/// The expiry is whatever the upstream token service committed to, exposed
/// verbatim; the core never lies about remaining lifetime.
#[derive(Clone, Debug, PartialEq, Validate)]
pub struct VendedCredential {
    pub provider: ProviderKind,
    pub payload: CredentialPayload,
    #[validate(custom(function = "validators::validate_future_expiry"))]
    pub expires_at: DateTime<Utc>,
    pub scope: AccessScope,
}

impl VendedCredential {
    /// Flatten the payload into the property map returned to callers.
    pub fn to_properties(&self) -> BTreeMap<String, String> {
        let mut properties = BTreeMap::new();
        match &self.payload {
            CredentialPayload::S3(s3) => {
                properties.insert(S3_ACCESS_KEY_ID.into(), s3.access_key_id.clone());
                properties.insert(S3_SECRET_ACCESS_KEY.into(), s3.secret_access_key.clone());
                properties.insert(S3_SESSION_TOKEN.into(), s3.session_token.clone());
            }
            CredentialPayload::Gcs(gcs) => {
                properties.insert(GCS_TOKEN.into(), gcs.token.clone());
                properties.insert(
                    GCS_TOKEN_EXPIRES_AT_MS.into(),
                    self.expires_at.timestamp_millis().to_string(),
                );
                if let Some(caveat) = &gcs.scope_caveat {
                    properties.insert(GCS_SCOPE_CAVEAT.into(), caveat.clone());
                }
            }
            CredentialPayload::Azure(azure) => {
                properties.insert(ADLS_SAS_TOKEN.into(), azure.sas_token.clone());
            }
        }
        properties
    }
}

mod validators {
    use chrono::{DateTime, Utc};
    use validator::ValidationError;

    pub fn validate_future_expiry(expires_at: &DateTime<Utc>) -> Result<(), ValidationError> {
        if *expires_at <= Utc::now() {
            let mut err = ValidationError::new("expires_in_past");
            err.message = Some("Credential expiry must be in the future".into());
            return Err(err);
        }
        Ok(())
    }
}
