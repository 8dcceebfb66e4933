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
//! S3-compatible credential issuance.
//!
//! Synthesizes an inline least-privilege session policy for the scope and
//! exchanges it for temporary credentials through an assume-role call made
//! with the service's base identity. The session policy can only narrow
//! what the assumed role already permits, so a defective policy fails
//! closed at the token service.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use tracing::debug;
use uuid::Uuid;

use crate::common::types::ProviderKind;
use crate::config::S3Section;
use crate::issuer::backend::{CredentialIssuer, check_scope};
use crate::issuer::error::{IssuerError, UpstreamError};
use crate::issuer::types::{CredentialPayload, S3SessionCredential, VendedCredential};
use crate::scope::{AccessScope, OperationSet};

/// Assume-role exchange against the backend's security token service.
///
/// The deployment injects an implementation bound to the service's base
/// identity; this crate never holds raw base-identity key material.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AssumeRoleApi: Send + Sync {
    async fn assume_role(
        &self,
        request: AssumeRoleRequest,
    ) -> Result<StsSessionResponse, UpstreamError>;
}

/// Parameters of one assume-role call.
#[derive(Clone, Debug)]
pub struct AssumeRoleRequest {
    pub role_arn: String,
    pub session_name: String,
    /// Inline session policy document (JSON).
    pub policy: String,
    pub duration_secs: u64,
    pub external_id: Option<String>,
    pub region: Option<String>,
}

/// Temporary session credentials as returned by the token service.
#[derive(Clone, Debug)]
pub struct StsSessionResponse {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiration: DateTime<Utc>,
}

pub struct S3TokenIssuer {
    role_arn: String,
    region: Option<String>,
    max_session_duration: u64,
    external_id: Option<SecretString>,
    sts: Box<dyn AssumeRoleApi>,
}

impl S3TokenIssuer {
    pub fn new(section: &S3Section, sts: Box<dyn AssumeRoleApi>) -> Self {
        Self {
            role_arn: section.role_arn.clone(),
            region: section.region.clone(),
            max_session_duration: section.max_session_duration,
            external_id: section.external_id.clone(),
            sts,
        }
    }
}

/// Build the inline session policy granting exactly the scope.
fn session_policy(scope: &AccessScope) -> Value {
    let bucket_arn = format!("arn:aws:s3:::{}", scope.bucket);
    let object_arns: Vec<String> = scope
        .prefixes
        .iter()
        .map(|prefix| format!("{bucket_arn}/{prefix}*"))
        .collect();
    let prefix_patterns: Vec<String> = scope
        .prefixes
        .iter()
        .map(|prefix| format!("{prefix}*"))
        .collect();

    let mut statements = vec![
        json!({
            "Sid": "ListBucket",
            "Effect": "Allow",
            "Action": ["s3:ListBucket"],
            "Resource": [bucket_arn],
            "Condition": { "StringLike": { "s3:prefix": prefix_patterns } },
        }),
        json!({
            "Sid": "ReadObjects",
            "Effect": "Allow",
            "Action": ["s3:GetObject", "s3:GetObjectVersion"],
            "Resource": object_arns,
        }),
    ];

    if scope.operations == OperationSet::ReadWrite {
        statements.push(json!({
            "Sid": "WriteObjects",
            "Effect": "Allow",
            "Action": ["s3:PutObject", "s3:AbortMultipartUpload"],
            "Resource": object_arns,
        }));
        if scope.allow_delete {
            statements.push(json!({
                "Sid": "DeleteObjects",
                "Effect": "Allow",
                "Action": ["s3:DeleteObject"],
                "Resource": object_arns,
            }));
        }
    }

    if let Some(key_id) = &scope.encryption_key_id {
        statements.push(json!({
            "Sid": "ScopedEncryptionKey",
            "Effect": "Allow",
            "Action": ["kms:GenerateDataKey", "kms:Decrypt"],
            "Resource": [key_id],
        }));
    }

    json!({ "Version": "2012-10-17", "Statement": statements })
}

#[async_trait]
impl CredentialIssuer for S3TokenIssuer {
    fn provider(&self) -> ProviderKind {
        ProviderKind::S3
    }

    fn max_lifetime_secs(&self) -> u64 {
        self.max_session_duration
    }

    async fn issue<'a>(
        &self,
        scope: &'a AccessScope,
        principal: &'a str,
        lifetime_secs: u64,
    ) -> Result<VendedCredential, IssuerError> {
        check_scope(scope, ProviderKind::S3)?;

        let duration_secs = lifetime_secs.min(self.max_session_duration);
        let policy = session_policy(scope).to_string();
        // Session names have a restricted alphabet; the principal does not
        // go into it.
        let session_name = format!("credvend-{}", Uuid::new_v4().simple());

        debug!(
            principal,
            bucket = %scope.bucket,
            duration_secs,
            "requesting s3 session credential"
        );

        let response = self
            .sts
            .assume_role(AssumeRoleRequest {
                role_arn: self.role_arn.clone(),
                session_name,
                policy,
                duration_secs,
                external_id: self
                    .external_id
                    .as_ref()
                    .map(|id| id.expose_secret().to_string()),
                region: self.region.clone(),
            })
            .await
            .map_err(|source| IssuerError::Upstream {
                provider: ProviderKind::S3,
                source,
            })?;

        let credential = VendedCredential {
            provider: ProviderKind::S3,
            payload: CredentialPayload::S3(S3SessionCredential {
                access_key_id: response.access_key_id,
                secret_access_key: response.secret_access_key,
                session_token: response.session_token,
            }),
            expires_at: response.expiration,
            scope: scope.clone(),
        };
        validator::Validate::validate(&credential)
            .map_err(|err| IssuerError::InvalidCredential(err.to_string()))?;

        Ok(credential)
    }
}
