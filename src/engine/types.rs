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
//! Vending engine request/response types.

use std::collections::BTreeMap;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::BuilderError;
use crate::scope::StorageOperation;

/// A credential vending request from the catalog.
///
/// The principal has already been authenticated and authorized for the
/// entity by the catalog; this crate only converts that decision into
/// storage credentials.
#[derive(Builder, Clone, Debug, Deserialize, PartialEq, Validate)]
#[builder(setter(into), build_fn(error = "BuilderError"))]
pub struct VendingRequest {
    /// Authenticated identity the credential is vended for.
    #[validate(length(max = 255))]
    pub principal: String,

    /// Catalog entity identifier (for example `metalake.catalog.table`).
    #[validate(length(min = 1, max = 255))]
    pub entity: String,

    /// Operation the credential must cover.
    pub operation: StorageOperation,

    /// Request destructive (delete) capability. Authorized separately by
    /// the catalog; plain writes never include it.
    #[builder(default)]
    #[serde(default)]
    pub with_delete: bool,

    /// Credential lifetime the caller would like, in seconds. Clamped to
    /// the provider maximum and the service ceiling.
    #[builder(default)]
    #[serde(default)]
    pub requested_lifetime_secs: Option<u64>,
}

/// A vended credential as returned to the catalog caller.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct VendingResponse {
    /// Canonical provider tag.
    pub provider: String,

    /// Provider-specific credential material as an opaque property map.
    pub credential_properties: BTreeMap<String, String>,

    /// Absolute expiry of the credential, seconds since the epoch, exposed
    /// verbatim from the upstream token service.
    pub expires_at_epoch_secs: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder_defaults() {
        let request = VendingRequestBuilder::default()
            .principal("svc-etl")
            .entity("lakehouse.sales.orders")
            .operation(StorageOperation::Read)
            .build()
            .unwrap();
        assert!(!request.with_delete);
        assert!(request.requested_lifetime_secs.is_none());
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_request_wire_shape() {
        let request: VendingRequest = serde_json::from_value(serde_json::json!({
            "principal": "svc-etl",
            "entity": "lakehouse.sales.orders",
            "operation": "read-write",
            "requested_lifetime_secs": 7200,
        }))
        .unwrap();
        assert_eq!(request.operation, StorageOperation::ReadWrite);
        assert_eq!(request.requested_lifetime_secs, Some(7200));
    }

    #[test]
    fn test_empty_entity_fails_validation() {
        let request = VendingRequestBuilder::default()
            .principal("svc-etl")
            .entity("")
            .operation(StorageOperation::Read)
            .build()
            .unwrap();
        assert!(request.validate().is_err());
    }
}
