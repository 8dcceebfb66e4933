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
//! # Catalog collaborator boundary
//!
//! The catalog/metadata store owns entity resolution and authorization; this
//! crate consumes it through the [`LocationApi`] trait only. A deployment
//! wires in whatever client reaches its catalog; tests wire in a mock.
//!
//! By the time a vending request reaches this crate the catalog has already
//! decided that the principal may access the entity at all. Resolution here
//! is purely "which physical location does the entity live at". A `None`
//! answer means the catalog could not map the entity and the request must
//! fail with `LocationUnresolved`.

use async_trait::async_trait;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

/// Physical storage location of a catalog entity.
///
/// Produced by the catalog collaborator, consumed read-only here.
#[derive(Builder, Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize, Validate)]
#[builder(setter(into))]
pub struct StorageLocation {
    /// Provider tag as recorded in catalog metadata ("s3", "gcs", "abfs").
    #[validate(length(min = 1, max = 64))]
    pub provider: String,

    /// Bucket or container identifier.
    #[validate(length(min = 1, max = 255))]
    pub bucket: String,

    /// Path prefix within the bucket. Empty means the bucket root.
    #[builder(default)]
    pub prefix: String,
}

/// Catalog collaborator errors.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog service could not be reached.
    #[error("catalog unavailable: {detail}")]
    Unavailable {
        /// Failure description, free of credentials by construction.
        detail: String,
    },

    /// The catalog answered with something this crate cannot interpret.
    #[error("catalog returned a malformed location for {entity}: {detail}")]
    MalformedLocation { entity: String, detail: String },
}

/// Entity-to-location resolution interface of the catalog collaborator.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LocationApi: Send + Sync {
    /// Resolve a catalog entity identifier to its storage location.
    ///
    /// Returns `Ok(None)` when the catalog knows no location for the
    /// entity.
    async fn resolve_location<'a>(
        &self,
        entity: &'a str,
    ) -> Result<Option<StorageLocation>, CatalogError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_builder() {
        let location = StorageLocationBuilder::default()
            .provider("s3")
            .bucket("lake")
            .prefix("orders/2024/")
            .build()
            .unwrap();
        assert_eq!(location.provider, "s3");
        assert_eq!(location.bucket, "lake");
        assert_eq!(location.prefix, "orders/2024/");
    }

    #[test]
    fn test_location_prefix_defaults_to_bucket_root() {
        let location = StorageLocationBuilder::default()
            .provider("gcs")
            .bucket("lake")
            .build()
            .unwrap();
        assert_eq!(location.prefix, "");
    }

    #[test]
    fn test_location_validation() {
        let location = StorageLocation {
            provider: "".into(),
            bucket: "lake".into(),
            prefix: "".into(),
        };
        assert!(location.validate().is_err());
    }
}
