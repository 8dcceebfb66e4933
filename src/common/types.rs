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
//! # Common types

use serde::{Deserialize, Serialize};

/// Storage backend family a credential can be issued against.
///
/// Parsed from the provider tag the catalog records on a storage location.
/// The tag set is deliberately closed: an unknown tag must surface as
/// `ProviderUnsupported` to the caller and never fall back to a default
/// backend.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// S3-compatible object storage (STS session credentials).
    S3,
    /// Google Cloud Storage (downscoped access tokens).
    Gcs,
    /// Azure blob storage (shared access signatures).
    Azure,
}

impl ProviderKind {
    /// Parse the provider tag recorded in catalog metadata.
    ///
    /// Accepts the scheme aliases commonly seen in table locations
    /// (`s3a://`, `gs://`, `abfss://`).
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "s3" | "s3a" => Some(Self::S3),
            "gcs" | "gs" => Some(Self::Gcs),
            "abfs" | "abfss" | "wasb" => Some(Self::Azure),
            _ => None,
        }
    }

    /// Canonical tag used in responses and cache keys.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::S3 => "s3",
            Self::Gcs => "gcs",
            Self::Azure => "abfs",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
