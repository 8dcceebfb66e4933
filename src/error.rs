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
//! # Error
//!
//! Errors crossing the vending engine boundary. Provider adapters translate
//! every upstream failure into this taxonomy before it leaves the engine;
//! no provider-specific error shape is ever surfaced to a caller. Error
//! values are constructed from pre-redacted fields only, so no failure path
//! can embed secret material in a message or a log line.

use serde::Serialize;
use thiserror::Error;

use crate::catalog::CatalogError;
use crate::config::ConfigError;
use crate::issuer::IssuerError;
use crate::scope::ScopeResolverError;

/// Structure builder error.
#[derive(Debug, Error)]
#[error("builder error: {source}")]
pub struct BuilderError {
    #[from]
    source: derive_builder::UninitializedFieldError,
}

/// Vending error.
#[derive(Debug, Error)]
pub enum VendorError {
    /// The catalog collaborator could not map the entity to a physical
    /// location. Not retried here.
    #[error("no storage location resolved for entity {0}")]
    LocationUnresolved(String),

    /// The request carries no authenticated principal.
    #[error("request carries no authenticated principal")]
    PrincipalMissing,

    /// The requested operation cannot be represented as a narrowed scope
    /// for the provider. The caller should fall back to proxied I/O.
    #[error("{source}; fall back to proxied I/O for this operation")]
    ScopeDenied {
        #[from]
        source: ScopeResolverError,
    },

    /// Unknown or misconfigured provider tag. Logged as a configuration
    /// defect; never silently defaulted.
    #[error("provider tag {0:?} is not supported")]
    ProviderUnsupported(String),

    /// The upstream token service rejected the exchange or was
    /// unreachable. Retrying (with backoff) is the caller's decision.
    #[error(transparent)]
    IssuanceFailed {
        #[from]
        source: IssuerError,
    },

    /// Catalog collaborator failure while resolving the location.
    #[error(transparent)]
    Catalog {
        #[from]
        source: CatalogError,
    },

    /// Service configuration is unusable.
    #[error(transparent)]
    Config {
        #[from]
        source: ConfigError,
    },

    /// Malformed request fields.
    #[error("request validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error(transparent)]
    StructBuilder(#[from] BuilderError),
}

/// Wire-level error classification exposed to callers.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum ErrorKind {
    LocationUnresolved,
    PrincipalMissing,
    ScopeDenied,
    ProviderUnsupported,
    IssuanceFailed,
}

impl VendorError {
    /// Classify the error for the response taxonomy.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::LocationUnresolved(..) | Self::Catalog { .. } => ErrorKind::LocationUnresolved,
            Self::PrincipalMissing | Self::Validation(..) | Self::StructBuilder(..) => {
                ErrorKind::PrincipalMissing
            }
            Self::ScopeDenied { .. } => ErrorKind::ScopeDenied,
            Self::ProviderUnsupported(..) | Self::Config { .. } => ErrorKind::ProviderUnsupported,
            Self::IssuanceFailed { .. } => ErrorKind::IssuanceFailed,
        }
    }
}

/// Structured error returned to the catalog caller.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ErrorResponse {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&VendorError> for ErrorResponse {
    fn from(error: &VendorError) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}
