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
//! Credential issuer errors.
//!
//! Issuance failures are broadcast to every caller collapsed into the same
//! single-flight issuance, so these errors are `Clone` and carry plain
//! pre-redacted strings instead of upstream error chains. Capability
//! implementations must strip secret material before constructing an
//! [`UpstreamError`]; nothing in this module ever adds any.

use thiserror::Error;

use crate::common::types::ProviderKind;

/// Failure reported by an injected token-service capability.
#[derive(Clone, Debug, Error)]
pub enum UpstreamError {
    /// The token service rejected the exchange.
    #[error("rejected the exchange: {detail}")]
    Rejected { detail: String },

    /// The token service could not be reached.
    #[error("unreachable: {detail}")]
    Unreachable { detail: String },

    /// The token service throttled the request.
    #[error("throttled the request")]
    Throttled,
}

/// Credential issuer error.
#[derive(Clone, Debug, Error)]
pub enum IssuerError {
    /// The scope handed to the issuer grants nothing or is malformed.
    #[error("access scope is empty or malformed: {0}")]
    MalformedScope(String),

    /// The scope was resolved for a different provider than the issuer.
    #[error("scope for provider {scope} dispatched to {issuer} issuer")]
    ProviderMismatch {
        scope: ProviderKind,
        issuer: ProviderKind,
    },

    /// A provider section is configured without its base-identity
    /// capability, or the other way around.
    #[error("no base identity capability wired for provider {0}")]
    IdentityNotConfigured(ProviderKind),

    /// Credential expiry arithmetic overflowed.
    #[error("credential expiry calculation failed")]
    ExpiryCalculation,

    /// The upstream answered but the resulting credential is unusable.
    #[error("issued credential failed validation: {0}")]
    InvalidCredential(String),

    /// The single-flight issuance task terminated without reporting a
    /// result.
    #[error("issuance was interrupted before completing")]
    Interrupted,

    /// The upstream token service failed; detail is pre-redacted.
    #[error("{provider} token service {source}")]
    Upstream {
        provider: ProviderKind,
        #[source]
        source: UpstreamError,
    },
}
