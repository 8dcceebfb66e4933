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

//! # Credential vending for multi-cloud catalogs
//!
//! A metadata catalog knows that principal P may read or write table T, and
//! it knows that the table's data lives at some cloud storage location L.
//! What the catalog must never do is hand its own long-lived cloud identity
//! to the client that wants the data. This crate implements the piece in
//! between: it converts a catalog-level authorization decision into a
//! short-lived, minimally-scoped set of native cloud storage credentials
//! that a client can pass straight into a cloud SDK.
//!
//! The flow for a single vending request:
//!
//! 1. The [`engine::VendingEngine`] receives the request and resolves the
//!    target entity into a physical [`catalog::StorageLocation`] through
//!    the catalog collaborator ([`catalog::LocationApi`]).
//! 2. The [`scope::ScopeResolver`] narrows the location and the requested
//!    operation into an [`scope::AccessScope`]: paths and operations that
//!    are never broader than what the catalog authorized.
//! 3. The [`cache::CredentialCache`] is consulted; an entry is a hit only
//!    while its refresh threshold (expiry minus a configured safety
//!    margin) has not passed. Concurrent requests for the same scope
//!    collapse into a single upstream issuance (single-flight).
//! 4. On a miss, the [`issuer::IssuerProvider`] dispatches to the adapter
//!    for the location's provider tag. Each adapter exchanges the scope
//!    for a native credential through an injected base-identity
//!    capability: an assume-role call with an inline session policy for
//!    S3, a downscoped access token for GCS, a shared-access-signature
//!    for Azure blob storage.
//! 5. The credential is written through to the cache and returned with
//!    its expiry exposed verbatim.
//!
//! The crate deliberately owns no wire protocol, no catalog persistence
//! and no cloud SDK clients. Upstream token services are consumed as
//! capability traits injected by the deployment, which also keeps every
//! network dependency mockable in tests.
//!
//! Failed issuance is never retried here; cloud token services rate-limit
//! aggressively, so retry policy belongs to the caller.

pub mod cache;
pub mod catalog;
pub mod common;
pub mod config;
pub mod engine;
pub mod error;
pub mod expiry;
pub mod issuer;
pub mod scope;
