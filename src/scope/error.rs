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
//! Scope resolver errors.

use thiserror::Error;

use crate::common::types::ProviderKind;

/// Scope resolver error.
#[derive(Debug, Error)]
pub enum ScopeResolverError {
    /// The operation cannot be narrowed to a least-privilege scope on this
    /// provider.
    #[error("operation {operation} cannot be scoped on provider {provider}")]
    Denied {
        provider: ProviderKind,
        operation: String,
    },

    /// The catalog handed over a location this resolver cannot scope.
    #[error("storage location is malformed: {0}")]
    MalformedLocation(String),
}
