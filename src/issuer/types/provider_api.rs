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

use async_trait::async_trait;

use crate::common::types::ProviderKind;
use crate::issuer::error::IssuerError;
use crate::issuer::types::VendedCredential;
use crate::scope::AccessScope;

#[async_trait]
pub trait IssuerApi: Send + Sync {
    /// Whether a backend is configured for the provider.
    fn supports(&self, provider: ProviderKind) -> bool;

    /// Maximum lifetime the provider's backend will issue for.
    fn max_lifetime_secs(&self, provider: ProviderKind) -> Option<u64>;

    /// Issue a credential for the scope through the provider's backend.
    async fn issue_credential<'a>(
        &self,
        provider: ProviderKind,
        scope: &'a AccessScope,
        principal: &'a str,
        lifetime_secs: u64,
    ) -> Result<VendedCredential, IssuerError>;
}
