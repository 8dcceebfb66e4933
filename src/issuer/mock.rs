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
//! Internal mock structures for the [IssuerProvider].

use async_trait::async_trait;
use mockall::mock;

use super::error::IssuerError;
use super::{BaseIdentities, IssuerApi, VendedCredential};
use crate::common::types::ProviderKind;
use crate::config::Config;
use crate::scope::AccessScope;

mock! {
    pub IssuerProvider {
        pub fn new(config: &Config, identities: BaseIdentities) -> Result<Self, IssuerError>;
    }

    #[async_trait]
    impl IssuerApi for IssuerProvider {
        fn supports(&self, provider: ProviderKind) -> bool;

        fn max_lifetime_secs(&self, provider: ProviderKind) -> Option<u64>;

        async fn issue_credential<'a>(
            &self,
            provider: ProviderKind,
            scope: &'a AccessScope,
            principal: &'a str,
            lifetime_secs: u64,
        ) -> Result<VendedCredential, IssuerError>;
    }
}
