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
//! # Expiry governor
//!
//! Pure lifetime policy. The effective lifetime of a credential is the
//! minimum of what the caller requested, what the provider's token service
//! supports and the service-wide ceiling. The refresh threshold of a cached
//! credential is its expiry minus the configured safety margin, so a
//! credential served from cache always has usable lifetime left.

use chrono::{DateTime, TimeDelta, Utc};

use crate::config::Config;

#[derive(Clone, Copy, Debug)]
pub struct ExpiryGovernor {
    lifetime_ceiling: u64,
    safety_margin: TimeDelta,
}

impl ExpiryGovernor {
    pub fn new(config: &Config) -> Self {
        Self {
            lifetime_ceiling: config.vending.lifetime_ceiling,
            safety_margin: TimeDelta::seconds(config.vending.safety_margin as i64),
        }
    }

    /// Lifetime (seconds) a credential will actually be requested for.
    ///
    /// `min(requested, provider_max, ceiling)`; an absent request defaults
    /// to the ceiling.
    pub fn effective_lifetime(&self, requested: Option<u64>, provider_max: u64) -> u64 {
        requested
            .unwrap_or(self.lifetime_ceiling)
            .min(provider_max)
            .min(self.lifetime_ceiling)
    }

    /// Instant after which a cached credential must no longer be served.
    pub fn refresh_at(&self, expires_at: DateTime<Utc>) -> DateTime<Utc> {
        expires_at - self.safety_margin
    }

    pub const fn safety_margin(&self) -> TimeDelta {
        self.safety_margin
    }
}
