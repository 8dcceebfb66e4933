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

use std::num::NonZeroUsize;
use std::path::PathBuf;

use config::{File, FileFormat};
use eyre::{Report, WrapErr};
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

/// Configuration defects detected after parsing.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The safety margin must be strictly below every lifetime the service
    /// can hand out, otherwise a freshly issued credential would be
    /// considered stale the moment it is cached.
    #[error(
        "safety margin of {margin}s must be strictly less than the shortest \
         supported credential lifetime of {shortest}s"
    )]
    SafetyMarginTooLarge { margin: u64, shortest: u64 },

    /// A provider section sets a zero maximum lifetime.
    #[error("{section} lifetime must be greater than zero")]
    ZeroLifetime { section: String },
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    /// Credential lifetime and refresh policy.
    #[serde(default)]
    pub vending: VendingSection,

    /// Credential cache sizing.
    #[serde(default)]
    pub cache: CacheSection,

    /// S3-compatible backend. Absent means the provider is not vendable.
    #[serde(default)]
    pub s3: Option<S3Section>,

    /// Google Cloud Storage backend.
    #[serde(default)]
    pub gcs: Option<GcsSection>,

    /// Azure blob storage backend.
    #[serde(default)]
    pub azure: Option<AzureSection>,
}

/// Lifetime policy applied to every vended credential.
#[derive(Clone, Debug, Deserialize)]
pub struct VendingSection {
    /// Service-wide ceiling on credential lifetime (seconds). The effective
    /// lifetime of any credential is the minimum of the caller's request,
    /// the provider's maximum and this ceiling.
    pub lifetime_ceiling: u64,

    /// Buffer (seconds) subtracted from a credential's expiry to form its
    /// cache refresh threshold, so that a credential served from cache is
    /// never observed to expire mid-use.
    pub safety_margin: u64,
}

impl Default for VendingSection {
    fn default() -> Self {
        Self {
            lifetime_ceiling: 3600,
            safety_margin: 300,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct CacheSection {
    /// Entry-count ceiling; least-recently-used entries are evicted beyond
    /// it.
    pub capacity: NonZeroUsize,
}

const DEFAULT_CACHE_CAPACITY: NonZeroUsize = match NonZeroUsize::new(1000) {
    Some(capacity) => capacity,
    None => unreachable!(),
};

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

/// S3-compatible backend settings.
#[derive(Clone, Debug, Deserialize)]
pub struct S3Section {
    /// Role assumed with an inline session policy to mint scoped
    /// credentials.
    pub role_arn: String,

    /// Region hint passed through to the token exchange.
    #[serde(default)]
    pub region: Option<String>,

    /// STS caps session duration per role; requested lifetimes are clamped
    /// to this.
    #[serde(default = "default_s3_session_duration")]
    pub max_session_duration: u64,

    /// External id presented on assume-role, when the role trust policy
    /// demands one.
    #[serde(default)]
    pub external_id: Option<SecretString>,

    /// KMS key that vended scopes must be constrained to for server-side
    /// encryption.
    #[serde(default)]
    pub kms_key_id: Option<String>,
}

fn default_s3_session_duration() -> u64 {
    3600
}

/// Google Cloud Storage backend settings.
#[derive(Clone, Debug, Deserialize)]
pub struct GcsSection {
    /// Service account impersonated to mint downscoped tokens.
    pub service_account: String,

    /// Maximum access-token lifetime supported by the token broker.
    #[serde(default = "default_gcs_lifetime")]
    pub max_lifetime: u64,
}

fn default_gcs_lifetime() -> u64 {
    3600
}

/// Azure blob storage backend settings.
#[derive(Clone, Debug, Deserialize)]
pub struct AzureSection {
    /// Storage account the SAS tokens are issued for.
    pub account: String,

    /// Maximum SAS lifetime this service will issue.
    #[serde(default = "default_azure_lifetime")]
    pub max_lifetime: u64,
}

fn default_azure_lifetime() -> u64 {
    3600
}

impl Config {
    pub fn new(path: PathBuf) -> Result<Self, Report> {
        let mut builder = config::Config::builder();

        if std::path::Path::new(&path).is_file() {
            builder = builder.add_source(File::from(path).format(FileFormat::Ini));
        }

        builder.try_into()
    }

    /// Shortest lifetime any configured backend can produce.
    pub fn shortest_lifetime(&self) -> u64 {
        let mut shortest = self.vending.lifetime_ceiling;
        if let Some(s3) = &self.s3 {
            shortest = shortest.min(s3.max_session_duration);
        }
        if let Some(gcs) = &self.gcs {
            shortest = shortest.min(gcs.max_lifetime);
        }
        if let Some(azure) = &self.azure {
            shortest = shortest.min(azure.max_lifetime);
        }
        shortest
    }

    /// Cross-section invariants that the deserializer cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.vending.lifetime_ceiling == 0 {
            return Err(ConfigError::ZeroLifetime {
                section: "vending".into(),
            });
        }
        for (section, lifetime) in [
            ("s3", self.s3.as_ref().map(|s| s.max_session_duration)),
            ("gcs", self.gcs.as_ref().map(|s| s.max_lifetime)),
            ("azure", self.azure.as_ref().map(|s| s.max_lifetime)),
        ] {
            if lifetime == Some(0) {
                return Err(ConfigError::ZeroLifetime {
                    section: section.into(),
                });
            }
        }

        let shortest = self.shortest_lifetime();
        if self.vending.safety_margin >= shortest {
            return Err(ConfigError::SafetyMarginTooLarge {
                margin: self.vending.safety_margin,
                shortest,
            });
        }
        Ok(())
    }
}

impl TryFrom<config::ConfigBuilder<config::builder::DefaultState>> for Config {
    type Error = Report;
    fn try_from(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, Self::Error> {
        let mut builder = builder;
        builder = builder
            .set_default("vending.lifetime_ceiling", "3600")?
            .set_default("vending.safety_margin", "300")?
            .set_default("cache.capacity", "1000")?;

        builder
            .build()
            .wrap_err("Failed to read configuration file")?
            .try_deserialize()
            .wrap_err("Failed to parse configuration file")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: Config = Config::try_from(config::Config::builder()).unwrap();
        assert_eq!(config.vending.lifetime_ceiling, 3600);
        assert_eq!(config.vending.safety_margin, 300);
        assert_eq!(config.cache.capacity.get(), 1000);
        assert!(config.s3.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_provider_sections() {
        let builder = config::Config::builder()
            .set_override("s3.role_arn", "arn:aws:iam::123456789012:role/vendor")
            .unwrap()
            .set_override("s3.max_session_duration", "900")
            .unwrap()
            .set_override("gcs.service_account", "vendor@prj.iam.gserviceaccount.com")
            .unwrap();
        let config = Config::try_from(builder).expect("can build a valid config");

        let s3 = config.s3.as_ref().unwrap();
        assert_eq!(s3.role_arn, "arn:aws:iam::123456789012:role/vendor");
        assert_eq!(s3.max_session_duration, 900);
        assert!(s3.external_id.is_none());
        assert_eq!(config.gcs.as_ref().unwrap().max_lifetime, 3600);
        assert_eq!(config.shortest_lifetime(), 900);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_safety_margin_must_undercut_shortest_lifetime() {
        let builder = config::Config::builder()
            .set_override("s3.role_arn", "arn:aws:iam::123456789012:role/vendor")
            .unwrap()
            .set_override("s3.max_session_duration", "300")
            .unwrap();
        let config = Config::try_from(builder).unwrap();

        match config.validate() {
            Err(ConfigError::SafetyMarginTooLarge { margin, shortest }) => {
                assert_eq!(margin, 300);
                assert_eq!(shortest, 300);
            }
            other => panic!("expected SafetyMarginTooLarge, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_lifetime_rejected() {
        let builder = config::Config::builder()
            .set_override("azure.account", "lakestore")
            .unwrap()
            .set_override("azure.max_lifetime", "0")
            .unwrap();
        let config = Config::try_from(builder).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroLifetime { .. })
        ));
    }
}
