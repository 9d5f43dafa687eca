//! Store configuration.

use std::fmt;

use sha2::{Digest, Sha256};

use assetkey_models::DEFAULT_DELIVERY_HOST;

use crate::error::{AssetError, AssetResult};

/// Credentials and delivery settings for one store account.
#[derive(Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Account (cloud) name
    pub cloud_name: String,
    /// API key
    pub api_key: String,
    /// API secret
    pub api_secret: String,
    /// Host serving delivery URLs
    pub delivery_host: String,
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("cloud_name", &self.cloud_name)
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .field("delivery_host", &self.delivery_host)
            .finish()
    }
}

impl StoreConfig {
    pub fn new(
        cloud_name: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            cloud_name: cloud_name.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            delivery_host: DEFAULT_DELIVERY_HOST.to_string(),
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> AssetResult<Self> {
        let config = Self {
            cloud_name: required_env("ASSET_STORE_CLOUD_NAME")?,
            api_key: required_env("ASSET_STORE_API_KEY")?,
            api_secret: required_env("ASSET_STORE_API_SECRET")?,
            delivery_host: std::env::var("ASSET_STORE_DELIVERY_HOST")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_DELIVERY_HOST.to_string()),
        };
        config.validate()?;
        Ok(config)
    }

    /// Fail before any call if a credential is blank.
    pub fn validate(&self) -> AssetResult<()> {
        for (name, value) in [
            ("cloud_name", &self.cloud_name),
            ("api_key", &self.api_key),
            ("api_secret", &self.api_secret),
            ("delivery_host", &self.delivery_host),
        ] {
            if value.trim().is_empty() {
                return Err(AssetError::configuration(format!("{} cannot be empty", name)));
            }
        }
        Ok(())
    }

    /// Stable fingerprint of the credential set (SHA-256, hex).
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.cloud_name.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.api_key.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.api_secret.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

fn required_env(name: &str) -> AssetResult<String> {
    std::env::var(name)
        .map_err(|_| AssetError::configuration(format!("{} not set", name)))
}
