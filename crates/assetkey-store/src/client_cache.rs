//! Client handle cache keyed by credential fingerprint.
//!
//! A composition root builds one store client per distinct credential set
//! and hands out clones. Handles are read-only after construction, so the
//! same handle is shared by concurrent operations.

use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::debug;

use crate::config::StoreConfig;
use crate::error::AssetResult;

/// Lazily built client handles, one per credential fingerprint.
pub struct ClientCache<C> {
    clients: RwLock<HashMap<String, C>>,
}

impl<C: Clone> ClientCache<C> {
    pub fn new() -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// Return the handle for `config`, building it on first use.
    ///
    /// The config is validated first, so a bad credential set never reaches
    /// `build`. Concurrent first calls for the same fingerprint build once.
    pub async fn get_or_init<F>(&self, config: &StoreConfig, build: F) -> AssetResult<C>
    where
        F: FnOnce(&StoreConfig) -> AssetResult<C>,
    {
        config.validate()?;
        let fingerprint = config.fingerprint();

        {
            let clients = self.clients.read().await;
            if let Some(client) = clients.get(&fingerprint) {
                return Ok(client.clone());
            }
        }

        let mut clients = self.clients.write().await;
        // Another task may have built it while we waited for the write lock
        if let Some(client) = clients.get(&fingerprint) {
            return Ok(client.clone());
        }

        debug!(cloud_name = %config.cloud_name, "Building store client");
        let client = build(config)?;
        clients.insert(fingerprint, client.clone());
        Ok(client)
    }

    /// Number of cached handles.
    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.read().await.is_empty()
    }
}

impl<C: Clone> Default for ClientCache<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::error::AssetError;

    #[tokio::test]
    async fn test_builds_once_per_fingerprint() {
        let cache: ClientCache<Arc<String>> = ClientCache::new();
        let builds = AtomicUsize::new(0);
        let build = |config: &StoreConfig| {
            builds.fetch_add(1, Ordering::SeqCst);
            Ok::<_, AssetError>(Arc::new(config.cloud_name.clone()))
        };

        let config = StoreConfig::new("demo", "key", "secret");
        let first = cache.get_or_init(&config, build).await.unwrap();
        let second = cache.get_or_init(&config, build).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(builds.load(Ordering::SeqCst), 1);

        let other = StoreConfig::new("demo", "key", "rotated");
        cache.get_or_init(&other, build).await.unwrap();
        assert_eq!(builds.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn test_invalid_config_is_not_built() {
        let cache: ClientCache<u8> = ClientCache::default();
        let err = cache
            .get_or_init(&StoreConfig::new("", "key", "secret"), |_| Ok(1))
            .await
            .unwrap_err();
        assert!(matches!(err, AssetError::Configuration(_)));
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_build_error_propagates() {
        let cache: ClientCache<u8> = ClientCache::new();
        let err = cache
            .get_or_init(&StoreConfig::new("demo", "key", "secret"), |_| {
                Err(AssetError::configuration("client rejected credentials"))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AssetError::Configuration(_)));
        assert!(cache.is_empty().await);
    }
}
