//! Caller-facing asset operations.

use std::sync::Arc;

use tracing::{debug, info, warn};

use assetkey_models::{
    build_key, classify_buffer_as_image, validate_flat_key, validate_folder_path, AssetPage,
    AssetSource, AssetView, CreateAssetRequest, CreatedAsset, ListAssetsRequest, Metadata,
    UrlIdentity, UrlIdentityParser, RESERVED_METADATA_KEYS,
};
use serde_json::Value;

use crate::config::StoreConfig;
use crate::error::{classify, AssetError, AssetResult, FailureCause, Operation};
use crate::metrics::observe_call;
use crate::normalize::{
    fetch_view, is_not_found_payload, metadata_to_context, normalize_created, normalize_listed,
    split_listing,
};
use crate::orchestrator::{Mutation, MutationOrchestrator, PrefixMode};
use crate::remote::{ListParams, RemoteStore, UploadParams, RESOURCE_KIND_IMAGE};
use crate::source::{preflight_source, FsLocalSource, LocalSource};

/// Largest page a listing may request.
pub const MAX_LIST_LIMIT: u32 = 100;

/// Asset operations over an injected store client.
pub struct AssetService<S: RemoteStore, L: LocalSource = FsLocalSource> {
    store: Arc<S>,
    local: L,
    url_parser: UrlIdentityParser,
}

impl<S: RemoteStore, L: LocalSource + Clone> Clone for AssetService<S, L> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            local: self.local.clone(),
            url_parser: self.url_parser.clone(),
        }
    }
}

impl<S: RemoteStore> AssetService<S> {
    /// Create a service reading local sources from the filesystem.
    pub fn new(store: Arc<S>) -> Self {
        Self::with_local_source(store, FsLocalSource)
    }

    /// Create a service whose URL parser follows `config.delivery_host`.
    pub fn from_config(store: Arc<S>, config: &StoreConfig) -> AssetResult<Self> {
        config.validate()?;
        Ok(Self::new(store).with_delivery_host(config.delivery_host.clone()))
    }
}

impl<S: RemoteStore, L: LocalSource> AssetService<S, L> {
    pub fn with_local_source(store: Arc<S>, local: L) -> Self {
        Self {
            store,
            local,
            url_parser: UrlIdentityParser::default(),
        }
    }

    pub fn with_delivery_host(mut self, host: impl Into<String>) -> Self {
        self.url_parser = UrlIdentityParser::new(host);
        self
    }

    /// The injected store client.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    // =========================================================================
    // Create / replace / delete
    // =========================================================================

    /// Upload a new asset under a freshly built identity.
    ///
    /// Never overwrites: an existing asset at the same key is an upload error.
    pub async fn create_asset(&self, request: CreateAssetRequest) -> AssetResult<CreatedAsset> {
        let key = build_key(&request.folder, &request.name, request.prefix.as_deref())?;
        let flat_key = key.flat_key();

        if let Some(reserved) = request
            .metadata
            .keys()
            .find(|k| RESERVED_METADATA_KEYS.contains(&k.as_str()))
        {
            return Err(AssetError::invalid(
                "metadata",
                format!("`{}` is reserved for the asset identity", reserved),
            ));
        }

        preflight_source(&request.source, &self.local).await?;

        let mut context = request.metadata.clone();
        context.extend(key.identity().to_metadata());

        let params = UploadParams {
            folder: Some(key.folder.clone()),
            public_id: key.public_id.clone(),
            overwrite: false,
            context,
        };

        debug!(key = %flat_key, source = %request.source, "Uploading asset");
        let raw = observe_call("upload", self.store.upload(&request.source, &params))
            .await
            .map_err(|failure| classify(Operation::Upload { key: &flat_key }, failure))?;

        info!(key = %flat_key, "Created asset");
        Ok(normalize_created(raw, &flat_key, &string_metadata(&params)))
    }

    /// Replace the bytes of an existing asset, keeping its key and metadata.
    pub async fn replace_asset_bytes(
        &self,
        key: &str,
        source: AssetSource,
    ) -> AssetResult<CreatedAsset> {
        validate_flat_key(key)?;
        preflight_source(&source, &self.local).await?;

        let current = self.fetch_asset(key).await?;
        let context = metadata_to_context(&current.metadata);

        // Full key as public id; the flat key is never split into parts.
        let params = UploadParams {
            folder: None,
            public_id: key.to_string(),
            overwrite: true,
            context,
        };

        debug!(key = %key, source = %source, "Replacing asset bytes");
        let raw = observe_call("upload", self.store.upload(&source, &params))
            .await
            .map_err(|failure| classify(Operation::Replace { key }, failure))?;

        info!(key = %key, "Replaced asset bytes");
        Ok(normalize_created(raw, key, &current.metadata))
    }

    /// Delete an asset.
    pub async fn delete_asset(&self, key: &str) -> AssetResult<()> {
        validate_flat_key(key)?;

        let raw = observe_call("destroy", self.store.destroy(key, RESOURCE_KIND_IMAGE))
            .await
            .map_err(|failure| classify(Operation::Delete { key }, failure))?;

        if is_not_found_payload(&raw) {
            return Err(AssetError::not_found(key));
        }
        match raw.get("result").and_then(Value::as_str) {
            Some("ok") => {
                info!(key = %key, "Deleted asset");
                Ok(())
            }
            other => Err(AssetError::Delete {
                key: key.to_string(),
                cause: FailureCause::Rejected {
                    status: None,
                    message: format!("destroy returned {:?}", other.unwrap_or("no result")),
                },
            }),
        }
    }

    // =========================================================================
    // Identity mutations
    // =========================================================================

    /// Give an asset a new name, keeping folder and prefix.
    pub async fn rename_asset(&self, key: &str, new_name: &str) -> AssetResult<AssetView> {
        self.mutate(
            key,
            Mutation::Rename {
                name: new_name.to_string(),
            },
        )
        .await
    }

    /// Move an asset to another folder, keeping name and prefix.
    pub async fn relocate_asset(&self, key: &str, new_folder: &str) -> AssetResult<AssetView> {
        self.mutate(
            key,
            Mutation::Relocate {
                folder: new_folder.to_string(),
            },
        )
        .await
    }

    /// Change an asset's prefix.
    pub async fn change_asset_prefix(
        &self,
        key: &str,
        prefix: &str,
        mode: PrefixMode,
    ) -> AssetResult<AssetView> {
        self.mutate(
            key,
            Mutation::ChangePrefix {
                prefix: prefix.to_string(),
                mode,
            },
        )
        .await
    }

    async fn mutate(&self, key: &str, mutation: Mutation) -> AssetResult<AssetView> {
        MutationOrchestrator::new(self.store.as_ref())
            .execute(key, mutation)
            .await
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Fetch the current view of an asset.
    pub async fn fetch_asset(&self, key: &str) -> AssetResult<AssetView> {
        validate_flat_key(key)?;
        fetch_view(self.store.as_ref(), key).await
    }

    /// List one page of assets in a folder.
    ///
    /// The store applies `limit` before incomplete entries are dropped and,
    /// for non-recursive listings, before nested entries are filtered out. A
    /// page can therefore hold fewer than `limit` assets, or none, while
    /// `next_cursor` is still set; callers page until the cursor is `None`.
    pub async fn list_assets(&self, request: ListAssetsRequest) -> AssetResult<AssetPage> {
        validate_folder_path(&request.folder)?;
        if request.limit == 0 || request.limit > MAX_LIST_LIMIT {
            return Err(AssetError::invalid(
                "limit",
                format!("must be between 1 and {}", MAX_LIST_LIMIT),
            ));
        }

        let prefix = format!("{}/", request.folder);
        let params = ListParams {
            prefix: prefix.clone(),
            max_results: request.limit,
            next_cursor: request.cursor.clone(),
        };

        let raw = match observe_call("list", self.store.list(&params)).await {
            Ok(raw) => raw,
            Err(failure) if failure.status == Some(404) => {
                debug!(prefix = %prefix, "Listing returned 404, treating as empty");
                return Ok(AssetPage::default());
            }
            Err(failure) => return Err(classify(Operation::List { prefix: &prefix }, failure)),
        };

        let (entries, next_cursor) = split_listing(&raw);
        let total = entries.len();
        let assets: Vec<AssetView> = entries
            .into_iter()
            .filter_map(normalize_listed)
            .filter(|view| request.recursive || is_direct_child(&prefix, &view.public_id))
            .take(request.limit as usize)
            .collect();

        if assets.len() < total.min(request.limit as usize) {
            warn!(
                prefix = %prefix,
                returned = total,
                kept = assets.len(),
                "Dropped incomplete or nested listing entries"
            );
        }

        Ok(AssetPage {
            assets,
            next_cursor,
        })
    }

    // =========================================================================
    // Pure helpers
    // =========================================================================

    /// Parse a delivery URL into its identity.
    pub fn parse_url_to_identity(&self, url: &str) -> AssetResult<UrlIdentity> {
        Ok(self.url_parser.parse(url)?)
    }

    /// Whether a buffer looks like a supported image. Never fails.
    pub fn classify_buffer_as_image(&self, input: Option<&[u8]>) -> bool {
        classify_buffer_as_image(input)
    }
}

fn is_direct_child(prefix: &str, public_id: &str) -> bool {
    public_id
        .strip_prefix(prefix)
        .map(|rest| !rest.is_empty() && !rest.contains('/'))
        .unwrap_or(false)
}

fn string_metadata(params: &UploadParams) -> Metadata {
    params
        .context
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect()
}
