//! Normalized asset views and request types.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Sidecar metadata: string keys to scalar values.
pub type Metadata = BTreeMap<String, Value>;

/// Stable view of a stored image asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AssetView {
    /// Flat key the store addresses the asset by
    pub public_id: String,
    /// Plain delivery URL
    pub url: String,
    /// HTTPS delivery URL
    pub secure_url: String,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Stored format (e.g. "jpg")
    pub format: String,
    /// Size in bytes
    pub bytes: u64,
    /// Creation time reported by the store
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Sidecar metadata (never absent; empty when the store has none)
    #[serde(default)]
    pub metadata: Metadata,
    /// Untransformed remote payload
    pub raw: Value,
}

/// Result of an upload, shaped leniently from the upload response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CreatedAsset {
    pub public_id: String,
    /// Secure URL when the store returned one, otherwise the plain URL
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub format: String,
    pub bytes: u64,
    #[serde(default)]
    pub metadata: Metadata,
    pub raw: Value,
}

/// One page of a folder listing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct AssetPage {
    pub assets: Vec<AssetView>,
    /// Opaque cursor for the next page, passed back unmodified
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Where the bytes of an upload come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AssetSource {
    /// Remote http(s) URL fetched by the store
    Url(String),
    /// Local file path
    Path(PathBuf),
    /// Raw bytes
    Bytes(Vec<u8>),
    /// Base64 `data:` URI
    DataUri(String),
}

impl fmt::Display for AssetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetSource::Url(url) => write!(f, "url:{}", url),
            AssetSource::Path(path) => write!(f, "path:{}", path.display()),
            AssetSource::Bytes(bytes) => write!(f, "bytes:{}", bytes.len()),
            AssetSource::DataUri(uri) => write!(f, "data-uri:{}", uri.len()),
        }
    }
}

/// Request to create a new asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CreateAssetRequest {
    pub source: AssetSource,
    /// Raw folder path; normalized before use
    pub folder: String,
    /// Raw name; normalized before use
    pub name: String,
    #[serde(default)]
    pub prefix: Option<String>,
    /// Caller metadata; must not use the reserved identity keys
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl CreateAssetRequest {
    pub fn new(source: AssetSource, folder: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            source,
            folder: folder.into(),
            name: name.into(),
            prefix: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Request for one page of a folder listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ListAssetsRequest {
    pub folder: String,
    /// Include assets in nested folders
    #[serde(default)]
    pub recursive: bool,
    /// Page size, 1..=100
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub cursor: Option<String>,
}

fn default_limit() -> u32 {
    30
}

impl ListAssetsRequest {
    pub fn new(folder: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            recursive: false,
            limit: default_limit(),
            cursor: None,
        }
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn cursor(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }
}
