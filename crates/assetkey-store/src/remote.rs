//! Remote media store collaborator.
//!
//! The store is reached through an opaque client. Its responses are
//! untrusted JSON payloads; every consumer normalizes them before use.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use assetkey_models::AssetSource;

/// Resource kind every operation in this layer targets.
pub const RESOURCE_KIND_IMAGE: &str = "image";

/// Result type for raw collaborator calls.
pub type RemoteResult<T> = Result<T, RemoteFailure>;

/// Error shape reported by the remote client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RemoteFailure {
    /// HTTP status, when the failure came from a response
    pub status: Option<u16>,
    /// Transport error code (e.g. `ETIMEDOUT`)
    pub code: Option<String>,
    pub message: String,
}

impl RemoteFailure {
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            code: None,
            message: message.into(),
        }
    }

    pub fn network(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: None,
            code: Some(code.into()),
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self {
            status: None,
            code: None,
            message: message.into(),
        }
    }
}

/// Upload parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadParams {
    /// Folder, when the public id is folder-relative
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
    pub public_id: String,
    pub overwrite: bool,
    /// Sidecar metadata, string-valued
    pub context: BTreeMap<String, String>,
}

/// Listing parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListParams {
    pub prefix: String,
    pub max_results: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Operations the remote media store exposes.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Upload bytes from `source` under the given key.
    async fn upload(&self, source: &AssetSource, params: &UploadParams) -> RemoteResult<Value>;

    /// Delete a resource; responds with `{"result": "ok" | "not found" | ...}`.
    async fn destroy(&self, key: &str, resource_kind: &str) -> RemoteResult<Value>;

    /// Move a resource to a new key.
    async fn rename(&self, from: &str, to: &str, overwrite: bool) -> RemoteResult<Value>;

    /// Fetch one resource, optionally with its context metadata.
    async fn fetch_one(&self, key: &str, with_context: bool) -> RemoteResult<Value>;

    /// Replace a resource's context metadata without moving bytes.
    async fn update(&self, key: &str, context: &BTreeMap<String, String>) -> RemoteResult<Value>;

    /// List resources under a key prefix.
    async fn list(&self, params: &ListParams) -> RemoteResult<Value>;
}
