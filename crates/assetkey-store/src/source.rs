//! Upload source checks run before any network call.

use std::path::Path;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::debug;
use url::Url;

use assetkey_models::{detect_image_format, AssetSource, ImageFormat};

use crate::error::{AssetError, AssetResult};

/// Access to local files referenced by [`AssetSource::Path`].
#[async_trait]
pub trait LocalSource: Send + Sync {
    /// Whether a readable file exists at `path`.
    async fn exists(&self, path: &Path) -> bool;
}

/// [`LocalSource`] backed by the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsLocalSource;

#[async_trait]
impl LocalSource for FsLocalSource {
    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::metadata(path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }
}

/// Decode the payload of a base64 `data:` URI.
pub fn decode_data_uri(uri: &str) -> AssetResult<Vec<u8>> {
    let rest = uri
        .trim()
        .strip_prefix("data:")
        .ok_or_else(|| AssetError::invalid("source", "data URI must start with `data:`"))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| AssetError::invalid("source", "data URI has no payload"))?;
    if !header.split(';').any(|part| part.eq_ignore_ascii_case("base64")) {
        return Err(AssetError::invalid("source", "data URI must be base64-encoded"));
    }
    STANDARD
        .decode(payload.trim())
        .map_err(|e| AssetError::invalid("source", format!("data URI payload: {}", e)))
}

/// Reject sources that cannot possibly produce an image upload.
///
/// Returns the sniffed format for in-memory payloads.
pub async fn preflight_source<L: LocalSource + ?Sized>(
    source: &AssetSource,
    local: &L,
) -> AssetResult<Option<ImageFormat>> {
    match source {
        AssetSource::Url(raw) => {
            let url = Url::parse(raw.trim())
                .map_err(|e| AssetError::invalid("source", format!("bad source URL: {}", e)))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(AssetError::invalid(
                    "source",
                    format!("unsupported source URL scheme `{}`", url.scheme()),
                ));
            }
            Ok(None)
        }
        AssetSource::Path(path) => {
            if !local.exists(path).await {
                return Err(AssetError::invalid(
                    "source",
                    format!("file does not exist: {}", path.display()),
                ));
            }
            Ok(None)
        }
        AssetSource::Bytes(bytes) => sniff(bytes).map(Some),
        AssetSource::DataUri(uri) => sniff(&decode_data_uri(uri)?).map(Some),
    }
}

fn sniff(bytes: &[u8]) -> AssetResult<ImageFormat> {
    let format = detect_image_format(bytes)
        .ok_or_else(|| AssetError::invalid("source", "payload is not a supported image"))?;
    debug!(format = %format, size = bytes.len(), "Sniffed upload payload");
    Ok(format)
}
