//! Shared models for the assetkey media layer.
//!
//! This crate provides pure, synchronous building blocks:
//! - Logical identity (folder, name, prefix) and flat-key codec
//! - Image format sniffing from magic bytes
//! - Delivery URL parsing back into an identity
//! - Normalized asset views and request types

pub mod asset;
pub mod error;
pub mod format;
pub mod identity;
pub mod url_identity;
pub mod utils;

// Re-export common types
pub use asset::{
    AssetPage, AssetSource, AssetView, CreateAssetRequest, CreatedAsset, ListAssetsRequest,
    Metadata,
};
pub use error::{ValidationError, ValidationResult};
pub use format::{classify_buffer_as_image, detect_image_format, is_supported_image, ImageFormat};
pub use identity::{
    build_key, build_key_from_identity, decode_stored_identity, normalize_folder_path,
    normalize_segment, validate_flat_key, validate_folder_path, AssetKey, LogicalIdentity,
    PREFIX_SEPARATOR, RESERVED_METADATA_KEYS,
};
pub use url_identity::{parse_url_to_identity, UrlIdentity, UrlIdentityParser, DEFAULT_DELIVERY_HOST};
