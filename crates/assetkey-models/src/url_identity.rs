//! Delivery URL parsing back into a logical asset path.
//!
//! Delivery URLs look like
//! `https://res.cloudinary.com/<cloud>/image/upload/[transformations/][v123/]folder/name.ext`.
//! Everything before `/upload/` is routing; after it, any mix of version
//! and transformation segments may precede the real asset path.
//!
//! # Security
//! - URLs are treated as untrusted input
//! - Only the configured delivery host is accepted

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ValidationError, ValidationResult};

/// Default delivery host of the asset store.
pub const DEFAULT_DELIVERY_HOST: &str = "res.cloudinary.com";

/// Path marker separating store routing from the asset path.
const UPLOAD_MARKER: &str = "/upload/";

/// Transformation parameter keys recognised in delivery URLs.
const TRANSFORMATION_KEYS: &[&str] = &[
    "a", "ac", "af", "ar", "b", "bo", "br", "c", "co", "cs", "d", "dl", "dn", "dpr", "du", "e",
    "eo", "f", "fl", "fn", "fps", "g", "h", "if", "ki", "l", "o", "p", "pg", "q", "r", "so", "sp",
    "t", "u", "vc", "vs", "w", "x", "y", "z",
];

/// Identity recovered from a delivery URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct UrlIdentity {
    /// `folder/file_name`, or just `file_name` at the root
    pub public_id: String,
    /// Folder path; empty for the root
    pub folder: String,
    /// Final path segment without its extension
    pub file_name: String,
    /// Extension of the final segment, if any
    pub format: Option<String>,
}

/// Parser bound to one delivery host.
#[derive(Debug, Clone)]
pub struct UrlIdentityParser {
    host: String,
}

impl Default for UrlIdentityParser {
    fn default() -> Self {
        Self::new(DEFAULT_DELIVERY_HOST)
    }
}

impl UrlIdentityParser {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into().trim().to_ascii_lowercase(),
        }
    }

    /// Host this parser accepts.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Parse a delivery URL into its identity.
    pub fn parse(&self, raw_url: &str) -> ValidationResult<UrlIdentity> {
        let trimmed = raw_url.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::invalid_url("URL is empty"));
        }

        let url = Url::parse(trimmed)
            .map_err(|e| ValidationError::invalid_url(format!("{}: {}", trimmed, e)))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ValidationError::invalid_url(format!(
                "unsupported scheme `{}`",
                url.scheme()
            )));
        }

        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        if host != self.host {
            return Err(ValidationError::invalid_url(format!(
                "host `{}` is not the asset delivery host",
                host
            )));
        }

        let path = url.path();
        let start = path
            .find(UPLOAD_MARKER)
            .map(|pos| pos + UPLOAD_MARKER.len())
            .ok_or_else(|| ValidationError::invalid_url("missing `/upload/` path marker"))?;

        let segments: Vec<&str> = path[start..].split('/').filter(|s| !s.is_empty()).collect();
        let asset_start = leading_delivery_segments(&segments);

        let decoded = segments[asset_start..]
            .iter()
            .copied()
            .map(decode_segment)
            .collect::<ValidationResult<Vec<_>>>()?;

        let (last, dirs) = decoded
            .split_last()
            .ok_or_else(|| ValidationError::invalid_url("URL has no asset path"))?;

        let (file_name, format) = split_extension(last);
        if file_name.is_empty() {
            return Err(ValidationError::invalid_url("URL has an empty file name"));
        }

        let folder = dirs.join("/");
        let public_id = if folder.is_empty() {
            file_name.to_string()
        } else {
            format!("{}/{}", folder, file_name)
        };

        Ok(UrlIdentity {
            public_id,
            folder,
            file_name: file_name.to_string(),
            format: format.map(str::to_string),
        })
    }
}

/// Parse a URL hosted on the default delivery host.
pub fn parse_url_to_identity(url: &str) -> ValidationResult<UrlIdentity> {
    UrlIdentityParser::default().parse(url)
}

/// Count of transformation segments and the version segment ahead of the
/// asset path. Nothing after the version is skipped, and the last segment is
/// always part of the asset.
fn leading_delivery_segments(segments: &[&str]) -> usize {
    let mut skipped = 0;
    for segment in segments.iter().take(segments.len().saturating_sub(1)) {
        if is_version_segment(segment) {
            return skipped + 1;
        }
        if !is_transformation_segment(segment) {
            break;
        }
        skipped += 1;
    }
    skipped
}

/// `v` followed only by digits.
fn is_version_segment(segment: &str) -> bool {
    segment
        .strip_prefix('v')
        .map(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false)
}

/// Comma-separated `key_value` tokens using known transformation keys.
fn is_transformation_segment(segment: &str) -> bool {
    segment.split(',').all(is_transformation_token)
}

fn is_transformation_token(token: &str) -> bool {
    match token.split_once('_') {
        Some((key, value)) => !value.is_empty() && TRANSFORMATION_KEYS.contains(&key),
        None => false,
    }
}

fn decode_segment(segment: &str) -> ValidationResult<String> {
    urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .map_err(|e| ValidationError::invalid_url(format!("bad path encoding: {}", e)))
}

/// Split `name.ext` on the last dot; a leading or trailing dot is not an extension.
fn split_extension(segment: &str) -> (&str, Option<&str>) {
    match segment.rfind('.') {
        Some(pos) if pos > 0 && pos + 1 < segment.len() => {
            (&segment[..pos], Some(&segment[pos + 1..]))
        }
        _ => (segment, None),
    }
}
