//! Logical asset identity and its mapping onto the store's flat key.
//!
//! An asset is addressed remotely by a single flat key, but callers think
//! in three parts: a folder path, a name, and an optional prefix. This
//! module builds the flat key from user input and decodes the three parts
//! back from the sidecar metadata persisted on the resource.
//!
//! The flat key is never split back into its parts. Once a name or folder
//! contains a dash it is indistinguishable from the prefix separator, so the
//! stored metadata is the only reliable source for decomposition.

use std::collections::BTreeMap;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::asset::Metadata;
use crate::error::{ValidationError, ValidationResult};
use crate::utils::{check_path, check_segment, is_segment_char};

/// Separator between prefix and name inside a public id.
pub const PREFIX_SEPARATOR: &str = "--";

/// Metadata key holding the asset name.
pub const META_NAME: &str = "name";
/// Metadata key holding the folder path.
pub const META_FOLDER: &str = "folder";
/// Metadata key holding the optional prefix.
pub const META_PREFIX: &str = "prefix";

/// Metadata keys owned by the identity layer.
pub const RESERVED_METADATA_KEYS: [&str; 3] = [META_NAME, META_FOLDER, META_PREFIX];

// ============================================================================
// Types
// ============================================================================

/// Three-part logical identity layered over the flat key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct LogicalIdentity {
    /// Folder segments joined by `/`; empty for the root
    pub folder: String,
    /// Asset name segment
    pub name: String,
    /// Optional prefix segment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

impl LogicalIdentity {
    /// Public id: `prefix--name` or just `name`.
    pub fn public_id(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}{}{}", prefix, PREFIX_SEPARATOR, self.name),
            None => self.name.clone(),
        }
    }

    /// Flat key the store addresses this asset by.
    pub fn flat_key(&self) -> String {
        build_key_from_identity(self)
    }

    /// Folder path as an ordered sequence of segments.
    pub fn folder_segments(&self) -> impl Iterator<Item = &str> {
        self.folder.split('/').filter(|s| !s.is_empty())
    }

    /// Sidecar metadata fields persisted on the remote resource.
    ///
    /// An absent prefix is written as an empty string so that a resync
    /// clears any previously stored prefix.
    pub fn to_metadata(&self) -> BTreeMap<String, String> {
        let mut fields = BTreeMap::new();
        fields.insert(META_NAME.to_string(), self.name.clone());
        fields.insert(META_FOLDER.to_string(), self.folder.clone());
        fields.insert(
            META_PREFIX.to_string(),
            self.prefix.clone().unwrap_or_default(),
        );
        fields
    }
}

impl fmt::Display for LogicalIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.flat_key())
    }
}

/// Normalized key components produced by [`build_key`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AssetKey {
    pub folder: String,
    pub public_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

impl AssetKey {
    pub fn identity(&self) -> LogicalIdentity {
        LogicalIdentity {
            folder: self.folder.clone(),
            name: self.name.clone(),
            prefix: self.prefix.clone(),
        }
    }

    pub fn flat_key(&self) -> String {
        join_key(&self.folder, &self.public_id)
    }
}

// ============================================================================
// Normalization
// ============================================================================

/// Normalize a user-supplied value into a single key segment.
///
/// Trims, lowercases, turns whitespace runs into `-`, drops characters
/// outside `[a-z0-9_-]`, collapses repeated `-` and trims leading/trailing
/// `-` and `_`. Never fails; the result may be empty.
pub fn normalize_segment(value: &str) -> String {
    let lowered = value.trim().to_lowercase();

    let mut out = String::with_capacity(lowered.len());
    let mut in_whitespace = false;
    for c in lowered.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                out.push('-');
                in_whitespace = true;
            }
            continue;
        }
        in_whitespace = false;
        if is_segment_char(c) && !(c == '-' && out.ends_with('-')) {
            out.push(c);
        }
    }

    // Dropping characters can bring dashes together again
    let mut collapsed = String::with_capacity(out.len());
    for c in out.chars() {
        if c == '-' && collapsed.ends_with('-') {
            continue;
        }
        collapsed.push(c);
    }

    collapsed.trim_matches(|c| c == '-' || c == '_').to_string()
}

/// Normalize a `/`-separated folder path segment by segment.
pub fn normalize_folder_path(path: &str) -> String {
    path.split('/')
        .map(normalize_segment)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

// ============================================================================
// Build
// ============================================================================

/// Build normalized key components from raw user input.
pub fn build_key(folder: &str, name: &str, prefix: Option<&str>) -> ValidationResult<AssetKey> {
    let folder = normalize_folder_path(folder);
    if folder.is_empty() {
        return Err(ValidationError::invalid(
            "folder",
            "folder has no allowed characters after normalization",
        ));
    }

    let name = normalize_segment(name);
    if name.is_empty() {
        return Err(ValidationError::invalid(
            "public_id",
            "name has no allowed characters after normalization",
        ));
    }

    let prefix = prefix.map(normalize_segment).filter(|p| !p.is_empty());
    let public_id = match &prefix {
        Some(p) => format!("{}{}{}", p, PREFIX_SEPARATOR, name),
        None => name.clone(),
    };

    Ok(AssetKey {
        folder,
        public_id,
        name,
        prefix,
    })
}

/// Compose the flat key from an identity: `folder/public_id` or `public_id`.
pub fn build_key_from_identity(identity: &LogicalIdentity) -> String {
    join_key(&identity.folder, &identity.public_id())
}

fn join_key(folder: &str, public_id: &str) -> String {
    if folder.is_empty() {
        public_id.to_string()
    } else {
        format!("{}/{}", folder, public_id)
    }
}

// ============================================================================
// Decode
// ============================================================================

/// Recover the logical identity from a resource's sidecar metadata.
///
/// `key` is only used for error context.
pub fn decode_stored_identity(metadata: &Metadata, key: &str) -> ValidationResult<LogicalIdentity> {
    let name = match metadata.get(META_NAME) {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::String(_)) | None => {
            return Err(ValidationError::stored_identity(key, "metadata `name` is missing"));
        }
        Some(_) => {
            return Err(ValidationError::stored_identity(key, "metadata `name` is not a string"));
        }
    };
    check_segment(&name).map_err(|reason| {
        ValidationError::stored_identity(key, format!("metadata `name`: {}", reason))
    })?;

    let folder = match metadata.get(META_FOLDER) {
        None => String::new(),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(_) => {
            return Err(ValidationError::stored_identity(key, "metadata `folder` is not a string"));
        }
    };
    if !folder.is_empty() {
        check_path(&folder).map_err(|reason| {
            ValidationError::stored_identity(key, format!("metadata `folder` {}", reason))
        })?;
    }

    let prefix = match metadata.get(META_PREFIX) {
        None => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(Value::String(s)) => Some(s.trim().to_string()),
        Some(_) => {
            return Err(ValidationError::stored_identity(key, "metadata `prefix` is not a string"));
        }
    };
    if let Some(prefix) = &prefix {
        check_segment(prefix).map_err(|reason| {
            ValidationError::stored_identity(key, format!("metadata `prefix`: {}", reason))
        })?;
    }

    Ok(LogicalIdentity {
        folder,
        name,
        prefix,
    })
}

// ============================================================================
// Strict gates
// ============================================================================

/// Reject caller-supplied flat keys that do not have the canonical shape.
pub fn validate_flat_key(key: &str) -> ValidationResult<()> {
    check_path(key).map_err(|reason| ValidationError::invalid("key", reason))
}

/// Reject caller-supplied folder paths that do not have the canonical shape.
pub fn validate_folder_path(path: &str) -> ValidationResult<()> {
    check_path(path).map_err(|reason| ValidationError::invalid("folder", reason))
}
