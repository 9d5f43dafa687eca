//! Mapping of untrusted store payloads onto stable asset views.
//!
//! Every function here is a field-by-field mapping guarded by presence
//! checks. Nothing is cast wholesale, and metadata is always an owned copy
//! so callers cannot mutate the raw payload through it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use assetkey_models::{AssetView, CreatedAsset, Metadata};

use crate::error::{classify, AssetError, AssetResult, Operation};
use crate::metrics::observe_call;
use crate::remote::{RemoteStore, RESOURCE_KIND_IMAGE};

/// Result marker the store uses for missing resources.
const NOT_FOUND_RESULT: &str = "not found";

/// Shape an upload response. Lenient: absent numbers become 0 and the
/// store-echoed metadata wins over `fallback`.
pub fn normalize_created(raw: Value, key: &str, fallback: &Metadata) -> CreatedAsset {
    let url = str_field(&raw, "secure_url")
        .or_else(|| str_field(&raw, "url"))
        .unwrap_or_default()
        .to_string();

    CreatedAsset {
        public_id: str_field(&raw, "public_id").unwrap_or(key).to_string(),
        url,
        width: u32_field(&raw, "width").unwrap_or(0),
        height: u32_field(&raw, "height").unwrap_or(0),
        format: str_field(&raw, "format").unwrap_or_default().to_string(),
        bytes: u64_field(&raw, "bytes").unwrap_or(0),
        metadata: extract_metadata(&raw).unwrap_or_else(|| fallback.clone()),
        raw,
    }
}

/// Shape a single-resource fetch. Strict: incomplete payloads are errors.
pub fn normalize_fetched(raw: Value, key: &str) -> AssetResult<AssetView> {
    if is_not_found_payload(&raw) {
        return Err(AssetError::not_found(key));
    }
    match extract_view(&raw) {
        Ok(fields) => Ok(fields.into_view(raw)),
        Err(reason) => Err(AssetError::malformed(key, reason)),
    }
}

/// Fetch one resource with its metadata and shape it.
pub(crate) async fn fetch_view<S: RemoteStore + ?Sized>(store: &S, key: &str) -> AssetResult<AssetView> {
    let raw = observe_call("fetch_one", store.fetch_one(key, true))
        .await
        .map_err(|failure| classify(Operation::Fetch { key }, failure))?;
    normalize_fetched(raw, key)
}

/// Shape one listing entry; incomplete entries are dropped, not errors.
pub fn normalize_listed(raw: Value) -> Option<AssetView> {
    let fields = extract_view(&raw).ok()?;
    Some(fields.into_view(raw))
}

/// Listing payload: entries plus the opaque cursor.
pub fn split_listing(raw: &Value) -> (Vec<Value>, Option<String>) {
    let entries = raw
        .get("resources")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let cursor = str_field(raw, "next_cursor").map(str::to_string);
    (entries, cursor)
}

/// True if the payload says the resource does not exist.
pub fn is_not_found_payload(raw: &Value) -> bool {
    str_field(raw, "result") == Some(NOT_FOUND_RESULT)
}

/// Copy the sidecar metadata out of a payload.
///
/// Reads `context.custom` when present, else `context` itself. Only plain
/// mappings are accepted; non-scalar values are dropped.
pub fn extract_metadata(raw: &Value) -> Option<Metadata> {
    let context = raw.get("context")?.as_object()?;
    let block = match context.get("custom") {
        Some(Value::Object(custom)) => custom,
        Some(_) => return None,
        None => context,
    };
    Some(copy_scalars(block))
}

/// Flatten metadata into the string-valued context the store persists.
pub fn metadata_to_context(metadata: &Metadata) -> BTreeMap<String, String> {
    metadata
        .iter()
        .map(|(k, v)| {
            let value = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), value)
        })
        .collect()
}

fn copy_scalars(map: &Map<String, Value>) -> Metadata {
    map.iter()
        .filter(|(_, v)| matches!(v, Value::String(_) | Value::Number(_) | Value::Bool(_)))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

// =============================================================================
// Field extraction
// =============================================================================

struct ViewFields {
    public_id: String,
    url: String,
    secure_url: String,
    width: u32,
    height: u32,
    format: String,
    bytes: u64,
    created_at: Option<DateTime<Utc>>,
    metadata: Metadata,
}

impl ViewFields {
    fn into_view(self, raw: Value) -> AssetView {
        AssetView {
            public_id: self.public_id,
            url: self.url,
            secure_url: self.secure_url,
            width: self.width,
            height: self.height,
            format: self.format,
            bytes: self.bytes,
            created_at: self.created_at,
            metadata: self.metadata,
            raw,
        }
    }
}

fn extract_view(raw: &Value) -> Result<ViewFields, String> {
    if !raw.is_object() {
        return Err("payload is not an object".to_string());
    }

    let public_id = str_field(raw, "public_id")
        .filter(|s| !s.is_empty())
        .ok_or("missing public_id")?;

    match str_field(raw, "resource_type") {
        Some(RESOURCE_KIND_IMAGE) => {}
        Some(other) => return Err(format!("resource_type is `{}`, expected image", other)),
        None => return Err("missing resource_type".to_string()),
    }

    Ok(ViewFields {
        public_id: public_id.to_string(),
        url: required_str(raw, "url")?,
        secure_url: required_str(raw, "secure_url")?,
        width: u32_field(raw, "width").ok_or("missing width")?,
        height: u32_field(raw, "height").ok_or("missing height")?,
        format: required_str(raw, "format")?,
        bytes: u64_field(raw, "bytes").ok_or("missing bytes")?,
        created_at: str_field(raw, "created_at")
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc)),
        metadata: extract_metadata(raw).unwrap_or_default(),
    })
}

fn str_field<'a>(raw: &'a Value, field: &str) -> Option<&'a str> {
    raw.get(field).and_then(Value::as_str)
}

fn required_str(raw: &Value, field: &str) -> Result<String, String> {
    str_field(raw, field)
        .map(str::to_string)
        .ok_or_else(|| format!("missing {}", field))
}

fn u64_field(raw: &Value, field: &str) -> Option<u64> {
    raw.get(field).and_then(Value::as_u64)
}

fn u32_field(raw: &Value, field: &str) -> Option<u32> {
    u64_field(raw, field).and_then(|n| u32::try_from(n).ok())
}
