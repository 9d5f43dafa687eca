//! In-memory store double for integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use assetkey_models::{AssetSource, LogicalIdentity};
use assetkey_store::{AssetService, ListParams, RemoteFailure, RemoteResult, RemoteStore, UploadParams};

pub const PNG_BYTES: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D];

struct Injected {
    operation: &'static str,
    skip: usize,
    failure: RemoteFailure,
}

#[derive(Default)]
struct State {
    resources: BTreeMap<String, Value>,
    calls: HashMap<&'static str, usize>,
    uploads: Vec<UploadParams>,
    failures: Vec<Injected>,
    list_response: Option<Value>,
}

/// Store double keeping resources as raw JSON payloads.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Seed a resource carrying `identity` as its stored metadata.
    pub fn seed(&self, identity: &LogicalIdentity) -> String {
        let key = identity.flat_key();
        let context: BTreeMap<String, String> = identity.to_metadata();
        self.seed_raw(resource_json(&key, &context));
        key
    }

    /// Seed an arbitrary payload under its `public_id`.
    pub fn seed_raw(&self, raw: Value) {
        let key = raw["public_id"].as_str().unwrap_or_default().to_string();
        self.state.lock().unwrap().resources.insert(key, raw);
    }

    /// Make the `skip + 1`-th next call to `operation` fail.
    pub fn fail_call(&self, operation: &'static str, skip: usize, failure: RemoteFailure) {
        self.state.lock().unwrap().failures.push(Injected {
            operation,
            skip,
            failure,
        });
    }

    /// Respond to every listing with a fixed payload.
    pub fn set_list_response(&self, raw: Value) {
        self.state.lock().unwrap().list_response = Some(raw);
    }

    pub fn calls(&self, operation: &str) -> usize {
        self.state.lock().unwrap().calls.get(operation).copied().unwrap_or(0)
    }

    pub fn mutating_calls(&self) -> usize {
        self.calls("rename") + self.calls("update") + self.calls("upload") + self.calls("destroy")
    }

    pub fn contains(&self, key: &str) -> bool {
        self.state.lock().unwrap().resources.contains_key(key)
    }

    pub fn resource(&self, key: &str) -> Option<Value> {
        self.state.lock().unwrap().resources.get(key).cloned()
    }

    pub fn last_upload(&self) -> Option<UploadParams> {
        self.state.lock().unwrap().uploads.last().cloned()
    }

    fn enter(&self, operation: &'static str) -> RemoteResult<std::sync::MutexGuard<'_, State>> {
        let mut state = self.state.lock().unwrap();
        *state.calls.entry(operation).or_insert(0) += 1;

        if let Some(pos) = state.failures.iter().position(|f| f.operation == operation) {
            if state.failures[pos].skip == 0 {
                let injected = state.failures.remove(pos);
                return Err(injected.failure);
            }
            state.failures[pos].skip -= 1;
        }
        Ok(state)
    }
}

pub fn resource_json(key: &str, context: &BTreeMap<String, String>) -> Value {
    json!({
        "public_id": key,
        "resource_type": "image",
        "type": "upload",
        "url": format!("http://res.cloudinary.com/demo/image/upload/v1/{}.png", key),
        "secure_url": format!("https://res.cloudinary.com/demo/image/upload/v1/{}.png", key),
        "width": 100,
        "height": 80,
        "format": "png",
        "bytes": 2048,
        "created_at": "2024-05-01T12:00:00Z",
        "context": { "custom": context }
    })
}

fn not_found(key: &str) -> RemoteFailure {
    RemoteFailure::http(404, format!("Resource not found - {}", key))
}

#[async_trait]
impl RemoteStore for InMemoryStore {
    async fn upload(&self, _source: &AssetSource, params: &UploadParams) -> RemoteResult<Value> {
        let mut state = self.enter("upload")?;
        let key = match &params.folder {
            Some(folder) => format!("{}/{}", folder, params.public_id),
            None => params.public_id.clone(),
        };
        if state.resources.contains_key(&key) && !params.overwrite {
            return Err(RemoteFailure::http(409, format!("Resource already exists - {}", key)));
        }
        state.uploads.push(params.clone());
        let raw = resource_json(&key, &params.context);
        state.resources.insert(key, raw.clone());
        Ok(raw)
    }

    async fn destroy(&self, key: &str, _resource_kind: &str) -> RemoteResult<Value> {
        let mut state = self.enter("destroy")?;
        match state.resources.remove(key) {
            Some(_) => Ok(json!({ "result": "ok" })),
            None => Ok(json!({ "result": "not found" })),
        }
    }

    async fn rename(&self, from: &str, to: &str, overwrite: bool) -> RemoteResult<Value> {
        let mut state = self.enter("rename")?;
        if !state.resources.contains_key(from) {
            return Err(not_found(from));
        }
        if state.resources.contains_key(to) && !overwrite {
            return Err(RemoteFailure::http(409, format!("to_public_id {} already exists", to)));
        }
        let mut raw = state.resources.remove(from).unwrap_or_default();
        raw["public_id"] = json!(to);
        raw["url"] = json!(format!("http://res.cloudinary.com/demo/image/upload/v2/{}.png", to));
        raw["secure_url"] = json!(format!("https://res.cloudinary.com/demo/image/upload/v2/{}.png", to));
        state.resources.insert(to.to_string(), raw);
        // Partial shape on purpose; callers must refetch
        Ok(json!({ "public_id": to }))
    }

    async fn fetch_one(&self, key: &str, _with_context: bool) -> RemoteResult<Value> {
        let state = self.enter("fetch_one")?;
        state.resources.get(key).cloned().ok_or_else(|| not_found(key))
    }

    async fn update(&self, key: &str, context: &BTreeMap<String, String>) -> RemoteResult<Value> {
        let mut state = self.enter("update")?;
        let raw = state.resources.get_mut(key).ok_or_else(|| not_found(key))?;
        raw["context"] = json!({ "custom": context });
        Ok(json!({ "public_id": key }))
    }

    async fn list(&self, params: &ListParams) -> RemoteResult<Value> {
        let state = self.enter("list")?;
        if let Some(raw) = &state.list_response {
            return Ok(raw.clone());
        }
        let resources: Vec<Value> = state
            .resources
            .iter()
            .filter(|(key, _)| key.starts_with(&params.prefix))
            .take(params.max_results as usize)
            .map(|(_, raw)| raw.clone())
            .collect();
        Ok(json!({ "resources": resources }))
    }
}

pub fn service(store: &Arc<InMemoryStore>) -> AssetService<InMemoryStore> {
    AssetService::new(Arc::clone(store))
}

pub fn identity(folder: &str, name: &str, prefix: Option<&str>) -> LogicalIdentity {
    LogicalIdentity {
        folder: folder.to_string(),
        name: name.to_string(),
        prefix: prefix.map(str::to_string),
    }
}
