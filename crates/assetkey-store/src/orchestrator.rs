//! Identity-changing mutations: rename, relocate and prefix change.
//!
//! Each mutation runs strictly in order:
//!
//! ```text
//! FetchingCurrent -> ComputingTarget -> RemoteRenaming -> SyncingMetadata -> Refetching -> Done
//! ```
//!
//! with `Failed` reachable from every stage. The remote rename and the
//! metadata resync are two independent calls. If the resync fails the asset
//! has already moved and its identity metadata is stale; that outcome is
//! returned as a rename/relocate error with stage `SyncingMetadata`. There is
//! no rollback and no retry. Repeating the same mutation against the new key
//! skips the rename and only resyncs; any other mutation of an asset whose
//! metadata does not match its key is refused. The returned view always comes
//! from a fresh fetch at the new key.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn, Instrument};

use assetkey_models::{
    decode_stored_identity, normalize_folder_path, normalize_segment, validate_flat_key,
    validate_folder_path, AssetView, LogicalIdentity, Metadata, ValidationError, PREFIX_SEPARATOR,
};

use crate::error::{classify, AssetError, AssetResult, Operation};
use crate::metrics::{observe_call, record_mutation};
use crate::normalize::{fetch_view, metadata_to_context};
use crate::remote::RemoteStore;

// =============================================================================
// Types
// =============================================================================

/// Stage of a running mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationStage {
    FetchingCurrent,
    ComputingTarget,
    RemoteRenaming,
    SyncingMetadata,
    Refetching,
    Done,
    Failed,
}

impl MutationStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationStage::FetchingCurrent => "fetching_current",
            MutationStage::ComputingTarget => "computing_target",
            MutationStage::RemoteRenaming => "remote_renaming",
            MutationStage::SyncingMetadata => "syncing_metadata",
            MutationStage::Refetching => "refetching",
            MutationStage::Done => "done",
            MutationStage::Failed => "failed",
        }
    }
}

impl fmt::Display for MutationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a new prefix combines with the existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrefixMode {
    /// Replace outright; empty input clears the prefix
    #[default]
    Replace,
    /// `<input>--<existing>`
    Prepend,
    /// `<existing>--<input>`
    Append,
}

/// Kind of identity mutation, for error classification and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Rename,
    Relocate,
    ChangePrefix,
}

impl MutationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationKind::Rename => "rename",
            MutationKind::Relocate => "relocate",
            MutationKind::ChangePrefix => "change_prefix",
        }
    }
}

/// A requested identity change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Rename { name: String },
    Relocate { folder: String },
    ChangePrefix { prefix: String, mode: PrefixMode },
}

impl Mutation {
    pub fn kind(&self) -> MutationKind {
        match self {
            Mutation::Rename { .. } => MutationKind::Rename,
            Mutation::Relocate { .. } => MutationKind::Relocate,
            Mutation::ChangePrefix { .. } => MutationKind::ChangePrefix,
        }
    }
}

// =============================================================================
// Target computation
// =============================================================================

/// Derive the target identity. Pure; never touches the store.
pub fn compute_target(current: &LogicalIdentity, mutation: &Mutation) -> AssetResult<LogicalIdentity> {
    match mutation {
        Mutation::Rename { name } => {
            let name = normalize_segment(name);
            if name.is_empty() {
                return Err(AssetError::invalid(
                    "name",
                    "name has no allowed characters after normalization",
                ));
            }
            if name == current.name {
                return Err(AssetError::invalid("name", format!("asset is already named `{}`", name)));
            }
            Ok(LogicalIdentity {
                name,
                ..current.clone()
            })
        }
        Mutation::Relocate { folder } => {
            let folder = normalize_folder_path(folder);
            validate_folder_path(&folder)?;
            if folder == current.folder {
                return Err(AssetError::invalid(
                    "folder",
                    format!("asset is already in `{}`", folder),
                ));
            }
            Ok(LogicalIdentity {
                folder,
                ..current.clone()
            })
        }
        Mutation::ChangePrefix { prefix, mode } => Ok(LogicalIdentity {
            prefix: combine_prefix(current.prefix.as_deref(), &normalize_segment(prefix), *mode),
            ..current.clone()
        }),
    }
}

/// Combine an existing prefix with normalized input under `mode`.
///
/// Prepend and append leave the prefix unchanged when the input already sits
/// at that end (compared on `--` boundaries) or when the input is empty.
pub fn combine_prefix(existing: Option<&str>, input: &str, mode: PrefixMode) -> Option<String> {
    let keep = || existing.map(str::to_string);
    match mode {
        PrefixMode::Replace if input.is_empty() => None,
        PrefixMode::Replace => Some(input.to_string()),
        PrefixMode::Prepend | PrefixMode::Append if input.is_empty() => keep(),
        PrefixMode::Prepend => match existing {
            None => Some(input.to_string()),
            Some(current)
                if current == input
                    || current.starts_with(&format!("{}{}", input, PREFIX_SEPARATOR)) =>
            {
                keep()
            }
            Some(current) => Some(format!("{}{}{}", input, PREFIX_SEPARATOR, current)),
        },
        PrefixMode::Append => match existing {
            None => Some(input.to_string()),
            Some(current)
                if current == input
                    || current.ends_with(&format!("{}{}", PREFIX_SEPARATOR, input)) =>
            {
                keep()
            }
            Some(current) => Some(format!("{}{}{}", current, PREFIX_SEPARATOR, input)),
        },
    }
}

/// Full context for the resync: caller keys kept, identity keys overwritten.
fn resync_context(current: &Metadata, target: &LogicalIdentity) -> BTreeMap<String, String> {
    let mut context = metadata_to_context(current);
    context.extend(target.to_metadata());
    context
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Runs identity mutations against a remote store.
pub struct MutationOrchestrator<'a, S: RemoteStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: RemoteStore + ?Sized> MutationOrchestrator<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Apply `mutation` to the asset at `key` and return its fresh view.
    pub async fn execute(&self, key: &str, mutation: Mutation) -> AssetResult<AssetView> {
        validate_flat_key(key)?;
        let kind = mutation.kind();
        let span = info_span!("asset_mutation", kind = kind.as_str(), key = %key);

        async move {
            let result = self.run(key, &mutation).await;
            match &result {
                Ok(view) => {
                    info!(target_key = %view.public_id, stage = %MutationStage::Done, "Mutation complete");
                    record_mutation(kind.as_str(), "ok");
                }
                Err(e) => {
                    warn!(stage = %MutationStage::Failed, error = %e, "Mutation failed");
                    record_mutation(kind.as_str(), "error");
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run(&self, key: &str, mutation: &Mutation) -> AssetResult<AssetView> {
        let kind = mutation.kind();

        debug!(stage = %MutationStage::FetchingCurrent, "Fetching current asset");
        let current = fetch_view(self.store, key).await?;
        let identity = decode_stored_identity(&current.metadata, key)?;
        let stored_key = identity.flat_key();
        let stale = stored_key != key;
        if stale {
            warn!(stored = %stored_key, "Stored identity does not match key");
        }

        debug!(stage = %MutationStage::ComputingTarget, "Computing target identity");
        let target = compute_target(&identity, mutation)?;
        let target_key = target.flat_key();
        validate_flat_key(&target_key)?;

        if target_key == key {
            if !stale && target == identity {
                info!("Target key unchanged, nothing to do");
                return Ok(current);
            }
            // Repeating the mutation that moved the asset here repairs its metadata
            info!("Asset already at target key, resyncing identity metadata");
        } else if stale {
            return Err(ValidationError::stored_identity(
                key,
                format!(
                    "metadata describes `{}`; repeat the mutation that produced this key to resync it",
                    stored_key
                ),
            )
            .into());
        } else {
            debug!(stage = %MutationStage::RemoteRenaming, target_key = %target_key, "Renaming");
            observe_call("rename", self.store.rename(key, &target_key, false))
                .await
                .map_err(|failure| {
                    classify(
                        Operation::Mutation {
                            kind,
                            from: key,
                            to: &target_key,
                            stage: MutationStage::RemoteRenaming,
                        },
                        failure,
                    )
                })?;
        }

        debug!(stage = %MutationStage::SyncingMetadata, "Syncing identity metadata");
        let context = resync_context(&current.metadata, &target);
        observe_call("update", self.store.update(&target_key, &context))
            .await
            .map_err(|failure| {
                warn!(target_key = %target_key, "Asset moved but identity metadata is stale");
                classify(
                    Operation::Mutation {
                        kind,
                        from: key,
                        to: &target_key,
                        stage: MutationStage::SyncingMetadata,
                    },
                    failure,
                )
            })?;

        debug!(stage = %MutationStage::Refetching, "Refetching");
        fetch_view(self.store, &target_key).await
    }
}
