//! Validation and consistency layer over a remote media asset store.
//!
//! This crate provides:
//! - The remote store collaborator trait
//! - Typed asset errors and remote failure classification
//! - Normalization of untrusted store payloads
//! - Rename, relocate and prefix-change orchestration
//! - The caller-facing asset service
//! - Store configuration and a fingerprint-keyed client cache

pub mod client_cache;
pub mod config;
pub mod error;
pub mod metrics;
pub mod normalize;
pub mod orchestrator;
pub mod remote;
pub mod service;
pub mod source;
pub mod telemetry;

pub use client_cache::ClientCache;
pub use config::StoreConfig;
pub use error::{classify, classify_cause, AssetError, AssetResult, FailureCause, MutationFailure, Operation};
pub use orchestrator::{
    combine_prefix, compute_target, Mutation, MutationKind, MutationOrchestrator, MutationStage,
    PrefixMode,
};
pub use remote::{ListParams, RemoteFailure, RemoteResult, RemoteStore, UploadParams, RESOURCE_KIND_IMAGE};
pub use service::{AssetService, MAX_LIST_LIMIT};
pub use source::{decode_data_uri, preflight_source, FsLocalSource, LocalSource};
pub use telemetry::init_tracing;
