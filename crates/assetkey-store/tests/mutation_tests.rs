//! Rename, relocate and prefix-change flows against the in-memory store.

mod common;

use std::collections::BTreeMap;

use assetkey_models::ValidationError;
use assetkey_store::{AssetError, FailureCause, MutationStage, PrefixMode, RemoteFailure};

use common::{identity, resource_json, service, InMemoryStore};

// =============================================================================
// Rename
// =============================================================================

#[tokio::test]
async fn test_rename_moves_asset_and_resyncs_identity() {
    let store = InMemoryStore::new();
    let key = store.seed(&identity("products", "shoe", None));
    let service = service(&store);

    let view = service.rename_asset(&key, "Running Boot").await.unwrap();

    assert_eq!(view.public_id, "products/running-boot");
    assert_eq!(view.metadata["name"], "running-boot");
    assert_eq!(view.metadata["folder"], "products");
    assert!(!store.contains("products/shoe"));
    assert_eq!(store.calls("rename"), 1);
    assert_eq!(store.calls("update"), 1);
}

#[tokio::test]
async fn test_rename_keeps_caller_metadata() {
    let store = InMemoryStore::new();
    let mut context = identity("products", "shoe", Some("sale")).to_metadata();
    context.insert("alt".into(), "red shoe".into());
    store.seed_raw(resource_json("products/sale--shoe", &context));
    let service = service(&store);

    let view = service.rename_asset("products/sale--shoe", "boot").await.unwrap();

    assert_eq!(view.public_id, "products/sale--boot");
    assert_eq!(view.metadata["alt"], "red shoe");
    assert_eq!(view.metadata["prefix"], "sale");
}

#[tokio::test]
async fn test_second_rename_of_old_key_is_not_found() {
    let store = InMemoryStore::new();
    let key = store.seed(&identity("products", "shoe", None));
    let service = service(&store);

    service.rename_asset(&key, "boot").await.unwrap();
    let err = service.rename_asset(&key, "sandal").await.unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(store.calls("rename"), 1);
}

#[tokio::test]
async fn test_rename_to_existing_key_is_collision() {
    let store = InMemoryStore::new();
    let key = store.seed(&identity("products", "shoe", None));
    store.seed(&identity("products", "boot", None));
    let service = service(&store);

    let err = service.rename_asset(&key, "boot").await.unwrap_err();

    match err {
        AssetError::Rename(failure) => {
            assert!(failure.is_collision());
            assert_eq!(failure.from, "products/shoe");
            assert_eq!(failure.to, "products/boot");
            assert_eq!(failure.stage, MutationStage::RemoteRenaming);
        }
        other => panic!("expected rename collision, got {:?}", other),
    }
    assert!(store.contains("products/shoe"));
    assert_eq!(store.calls("update"), 0);
}

#[tokio::test]
async fn test_rename_to_same_name_is_rejected_locally() {
    let store = InMemoryStore::new();
    let key = store.seed(&identity("products", "shoe", None));
    let service = service(&store);

    let err = service.rename_asset(&key, " Shoe ").await.unwrap_err();

    assert!(matches!(err, AssetError::Validation(_)));
    assert_eq!(store.mutating_calls(), 0);
}

#[tokio::test]
async fn test_rename_with_transient_failure() {
    let store = InMemoryStore::new();
    let key = store.seed(&identity("products", "shoe", None));
    store.fail_call("rename", 0, RemoteFailure::network("ETIMEDOUT", "socket timed out"));
    let service = service(&store);

    let err = service.rename_asset(&key, "boot").await.unwrap_err();

    assert!(err.is_transient());
    assert!(matches!(err.cause(), Some(FailureCause::Network(_))));
    assert!(store.contains("products/shoe"));
}

#[tokio::test]
async fn test_stale_metadata_after_sync_failure() {
    let store = InMemoryStore::new();
    let key = store.seed(&identity("products", "shoe", None));
    store.fail_call("update", 0, RemoteFailure::http(500, "Internal error"));
    let service = service(&store);

    let err = service.rename_asset(&key, "boot").await.unwrap_err();

    match err {
        AssetError::Rename(failure) => {
            assert_eq!(failure.stage, MutationStage::SyncingMetadata);
            assert!(failure.is_metadata_stale());
            assert_eq!(failure.to, "products/boot");
        }
        other => panic!("expected stale metadata failure, got {:?}", other),
    }

    // The move happened; only the sidecar metadata lags behind
    assert!(store.contains("products/boot"));
    let stale = service.fetch_asset("products/boot").await.unwrap();
    assert_eq!(stale.metadata["name"], "shoe");
}

#[tokio::test]
async fn test_repeating_rename_repairs_stale_metadata() {
    let store = InMemoryStore::new();
    let key = store.seed(&identity("products", "shoe", None));
    store.fail_call("update", 0, RemoteFailure::http(500, "Internal error"));
    let service = service(&store);
    service.rename_asset(&key, "boot").await.unwrap_err();

    let view = service.rename_asset("products/boot", "boot").await.unwrap();

    assert_eq!(view.public_id, "products/boot");
    assert_eq!(view.metadata["name"], "boot");
    assert_eq!(store.calls("rename"), 1);
    assert_eq!(store.calls("update"), 2);
}

#[tokio::test]
async fn test_other_mutation_of_stale_asset_is_refused() {
    let store = InMemoryStore::new();
    let key = store.seed(&identity("products", "shoe", None));
    store.fail_call("update", 0, RemoteFailure::http(500, "Internal error"));
    let service = service(&store);
    service.rename_asset(&key, "boot").await.unwrap_err();

    let err = service
        .relocate_asset("products/boot", "archive")
        .await
        .unwrap_err();

    match err {
        AssetError::Validation(failure) => assert_eq!(failure.key(), Some("products/boot")),
        other => panic!("expected stored identity error, got {:?}", other),
    }
    assert!(store.contains("products/boot"));
    assert!(!store.contains("archive/shoe"));
    assert_eq!(store.calls("rename"), 1);
}

#[tokio::test]
async fn test_missing_stored_identity_blocks_mutation() {
    let store = InMemoryStore::new();
    store.seed_raw(resource_json("products/shoe", &BTreeMap::new()));
    let service = service(&store);

    let err = service.rename_asset("products/shoe", "boot").await.unwrap_err();

    assert!(matches!(
        err,
        AssetError::Validation(ValidationError::StoredIdentity { .. })
    ));
    assert_eq!(store.mutating_calls(), 0);
}

#[tokio::test]
async fn test_refetch_failure_surfaces_as_fetch_error() {
    let store = InMemoryStore::new();
    let key = store.seed(&identity("products", "shoe", None));
    // First fetch reads the current asset; the second is the refetch
    store.fail_call("fetch_one", 1, RemoteFailure::http(502, "Bad gateway"));
    let service = service(&store);

    let err = service.rename_asset(&key, "boot").await.unwrap_err();

    assert!(matches!(err, AssetError::Fetch { .. }));
    assert!(err.is_transient());
    assert!(store.contains("products/boot"));
}

// =============================================================================
// Relocate
// =============================================================================

#[tokio::test]
async fn test_relocate_keeps_name_and_prefix() {
    let store = InMemoryStore::new();
    let key = store.seed(&identity("products", "shoe", Some("sale")));
    let service = service(&store);

    let view = service.relocate_asset(&key, "Archive/2024").await.unwrap();

    assert_eq!(view.public_id, "archive/2024/sale--shoe");
    assert_eq!(view.metadata["folder"], "archive/2024");
    assert_eq!(view.metadata["name"], "shoe");
    assert_eq!(view.metadata["prefix"], "sale");
}

#[tokio::test]
async fn test_relocate_to_same_folder_is_rejected() {
    let store = InMemoryStore::new();
    let key = store.seed(&identity("products", "shoe", None));
    let service = service(&store);

    let err = service.relocate_asset(&key, "products").await.unwrap_err();

    assert!(matches!(err, AssetError::Validation(_)));
    assert_eq!(store.calls("rename"), 0);
}

#[tokio::test]
async fn test_relocate_sync_failure_is_relocate_error() {
    let store = InMemoryStore::new();
    let key = store.seed(&identity("products", "shoe", None));
    store.fail_call("update", 0, RemoteFailure::http(503, "Unavailable"));
    let service = service(&store);

    let err = service.relocate_asset(&key, "archive").await.unwrap_err();

    match err {
        AssetError::Relocate(failure) => assert!(failure.is_metadata_stale()),
        other => panic!("expected relocate failure, got {:?}", other),
    }
}

// =============================================================================
// Prefix
// =============================================================================

#[tokio::test]
async fn test_prepend_existing_prefix_is_noop() {
    let store = InMemoryStore::new();
    let key = store.seed(&identity("products", "shoe", Some("sale")));
    let service = service(&store);

    let view = service
        .change_asset_prefix(&key, "sale", PrefixMode::Prepend)
        .await
        .unwrap();

    assert_eq!(view.public_id, key);
    assert_eq!(store.mutating_calls(), 0);
}

#[tokio::test]
async fn test_replace_with_same_prefix_is_noop() {
    let store = InMemoryStore::new();
    let key = store.seed(&identity("products", "shoe", Some("sale")));
    let service = service(&store);

    let view = service
        .change_asset_prefix(&key, " Sale ", PrefixMode::Replace)
        .await
        .unwrap();

    assert_eq!(view.public_id, key);
    assert_eq!(store.mutating_calls(), 0);
}

#[tokio::test]
async fn test_append_existing_suffix_is_noop() {
    let store = InMemoryStore::new();
    let key = store.seed(&identity("products", "shoe", Some("new--sale")));
    let service = service(&store);

    let view = service
        .change_asset_prefix(&key, "sale", PrefixMode::Append)
        .await
        .unwrap();

    assert_eq!(view.public_id, "products/new--sale--shoe");
    assert_eq!(store.mutating_calls(), 0);
}

#[tokio::test]
async fn test_prepend_and_append() {
    let store = InMemoryStore::new();
    let key = store.seed(&identity("products", "shoe", Some("sale")));
    let service = service(&store);

    let view = service
        .change_asset_prefix(&key, "New", PrefixMode::Prepend)
        .await
        .unwrap();
    assert_eq!(view.public_id, "products/new--sale--shoe");
    assert_eq!(view.metadata["prefix"], "new--sale");

    let view = service
        .change_asset_prefix(&view.public_id, "hot", PrefixMode::Append)
        .await
        .unwrap();
    assert_eq!(view.public_id, "products/new--sale--hot--shoe");
}

#[tokio::test]
async fn test_replace_with_blank_prefix_clears_it() {
    let store = InMemoryStore::new();
    let key = store.seed(&identity("products", "shoe", Some("sale")));
    let service = service(&store);

    let view = service
        .change_asset_prefix(&key, "  ", PrefixMode::Replace)
        .await
        .unwrap();

    assert_eq!(view.public_id, "products/shoe");
    assert_eq!(view.metadata["prefix"], "");
}
