use super::*;
use crate::test_support::ScriptedApi;

fn sid(id: &str) -> Option<SupplierId> {
    Some(SupplierId::new(id))
}

fn product_ids(snapshot: &CatalogSnapshot) -> Vec<&str> {
    snapshot.products.iter().map(|p| p.id.as_str()).collect()
}

#[tokio::test]
async fn later_response_for_earlier_request_is_discarded() {
    let api = ScriptedApi::new();
    api.with_catalog("S1", &["P1"]).await;
    api.with_catalog("S2", &["P2", "P3"]).await;
    let loader = CatalogLoader::new(api.clone());

    let first = loader.load(sid("S1"));
    let second = loader.load(sid("S2"));

    // S2 answers first, S1 straggles in afterwards.
    let second = second.await;
    let first = first.await;

    assert!(matches!(second, LoadOutcome::Applied(_)));
    assert_eq!(first, LoadOutcome::Discarded { sequence: 1 });

    let current = loader.current().await;
    assert_eq!(current.supplier_id, sid("S2"));
    assert_eq!(product_ids(&current), vec!["P2", "P3"]);
}

#[tokio::test]
async fn earlier_response_arriving_first_is_not_applied() {
    let api = ScriptedApi::new();
    api.with_catalog("S1", &["P1"]).await;
    api.with_catalog("S2", &["P2"]).await;
    let loader = CatalogLoader::new(api.clone());

    let first = loader.load(sid("S1"));
    let second = loader.load(sid("S2"));

    assert_eq!(first.await, LoadOutcome::Discarded { sequence: 1 });
    assert_eq!(loader.current().await.sequence, 0);

    let applied = second.await;
    let LoadOutcome::Applied(snapshot) = applied else {
        panic!("expected S2 to apply, got {applied:?}");
    };
    assert_eq!(snapshot.sequence, 2);
    assert_eq!(loader.current().await.supplier_id, sid("S2"));
}

#[tokio::test]
async fn no_supplier_clears_catalog_without_a_request() {
    let api = ScriptedApi::new();
    api.with_catalog("S1", &["P1"]).await;
    let loader = CatalogLoader::new(api.clone());

    loader.load(sid("S1")).await;
    assert_eq!(api.product_call_count().await, 1);

    let outcome = loader.load(None).await;
    let LoadOutcome::Applied(snapshot) = outcome else {
        panic!("expected an applied empty snapshot, got {outcome:?}");
    };
    assert_eq!(snapshot.source, SnapshotSource::NoSupplier);
    assert!(snapshot.products.is_empty());

    loader.load(sid("   ")).await;
    assert_eq!(api.product_call_count().await, 1);
    assert!(loader.current().await.products.is_empty());
}

#[tokio::test]
async fn failed_load_empties_catalog_and_records_error() {
    let api = ScriptedApi::new();
    api.with_catalog("S1", &["P1"]).await;
    api.fail_catalog(
        "S2",
        RequestError::RequestFailed {
            status: Some(500),
            message: "catalog unavailable".to_string(),
        },
    )
    .await;
    let loader = CatalogLoader::new(api.clone());

    loader.load(sid("S1")).await;
    let outcome = loader.load(sid("S2")).await;

    let LoadOutcome::Failed { snapshot, error } = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert_eq!(snapshot.source, SnapshotSource::Failed);
    assert!(snapshot.products.is_empty());
    assert_eq!(error.status(), Some(500));

    let current = loader.current().await;
    assert!(current.products.is_empty());
    assert!(!current.is_loaded_for(&SupplierId::new("S2")));
    assert_eq!(
        loader.last_error().await.map(|e| e.message().to_string()),
        Some("catalog unavailable".to_string())
    );
}

#[tokio::test]
async fn stale_failure_does_not_overwrite_newer_catalog() {
    let api = ScriptedApi::new();
    api.fail_catalog("S1", RequestError::transport("connection reset"))
        .await;
    api.with_catalog("S2", &["P2"]).await;
    let loader = CatalogLoader::new(api.clone());

    let first = loader.load(sid("S1"));
    let second = loader.load(sid("S2"));
    assert!(matches!(second.await, LoadOutcome::Applied(_)));
    assert_eq!(first.await, LoadOutcome::Discarded { sequence: 1 });

    assert_eq!(loader.last_error().await, None);
    assert_eq!(product_ids(&loader.current().await), vec!["P2"]);
}

#[tokio::test]
async fn successful_reload_clears_previous_error() {
    let api = ScriptedApi::new();
    api.fail_catalog("S1", RequestError::transport("timed out"))
        .await;
    let loader = CatalogLoader::new(api.clone());

    loader.load(sid("S1")).await;
    assert!(loader.last_error().await.is_some());

    api.with_catalog("S1", &["P1"]).await;
    loader.load(sid("S1")).await;
    assert_eq!(loader.last_error().await, None);
    assert!(loader.current().await.is_loaded_for(&SupplierId::new("S1")));
}
