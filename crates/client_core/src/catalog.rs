use std::{
    future::Future,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use shared::{
    domain::{ProductId, SupplierId},
    protocol::Product,
};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::{error::RequestError, gateway::ProcurementApi};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotSource {
    /// No supplier chosen; nothing was requested.
    NoSupplier,
    Remote,
    /// The request failed and the catalog was emptied.
    Failed,
}

/// Products offered for one supplier, tagged with the request that produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogSnapshot {
    pub supplier_id: Option<SupplierId>,
    pub sequence: u64,
    pub source: SnapshotSource,
    pub products: Vec<Product>,
}

impl CatalogSnapshot {
    fn empty(supplier_id: Option<SupplierId>, sequence: u64, source: SnapshotSource) -> Self {
        Self {
            supplier_id,
            sequence,
            source,
            products: Vec::new(),
        }
    }

    /// True once a successful load for `supplier_id` is in place.
    pub fn is_loaded_for(&self, supplier_id: &SupplierId) -> bool {
        self.source == SnapshotSource::Remote && self.supplier_id.as_ref() == Some(supplier_id)
    }

    pub fn contains(&self, product_id: &ProductId) -> bool {
        self.products.iter().any(|product| &product.id == product_id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Applied(CatalogSnapshot),
    Failed {
        snapshot: CatalogSnapshot,
        error: RequestError,
    },
    /// A newer load was issued while this one was in flight. Internal only.
    Discarded { sequence: u64 },
}

/// Loads supplier-scoped catalogs, keeping only the most recently requested one.
pub struct CatalogLoader {
    api: Arc<dyn ProcurementApi>,
    issued: AtomicU64,
    settled: RwLock<Settled>,
}

struct Settled {
    snapshot: CatalogSnapshot,
    error: Option<RequestError>,
}

impl CatalogLoader {
    pub fn new(api: Arc<dyn ProcurementApi>) -> Self {
        Self {
            api,
            issued: AtomicU64::new(0),
            settled: RwLock::new(Settled {
                snapshot: CatalogSnapshot::empty(None, 0, SnapshotSource::NoSupplier),
                error: None,
            }),
        }
    }

    /// Starts a load for `supplier_id`.
    ///
    /// The sequence number is taken when this is called, not when the
    /// returned future is first polled.
    pub fn load(
        &self,
        supplier_id: Option<SupplierId>,
    ) -> impl Future<Output = LoadOutcome> + Send + '_ {
        let sequence = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let supplier_id = supplier_id.filter(|id| !id.is_blank());
        async move {
            let Some(supplier_id) = supplier_id else {
                let snapshot = CatalogSnapshot::empty(None, sequence, SnapshotSource::NoSupplier);
                return self.settle(snapshot, None).await;
            };

            debug!("catalog: load issued supplier={supplier_id} seq={sequence}");
            match self.api.list_products(&supplier_id).await {
                Ok(products) => {
                    let snapshot = CatalogSnapshot {
                        supplier_id: Some(supplier_id),
                        sequence,
                        source: SnapshotSource::Remote,
                        products,
                    };
                    self.settle(snapshot, None).await
                }
                Err(error) => {
                    let snapshot =
                        CatalogSnapshot::empty(Some(supplier_id), sequence, SnapshotSource::Failed);
                    self.settle(snapshot, Some(error)).await
                }
            }
        }
    }

    async fn settle(&self, snapshot: CatalogSnapshot, error: Option<RequestError>) -> LoadOutcome {
        let sequence = snapshot.sequence;
        let mut settled = self.settled.write().await;
        if !self.is_latest(sequence) || settled.snapshot.sequence > sequence {
            debug!(
                "catalog: discarding stale response seq={sequence} latest={}",
                self.latest_sequence()
            );
            return LoadOutcome::Discarded { sequence };
        }

        settled.snapshot = snapshot.clone();
        settled.error = error.clone();
        drop(settled);

        match error {
            None => {
                info!(
                    "catalog: applied supplier={} products={} seq={sequence}",
                    snapshot
                        .supplier_id
                        .as_ref()
                        .map(SupplierId::as_str)
                        .unwrap_or("-"),
                    snapshot.products.len()
                );
                LoadOutcome::Applied(snapshot)
            }
            Some(error) => {
                warn!("catalog: load failed seq={sequence}: {error}");
                LoadOutcome::Failed { snapshot, error }
            }
        }
    }

    pub fn latest_sequence(&self) -> u64 {
        self.issued.load(Ordering::SeqCst)
    }

    pub fn is_latest(&self, sequence: u64) -> bool {
        self.latest_sequence() == sequence
    }

    pub async fn current(&self) -> CatalogSnapshot {
        self.settled.read().await.snapshot.clone()
    }

    pub async fn last_error(&self) -> Option<RequestError> {
        self.settled.read().await.error.clone()
    }
}

#[cfg(test)]
#[path = "tests/catalog_tests.rs"]
mod tests;
