use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use shared::{
    domain::{OrderId, OrderStatus, SupplierId},
    protocol::{OrderItemRecord, OrderRecord, OrderRequest, Product, Supplier},
};
use tokio::sync::{oneshot, Mutex};

use crate::{error::RequestError, gateway::ProcurementApi};

pub(crate) fn supplier(id: &str) -> Supplier {
    Supplier {
        id: SupplierId::new(id),
        name: format!("Supplier {id}"),
        contact_info: format!("orders@{}.example", id.to_ascii_lowercase()),
        address: "1 Dock Road".to_string(),
    }
}

pub(crate) fn product(id: &str, supplier_id: &str) -> Product {
    Product {
        id: id.into(),
        name: format!("Product {id}"),
        sku: format!("SKU-{id}"),
        category: "General".to_string(),
        price: 10.0,
        quantity_on_hand: 25,
        min_stock_level: 5,
        supplier_id: Some(SupplierId::new(supplier_id)),
    }
}

pub(crate) fn order_record(id: &str, supplier_id: &str, items: &[(&str, u32)]) -> OrderRecord {
    OrderRecord {
        id: OrderId::new(id),
        order_date: None,
        status: Some(OrderStatus::Pending),
        total_amount: None,
        supplier: supplier(supplier_id),
        items: items
            .iter()
            .map(|(product_id, quantity)| OrderItemRecord {
                id: None,
                product: product(product_id, supplier_id),
                quantity: *quantity,
                unit_price: Some(10.0),
            })
            .collect(),
    }
}

/// In-memory service whose responses can be held back and released in a
/// chosen order.
#[derive(Default)]
pub(crate) struct ScriptedApi {
    pub suppliers: Mutex<Vec<Supplier>>,
    pub catalogs: Mutex<HashMap<SupplierId, Result<Vec<Product>, RequestError>>>,
    pub orders: Mutex<HashMap<OrderId, OrderRecord>>,
    pub product_calls: Mutex<Vec<SupplierId>>,
    pub product_gates: Mutex<HashMap<SupplierId, oneshot::Receiver<()>>>,
    pub order_fetches: Mutex<Vec<OrderId>>,
    pub submissions: Mutex<Vec<(Option<OrderId>, OrderRequest)>>,
    pub submit_gate: Mutex<Option<oneshot::Receiver<()>>>,
    pub submit_failure: Mutex<Option<RequestError>>,
}

impl ScriptedApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn with_suppliers(&self, ids: &[&str]) {
        *self.suppliers.lock().await = ids.iter().map(|id| supplier(id)).collect();
    }

    pub async fn with_catalog(&self, supplier_id: &str, product_ids: &[&str]) {
        let products = product_ids
            .iter()
            .map(|id| product(id, supplier_id))
            .collect();
        self.catalogs
            .lock()
            .await
            .insert(SupplierId::new(supplier_id), Ok(products));
    }

    pub async fn fail_catalog(&self, supplier_id: &str, error: RequestError) {
        self.catalogs
            .lock()
            .await
            .insert(SupplierId::new(supplier_id), Err(error));
    }

    pub async fn with_order(&self, order: OrderRecord) {
        self.orders.lock().await.insert(order.id.clone(), order);
    }

    /// The next product listing for `supplier_id` waits until the returned
    /// sender fires.
    pub async fn hold_products(&self, supplier_id: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.product_gates
            .lock()
            .await
            .insert(SupplierId::new(supplier_id), rx);
        tx
    }

    pub async fn hold_submissions(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.submit_gate.lock().await = Some(rx);
        tx
    }

    pub async fn fail_next_submission(&self, error: RequestError) {
        *self.submit_failure.lock().await = Some(error);
    }

    pub async fn product_call_count(&self) -> usize {
        self.product_calls.lock().await.len()
    }

    pub async fn submission_count(&self) -> usize {
        self.submissions.lock().await.len()
    }

    pub async fn wait_for_product_calls(&self, count: usize) {
        wait_until(move || async move { self.product_call_count().await >= count }).await;
    }

    pub async fn wait_for_submissions(&self, count: usize) {
        wait_until(move || async move { self.submission_count().await >= count }).await;
    }

    async fn record_submission(
        &self,
        order_id: Option<OrderId>,
        request: &OrderRequest,
    ) -> Result<OrderRecord, RequestError> {
        self.submissions
            .lock()
            .await
            .push((order_id.clone(), request.clone()));

        let gate = self.submit_gate.lock().await.take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        if let Some(error) = self.submit_failure.lock().await.take() {
            return Err(error);
        }

        let items: Vec<(&str, u32)> = request
            .items
            .iter()
            .map(|item| (item.product_id.as_str(), item.quantity))
            .collect();
        let id = order_id
            .map(|id| id.0)
            .unwrap_or_else(|| "o-created".to_string());
        Ok(order_record(&id, request.supplier_id.as_str(), &items))
    }
}

async fn wait_until<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check().await {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[async_trait]
impl ProcurementApi for ScriptedApi {
    async fn list_suppliers(&self) -> Result<Vec<Supplier>, RequestError> {
        Ok(self.suppliers.lock().await.clone())
    }

    async fn list_products(&self, supplier_id: &SupplierId) -> Result<Vec<Product>, RequestError> {
        self.product_calls.lock().await.push(supplier_id.clone());
        let gate = self.product_gates.lock().await.remove(supplier_id);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.catalogs
            .lock()
            .await
            .get(supplier_id)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<OrderRecord, RequestError> {
        self.order_fetches.lock().await.push(order_id.clone());
        self.orders
            .lock()
            .await
            .get(order_id)
            .cloned()
            .ok_or_else(|| RequestError::RequestFailed {
                status: Some(404),
                message: "Order not found".to_string(),
            })
    }

    async fn create_order(&self, request: &OrderRequest) -> Result<OrderRecord, RequestError> {
        self.record_submission(None, request).await
    }

    async fn update_order(
        &self,
        order_id: &OrderId,
        request: &OrderRequest,
    ) -> Result<OrderRecord, RequestError> {
        self.record_submission(Some(order_id.clone()), request).await
    }
}
