use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::{OrderId, OrderStatus, ProductId, Role, SupplierId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticationResponse {
    pub token: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Supplier {
    pub id: SupplierId,
    pub name: String,
    #[serde(default)]
    pub contact_info: String,
    #[serde(default)]
    pub address: String,
}

/// A catalog entry. `quantity_on_hand` travels as `quantity` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "ProductWire")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub sku: String,
    pub category: String,
    pub price: f64,
    #[serde(rename = "quantity")]
    pub quantity_on_hand: i64,
    pub min_stock_level: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier_id: Option<SupplierId>,
}

impl Product {
    /// Label shown in product pickers.
    pub fn option_label(&self) -> String {
        format!("{} (SKU: {})", self.name, self.sku)
    }
}

// The service embeds the owning supplier as an object while other payloads
// only carry its id; both shapes collapse into `Product::supplier_id`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductWire {
    id: ProductId,
    name: String,
    #[serde(default)]
    sku: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    price: f64,
    #[serde(default)]
    quantity: i64,
    #[serde(default)]
    min_stock_level: i64,
    #[serde(default)]
    supplier_id: Option<SupplierId>,
    #[serde(default)]
    supplier: Option<SupplierRef>,
}

#[derive(Deserialize)]
struct SupplierRef {
    id: SupplierId,
}

impl From<ProductWire> for Product {
    fn from(wire: ProductWire) -> Self {
        Self {
            id: wire.id,
            name: wire.name,
            sku: wire.sku,
            category: wire.category,
            price: wire.price,
            quantity_on_hand: wire.quantity,
            min_stock_level: wire.min_stock_level,
            supplier_id: wire.supplier_id.or(wire.supplier.map(|s| s.id)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub product: Product,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    pub id: OrderId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_date: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_amount: Option<f64>,
    pub supplier: Supplier,
    #[serde(default)]
    pub items: Vec<OrderItemRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequest {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Body of `POST /orders` and `PUT /orders/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub supplier_id: SupplierId,
    pub items: Vec<OrderItemRequest>,
}
