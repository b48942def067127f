//! Purchase-order composition: the draft, its validation, and submission.
//!
//! One [`OrderComposer`] backs one open order form. It owns the draft, asks
//! the [`CatalogLoader`] for the products of the chosen supplier, and sends
//! the finished draft as a create or an update depending on its [`Mode`].

use std::{fmt, sync::Arc};

use shared::{
    domain::{OrderId, ProductId, SupplierId},
    protocol::{OrderItemRequest, OrderRecord, OrderRequest, Supplier},
};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    catalog::{CatalogLoader, CatalogSnapshot, LoadOutcome},
    error::RequestError,
    gateway::ProcurementApi,
};

/// Shown when a failed submission carries no server message.
pub const SUBMIT_FALLBACK_MESSAGE: &str = "Operation failed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Create,
    Edit(OrderId),
}

impl Mode {
    pub fn locks_supplier(&self) -> bool {
        matches!(self, Mode::Edit(_))
    }
}

/// Quantity as entered. Input that is not a whole number is kept verbatim and
/// flagged by validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Quantity {
    Count(u32),
    Unparsed(String),
}

impl Quantity {
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        match trimmed.parse::<u32>() {
            Ok(count) => Quantity::Count(count),
            Err(_) => Quantity::Unparsed(trimmed.to_string()),
        }
    }

    fn positive(&self) -> Option<u32> {
        match self {
            Quantity::Count(count) if *count > 0 => Some(*count),
            _ => None,
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quantity::Count(count) => write!(f, "{count}"),
            Quantity::Unparsed(raw) => f.write_str(raw),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineItemDraft {
    pub product_id: Option<ProductId>,
    pub quantity: Quantity,
}

impl LineItemDraft {
    pub fn blank() -> Self {
        Self {
            product_id: None,
            quantity: Quantity::Count(1),
        }
    }

    pub fn new(product_id: impl Into<ProductId>, quantity: u32) -> Self {
        Self {
            product_id: Some(product_id.into()),
            quantity: Quantity::Count(quantity),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDraft {
    pub supplier_id: Option<SupplierId>,
    pub items: Vec<LineItemDraft>,
}

impl OrderDraft {
    pub fn blank() -> Self {
        Self {
            supplier_id: None,
            items: vec![LineItemDraft::blank()],
        }
    }

    /// Rebuilds an editable draft from a stored order.
    pub fn from_order(order: &OrderRecord) -> Self {
        Self {
            supplier_id: Some(order.supplier.id.clone()),
            items: order
                .items
                .iter()
                .map(|item| LineItemDraft::new(item.product.id.clone(), item.quantity))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Supplier,
    Items,
    ItemProduct(usize),
    ItemQuantity(usize),
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Supplier => f.write_str("supplier"),
            Field::Items => f.write_str("items"),
            Field::ItemProduct(index) => write!(f, "items[{index}].product"),
            Field::ItemQuantity(index) => write!(f, "items[{index}].quantity"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationKind {
    Required,
    NoItems,
    NotNumeric,
    NotPositive,
    NotInCatalog,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {}", describe(.kind))]
pub struct ValidationError {
    pub field: Field,
    pub kind: ValidationKind,
}

fn describe(kind: &ValidationKind) -> &'static str {
    match kind {
        ValidationKind::Required => "is required",
        ValidationKind::NoItems => "at least one line item is required",
        ValidationKind::NotNumeric => "must be a whole number",
        ValidationKind::NotPositive => "must be at least 1",
        ValidationKind::NotInCatalog => "is not offered by the selected supplier",
    }
}

impl ValidationError {
    fn new(field: Field, kind: ValidationKind) -> Self {
        Self { field, kind }
    }
}

#[derive(Debug, Error)]
pub enum ComposerError {
    #[error("order draft is invalid: {}", join_errors(.0))]
    Invalid(Vec<ValidationError>),
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error("line item {0} does not exist")]
    NoSuchItem(usize),
    #[error("order has already been submitted")]
    Closed,
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Last submission failure, as shown above the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitFailure {
    pub status: Option<u16>,
    pub message: String,
    pub auth_expired: bool,
}

impl SubmitFailure {
    /// Server message verbatim, or the generic fallback when there is none.
    pub fn display_message(&self) -> &str {
        if self.message.trim().is_empty() {
            SUBMIT_FALLBACK_MESSAGE
        } else {
            &self.message
        }
    }
}

impl From<&RequestError> for SubmitFailure {
    fn from(error: &RequestError) -> Self {
        Self {
            status: error.status(),
            message: error.message().to_string(),
            auth_expired: error.is_auth_expired(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Submitted(OrderRecord),
    /// Another submission is outstanding; nothing was sent.
    AlreadyInFlight,
}

/// Result of a catalog (re)load as seen by the form.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogUpdate {
    Loaded(CatalogSnapshot),
    Failed(RequestError),
    /// A later supplier choice owns the catalog now; nothing changed.
    Superseded,
}

impl From<LoadOutcome> for CatalogUpdate {
    fn from(outcome: LoadOutcome) -> Self {
        match outcome {
            LoadOutcome::Applied(snapshot) => CatalogUpdate::Loaded(snapshot),
            LoadOutcome::Failed { error, .. } => CatalogUpdate::Failed(error),
            LoadOutcome::Discarded { .. } => CatalogUpdate::Superseded,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SupplierChange {
    /// Edit mode: the supplier field is read-only.
    Locked,
    Catalog(CatalogUpdate),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductOption {
    pub id: ProductId,
    pub label: String,
}

/// Everything the form needs to render.
#[derive(Debug, Clone)]
pub struct ComposerView {
    pub mode: Mode,
    pub supplier_locked: bool,
    pub initializing: bool,
    pub draft: OrderDraft,
    pub suppliers: Vec<Supplier>,
    pub product_options: Vec<ProductOption>,
    pub catalog: CatalogSnapshot,
    pub field_errors: Vec<ValidationError>,
    pub submitting: bool,
    pub last_error: Option<SubmitFailure>,
    pub load_error: Option<String>,
    pub completed: Option<OrderRecord>,
}

struct ComposerState {
    mode: Mode,
    draft: OrderDraft,
    /// Set while an initial draft is being hydrated; supplier assignments made
    /// in this phase keep the line items.
    initializing: bool,
    suppliers: Vec<Supplier>,
    field_errors: Vec<ValidationError>,
    submitting: bool,
    last_error: Option<SubmitFailure>,
    load_error: Option<String>,
    completed: Option<OrderRecord>,
}

impl ComposerState {
    fn ensure_open(&self) -> Result<(), ComposerError> {
        if self.completed.is_some() {
            return Err(ComposerError::Closed);
        }
        Ok(())
    }

    fn item_mut(&mut self, index: usize) -> Result<&mut LineItemDraft, ComposerError> {
        self.draft
            .items
            .get_mut(index)
            .ok_or(ComposerError::NoSuchItem(index))
    }
}

pub struct OrderComposer {
    api: Arc<dyn ProcurementApi>,
    catalog: CatalogLoader,
    state: Mutex<ComposerState>,
}

impl OrderComposer {
    pub fn new(api: Arc<dyn ProcurementApi>, mode: Mode) -> Self {
        Self {
            catalog: CatalogLoader::new(Arc::clone(&api)),
            api,
            state: Mutex::new(ComposerState {
                mode,
                draft: OrderDraft::blank(),
                initializing: true,
                suppliers: Vec::new(),
                field_errors: Vec::new(),
                submitting: false,
                last_error: None,
                load_error: None,
                completed: None,
            }),
        }
    }

    /// Opens the form.
    ///
    /// Create starts from `initial` or a blank draft. Edit starts from
    /// `initial` or, when absent, from `GET /orders/{id}`. Supplier choices
    /// are fetched alongside. When the draft already names a supplier its
    /// catalog is loaded without touching the items.
    pub async fn initialize(&self, initial: Option<OrderDraft>) -> Result<(), ComposerError> {
        let mode = self.state.lock().await.mode.clone();

        let draft_future = async {
            match (&mode, initial) {
                (_, Some(draft)) => Ok(draft),
                (Mode::Create, None) => Ok(OrderDraft::blank()),
                (Mode::Edit(order_id), None) => self
                    .api
                    .fetch_order(order_id)
                    .await
                    .map(|order| OrderDraft::from_order(&order)),
            }
        };
        let (suppliers, draft) = futures::join!(self.api.list_suppliers(), draft_future);

        let supplier_id = {
            let mut state = self.state.lock().await;
            match suppliers {
                Ok(suppliers) => state.suppliers = suppliers,
                Err(err) => {
                    warn!("composer: failed to load suppliers: {err}");
                    state.load_error = Some(format!("Failed to load suppliers: {err}"));
                }
            }
            let draft = match draft {
                Ok(draft) => draft,
                Err(err) => {
                    warn!("composer: failed to load order for edit: {err}");
                    state.load_error = Some(format!("Failed to load order details: {err}"));
                    return Err(err.into());
                }
            };
            let supplier_id = draft.supplier_id.clone().filter(|id| !id.is_blank());
            state.initializing = supplier_id.is_some();
            state.draft = draft;
            info!(
                "composer: initialized mode={:?} items={} hydrating={}",
                state.mode,
                state.draft.items.len(),
                state.initializing
            );
            supplier_id
        };

        if let Some(supplier_id) = supplier_id {
            self.select_supplier(Some(supplier_id)).await;
        } else {
            self.refresh_field_errors().await;
        }
        Ok(())
    }

    /// User-initiated supplier change. Locked in Edit mode.
    pub async fn change_supplier(
        &self,
        supplier_id: Option<SupplierId>,
    ) -> Result<SupplierChange, ComposerError> {
        {
            let mut state = self.state.lock().await;
            state.ensure_open()?;
            if state.mode.locks_supplier() {
                debug!("composer: supplier change ignored, field is locked");
                return Ok(SupplierChange::Locked);
            }
            // An explicit choice by the operator ends any pending hydration.
            state.initializing = false;
        }
        let outcome = self.select_supplier(supplier_id).await;
        Ok(SupplierChange::Catalog(outcome.into()))
    }

    /// Reloads the catalog for the current supplier after a failed load.
    pub async fn retry_catalog(&self) -> Result<CatalogUpdate, ComposerError> {
        let supplier_id = {
            let state = self.state.lock().await;
            state.ensure_open()?;
            state.draft.supplier_id.clone()
        };
        let outcome = self.catalog.load(supplier_id).await;
        self.reconcile(&outcome).await;
        Ok(outcome.into())
    }

    async fn select_supplier(&self, supplier_id: Option<SupplierId>) -> LoadOutcome {
        {
            let mut state = self.state.lock().await;
            if !state.initializing {
                // A user-chosen supplier starts over with one blank line.
                state.draft.items = vec![LineItemDraft::blank()];
            }
            state.draft.supplier_id = supplier_id.clone();
            state.load_error = None;
        }
        let outcome = self.catalog.load(supplier_id).await;
        self.reconcile(&outcome).await;
        outcome
    }

    async fn reconcile(&self, outcome: &LoadOutcome) {
        let mut state = self.state.lock().await;
        match outcome {
            LoadOutcome::Applied(snapshot) => {
                if !self.catalog.is_latest(snapshot.sequence) {
                    return;
                }
                if state.initializing && snapshot.supplier_id == state.draft.supplier_id {
                    state.initializing = false;
                    debug!("composer: hydration complete seq={}", snapshot.sequence);
                }
                state.load_error = None;
                state.field_errors = validate(&state.draft, snapshot).err().unwrap_or_default();
            }
            LoadOutcome::Failed { snapshot, error } => {
                if !self.catalog.is_latest(snapshot.sequence) {
                    return;
                }
                state.load_error = Some(format!("Failed to load products: {error}"));
            }
            LoadOutcome::Discarded { .. } => {}
        }
    }

    pub async fn add_item(&self) -> Result<usize, ComposerError> {
        let index = {
            let mut state = self.state.lock().await;
            state.ensure_open()?;
            state.draft.items.push(LineItemDraft::blank());
            state.draft.items.len() - 1
        };
        self.refresh_field_errors().await;
        Ok(index)
    }

    pub async fn remove_item(&self, index: usize) -> Result<LineItemDraft, ComposerError> {
        let removed = {
            let mut state = self.state.lock().await;
            state.ensure_open()?;
            if index >= state.draft.items.len() {
                return Err(ComposerError::NoSuchItem(index));
            }
            state.draft.items.remove(index)
        };
        self.refresh_field_errors().await;
        Ok(removed)
    }

    pub async fn set_item_product(
        &self,
        index: usize,
        product_id: Option<ProductId>,
    ) -> Result<(), ComposerError> {
        {
            let mut state = self.state.lock().await;
            state.ensure_open()?;
            state.item_mut(index)?.product_id = product_id.filter(|id| !id.is_blank());
        }
        self.refresh_field_errors().await;
        Ok(())
    }

    /// Stores the quantity as typed; bad input shows up in `field_errors`.
    pub async fn set_item_quantity(&self, index: usize, input: &str) -> Result<(), ComposerError> {
        {
            let mut state = self.state.lock().await;
            state.ensure_open()?;
            state.item_mut(index)?.quantity = Quantity::parse(input);
        }
        self.refresh_field_errors().await;
        Ok(())
    }

    async fn refresh_field_errors(&self) {
        let snapshot = self.catalog.current().await;
        let mut state = self.state.lock().await;
        state.field_errors = validate(&state.draft, &snapshot).err().unwrap_or_default();
    }

    /// Validates and sends the draft.
    ///
    /// Invalid drafts never reach the network. While a submission is
    /// outstanding further calls return [`SubmitOutcome::AlreadyInFlight`].
    pub async fn submit(&self) -> Result<SubmitOutcome, ComposerError> {
        let snapshot = self.catalog.current().await;
        let (mode, request) = {
            let mut state = self.state.lock().await;
            state.ensure_open()?;
            if state.submitting {
                debug!("composer: submit ignored, already in flight");
                return Ok(SubmitOutcome::AlreadyInFlight);
            }
            let request = match validate(&state.draft, &snapshot) {
                Ok(request) => request,
                Err(errors) => {
                    state.field_errors = errors.clone();
                    return Err(ComposerError::Invalid(errors));
                }
            };
            state.field_errors.clear();
            state.submitting = true;
            state.last_error = None;
            (state.mode.clone(), request)
        };

        info!(
            "composer: submitting mode={mode:?} supplier={} items={}",
            request.supplier_id,
            request.items.len()
        );
        let result = match &mode {
            Mode::Create => self.api.create_order(&request).await,
            Mode::Edit(order_id) => self.api.update_order(order_id, &request).await,
        };

        let mut state = self.state.lock().await;
        state.submitting = false;
        match result {
            Ok(order) => {
                info!("composer: order {} saved", order.id);
                state.draft = OrderDraft {
                    supplier_id: None,
                    items: Vec::new(),
                };
                state.completed = Some(order.clone());
                Ok(SubmitOutcome::Submitted(order))
            }
            Err(err) => {
                warn!("composer: submission failed: {err}");
                state.last_error = Some(SubmitFailure::from(&err));
                Err(ComposerError::Request(err))
            }
        }
    }

    pub async fn view(&self) -> ComposerView {
        let catalog = self.catalog.current().await;
        let state = self.state.lock().await;
        let product_options = if catalog.supplier_id.is_some()
            && catalog.supplier_id == state.draft.supplier_id
        {
            catalog
                .products
                .iter()
                .map(|product| ProductOption {
                    id: product.id.clone(),
                    label: product.option_label(),
                })
                .collect()
        } else {
            Vec::new()
        };
        ComposerView {
            mode: state.mode.clone(),
            supplier_locked: state.mode.locks_supplier(),
            initializing: state.initializing,
            draft: state.draft.clone(),
            suppliers: state.suppliers.clone(),
            product_options,
            catalog,
            field_errors: state.field_errors.clone(),
            submitting: state.submitting,
            last_error: state.last_error.clone(),
            load_error: state.load_error.clone(),
            completed: state.completed.clone(),
        }
    }
}

/// Checks the draft against local rules and the loaded catalog.
///
/// Returns the request body when the draft is complete, otherwise one error
/// per offending field.
pub fn validate(
    draft: &OrderDraft,
    catalog: &CatalogSnapshot,
) -> Result<OrderRequest, Vec<ValidationError>> {
    let mut errors = Vec::new();

    let supplier_id = draft.supplier_id.clone().filter(|id| !id.is_blank());
    if supplier_id.is_none() {
        errors.push(ValidationError::new(Field::Supplier, ValidationKind::Required));
    }
    if draft.items.is_empty() {
        errors.push(ValidationError::new(Field::Items, ValidationKind::NoItems));
    }

    let catalog_loaded = supplier_id
        .as_ref()
        .is_some_and(|id| catalog.is_loaded_for(id));

    let mut items = Vec::with_capacity(draft.items.len());
    for (index, item) in draft.items.iter().enumerate() {
        let product_id = item.product_id.clone().filter(|id| !id.is_blank());
        match &product_id {
            None => errors.push(ValidationError::new(
                Field::ItemProduct(index),
                ValidationKind::Required,
            )),
            Some(id) if catalog_loaded && !catalog.contains(id) => errors.push(
                ValidationError::new(Field::ItemProduct(index), ValidationKind::NotInCatalog),
            ),
            Some(_) => {}
        }

        let quantity = item.quantity.positive();
        match &item.quantity {
            Quantity::Unparsed(_) => errors.push(ValidationError::new(
                Field::ItemQuantity(index),
                ValidationKind::NotNumeric,
            )),
            Quantity::Count(0) => errors.push(ValidationError::new(
                Field::ItemQuantity(index),
                ValidationKind::NotPositive,
            )),
            Quantity::Count(_) => {}
        }

        if let (Some(product_id), Some(quantity)) = (product_id, quantity) {
            items.push(OrderItemRequest {
                product_id,
                quantity,
            });
        }
    }

    match supplier_id {
        Some(supplier_id) if errors.is_empty() => Ok(OrderRequest { supplier_id, items }),
        _ => Err(errors),
    }
}

#[cfg(test)]
#[path = "tests/composer_tests.rs"]
mod tests;
