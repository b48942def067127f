pub mod auth;
pub mod catalog;
pub mod composer;
pub mod config;
pub mod error;
pub mod gate;
pub mod gateway;
pub mod navigation;
pub mod session;

pub use auth::{sign_in, sign_out, SignInError};
pub use catalog::{CatalogLoader, CatalogSnapshot, LoadOutcome, SnapshotSource};
pub use composer::{
    CatalogUpdate, ComposerError, ComposerView, LineItemDraft, Mode, OrderComposer, OrderDraft,
    Quantity, SubmitFailure, SubmitOutcome, SupplierChange, ValidationError,
};
pub use config::{load_settings, ClientSettings};
pub use error::RequestError;
pub use gate::{GatePolicy, GateState, RenderDecision, SessionGate};
pub use gateway::{ApiGateway, ProcurementApi};
pub use session::{
    Credential, FileSessionPersistence, Identity, SessionError, SessionPersistence, SessionStore,
};

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
