use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use shared::{
    domain::{OrderId, SupplierId},
    error::ApiError,
    protocol::{AuthenticationResponse, LoginRequest, OrderRecord, OrderRequest, Product, Supplier},
};
use tracing::{debug, warn};

use crate::{error::RequestError, session::SessionStore};

/// Calls the order workflow makes against the back-office service.
#[async_trait]
pub trait ProcurementApi: Send + Sync {
    async fn list_suppliers(&self) -> Result<Vec<Supplier>, RequestError>;
    async fn list_products(&self, supplier_id: &SupplierId) -> Result<Vec<Product>, RequestError>;
    async fn fetch_order(&self, order_id: &OrderId) -> Result<OrderRecord, RequestError>;
    async fn create_order(&self, request: &OrderRequest) -> Result<OrderRecord, RequestError>;
    async fn update_order(
        &self,
        order_id: &OrderId,
        request: &OrderRequest,
    ) -> Result<OrderRecord, RequestError>;
}

/// HTTP client that attaches the session's bearer token to every call.
pub struct ApiGateway {
    http: Client,
    base_url: String,
    session: SessionStore,
}

impl ApiGateway {
    pub fn new(base_url: impl Into<String>, session: SessionStore) -> Self {
        Self::with_client(Client::new(), base_url, session)
    }

    pub fn with_client(http: Client, base_url: impl Into<String>, session: SessionStore) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http,
            base_url,
            session,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AuthenticationResponse, RequestError> {
        let request = self
            .http
            .post(format!("{}/auth/login", self.base_url))
            .json(&LoginRequest {
                username: username.to_string(),
                password: password.to_string(),
            });
        self.send(request).await
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, RequestError> {
        let request = match self.session.token().await {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request
            .send()
            .await
            .map_err(|err| RequestError::transport(err.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|err| RequestError::RequestFailed {
                    status: Some(status.as_u16()),
                    message: format!("invalid response body: {err}"),
                });
        }

        let body = response.text().await.unwrap_or_default();
        let error = classify_failure(status, &body);
        if error.is_auth_expired() {
            warn!("gateway: authorization rejected status={}", status.as_u16());
        } else {
            debug!("gateway: request failed status={}", status.as_u16());
        }
        Err(error)
    }
}

#[async_trait]
impl ProcurementApi for ApiGateway {
    async fn list_suppliers(&self) -> Result<Vec<Supplier>, RequestError> {
        self.send(self.http.get(format!("{}/suppliers", self.base_url))).await
    }

    async fn list_products(&self, supplier_id: &SupplierId) -> Result<Vec<Product>, RequestError> {
        self.send(
            self.http
                .get(format!("{}/products", self.base_url))
                .query(&[("supplierId", supplier_id.as_str())]),
        )
        .await
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<OrderRecord, RequestError> {
        self.send(self.http.get(format!("{}/orders/{}", self.base_url, order_id))).await
    }

    async fn create_order(&self, request: &OrderRequest) -> Result<OrderRecord, RequestError> {
        self.send(
            self.http
                .post(format!("{}/orders", self.base_url))
                .json(request),
        )
        .await
    }

    async fn update_order(
        &self,
        order_id: &OrderId,
        request: &OrderRequest,
    ) -> Result<OrderRecord, RequestError> {
        self.send(
            self.http
                .put(format!("{}/orders/{}", self.base_url, order_id))
                .json(request),
        )
        .await
    }
}

/// Maps a non-success response onto the request error taxonomy.
pub(crate) fn classify_failure(status: StatusCode, body: &str) -> RequestError {
    let message = serde_json::from_str::<ApiError>(body)
        .ok()
        .and_then(|err| err.best_message().map(str::to_string))
        .or_else(|| {
            let trimmed = body.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .or_else(|| status.canonical_reason().map(str::to_string))
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RequestError::AuthExpired {
            status: status.as_u16(),
            message,
        },
        _ => RequestError::RequestFailed {
            status: Some(status.as_u16()),
            message,
        },
    }
}

#[cfg(test)]
#[path = "tests/gateway_tests.rs"]
mod tests;
