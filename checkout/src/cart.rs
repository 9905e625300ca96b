//! Client for the storefront cart store API

use std::time::Duration;

use alloy::primitives::Address;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::CartStoreError;
use crate::types::{CartLineItem, CartSnapshot};

/// Cart persistence owned by the storefront
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Fresh snapshot of the owner's cart
    async fn get_cart(&self, owner: Address) -> Result<CartSnapshot, CartStoreError>;

    async fn remove_line(&self, owner: Address, line_id: &str) -> Result<(), CartStoreError>;

    async fn clear(&self, owner: Address) -> Result<(), CartStoreError>;
}

/// Cart as returned by the cart store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartResponse {
    pub items: Vec<CartItemRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemRecord {
    pub id: String,
    pub quantity: u64,
    pub product: ProductRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    pub id: String,
    pub token_id: u128,
    pub price: u128,
    #[serde(default)]
    pub name: Option<String>,
}

impl From<CartResponse> for CartSnapshot {
    fn from(response: CartResponse) -> Self {
        CartSnapshot::new(
            response
                .items
                .into_iter()
                .map(|item| CartLineItem {
                    line_id: item.id,
                    product_id: item.product.id,
                    token_id: item.product.token_id,
                    unit_price: item.product.price,
                    quantity: item.quantity,
                })
                .collect(),
        )
    }
}

/// HTTP client for the cart store
pub struct CartStoreClient {
    base_url: String,
    client: reqwest::Client,
    request_timeout: Duration,
}

impl CartStoreClient {
    const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
    const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 3;

    /// Create a new cart store client
    pub fn new(base_url: &str) -> Self {
        Self::new_with_timeouts(
            base_url,
            Duration::from_secs(Self::DEFAULT_REQUEST_TIMEOUT_SECS),
            Duration::from_secs(Self::DEFAULT_CONNECT_TIMEOUT_SECS),
        )
    }

    /// Create a new cart store client with timeouts
    pub fn new_with_timeouts(
        base_url: &str,
        request_timeout: Duration,
        connect_timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()
            .unwrap_or_else(|err| {
                warn!(
                    error = %err,
                    "Failed to build cart store HTTP client with timeouts; falling back to defaults"
                );
                reqwest::Client::new()
            });

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            request_timeout,
        }
    }

    fn cart_url(&self, owner: Address) -> String {
        format!("{}/v1/carts/{}", self.base_url, owner)
    }

    fn request_error(&self, url: &str, err: reqwest::Error) -> CartStoreError {
        if err.is_timeout() {
            CartStoreError::Timeout {
                seconds: self.request_timeout.as_secs(),
            }
        } else if err.is_decode() {
            CartStoreError::ParseError(err.to_string())
        } else {
            CartStoreError::ConnectionFailed {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }

    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, CartStoreError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(CartStoreError::HttpError { status, body })
    }

    async fn delete(&self, url: String) -> Result<(), CartStoreError> {
        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(|e| self.request_error(&url, e))?;
        Self::ensure_success(response).await?;
        Ok(())
    }

    /// Health check
    pub async fn health(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

#[async_trait]
impl CartStore for CartStoreClient {
    async fn get_cart(&self, owner: Address) -> Result<CartSnapshot, CartStoreError> {
        let url = self.cart_url(owner);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.request_error(&url, e))?;
        let response = Self::ensure_success(response).await?;

        let body = response
            .bytes()
            .await
            .map_err(|e| self.request_error(&url, e))?;
        let cart: CartResponse =
            serde_json::from_slice(&body).map_err(|e| CartStoreError::ParseError(e.to_string()))?;

        debug!(owner = %owner, lines = cart.items.len(), "Fetched cart");
        Ok(cart.into())
    }

    async fn remove_line(&self, owner: Address, line_id: &str) -> Result<(), CartStoreError> {
        let url = format!("{}/items/{}", self.cart_url(owner), line_id);
        self.delete(url).await
    }

    async fn clear(&self, owner: Address) -> Result<(), CartStoreError> {
        let url = self.cart_url(owner);
        self.delete(url).await?;
        debug!(owner = %owner, "Cleared cart");
        Ok(())
    }
}
