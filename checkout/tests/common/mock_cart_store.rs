//! Mock cart store API for integration testing
//!
//! Provides a wiremock-based mock server that simulates the storefront cart store.

use alloy::primitives::Address;
use serde_json::json;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

/// One cart item as the cart store serves it
#[derive(Debug, Clone)]
pub struct TestCartItem {
    pub line_id: String,
    pub product_id: String,
    pub token_id: u128,
    pub price: u128,
    pub quantity: u64,
}

impl TestCartItem {
    pub fn new(line_id: &str, token_id: u128, price: u128, quantity: u64) -> Self {
        Self {
            line_id: line_id.to_string(),
            product_id: format!("product-{}", token_id),
            token_id,
            price,
            quantity,
        }
    }

    fn to_json(&self) -> serde_json::Value {
        json!({
            "id": self.line_id,
            "quantity": self.quantity,
            "product": {
                "id": self.product_id,
                "tokenId": self.token_id as u64,
                "price": self.price as u64,
                "name": format!("Coffee lot {}", self.token_id),
            }
        })
    }
}

/// Mock cart store server
pub struct MockCartStore {
    server: MockServer,
}

impl MockCartStore {
    /// Start a new mock cart store
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Get the server URL
    pub fn url(&self) -> String {
        self.server.uri()
    }

    fn cart_path(owner: Address) -> String {
        format!("/v1/carts/{}", owner)
    }

    /// Set up mock for GET /v1/carts/{owner}
    pub async fn mock_cart(&self, owner: Address, items: &[TestCartItem]) {
        let body = json!({
            "items": items.iter().map(TestCartItem::to_json).collect::<Vec<_>>()
        });

        Mock::given(method("GET"))
            .and(path(Self::cart_path(owner)))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Mock an error response for the cart read
    pub async fn mock_cart_error(&self, owner: Address, status_code: u16) {
        Mock::given(method("GET"))
            .and(path(Self::cart_path(owner)))
            .respond_with(ResponseTemplate::new(status_code))
            .mount(&self.server)
            .await;
    }

    /// Serve a body the client cannot parse
    pub async fn mock_malformed_cart(&self, owner: Address) {
        Mock::given(method("GET"))
            .and(path(Self::cart_path(owner)))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"items\": 42}"))
            .mount(&self.server)
            .await;
    }

    /// Set up mock for DELETE /v1/carts/{owner}, expecting `times` calls
    pub async fn mock_clear(&self, owner: Address, times: u64) {
        Mock::given(method("DELETE"))
            .and(path(Self::cart_path(owner)))
            .respond_with(ResponseTemplate::new(204))
            .expect(times)
            .mount(&self.server)
            .await;
    }

    /// Set up mock for DELETE /v1/carts/{owner}/items/{line_id}
    pub async fn mock_remove_line(&self, owner: Address, line_id: &str, status_code: u16) {
        Mock::given(method("DELETE"))
            .and(path(format!("{}/items/{}", Self::cart_path(owner), line_id)))
            .respond_with(ResponseTemplate::new(status_code))
            .mount(&self.server)
            .await;
    }

    /// Verify expectations set with `expect`
    pub async fn verify(&self) {
        self.server.verify().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_server_starts() {
        let mock = MockCartStore::start().await;
        assert!(!mock.url().is_empty());
    }

    #[tokio::test]
    async fn test_cart_endpoint() {
        let mock = MockCartStore::start().await;
        let owner = Address::repeat_byte(0x11);
        mock.mock_cart(owner, &[TestCartItem::new("line-1", 101, 500, 2)])
            .await;

        let response = reqwest::get(format!("{}/v1/carts/{}", mock.url(), owner))
            .await
            .unwrap();
        assert_eq!(response.status(), 200);

        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["items"][0]["product"]["tokenId"], 101);
    }
}
