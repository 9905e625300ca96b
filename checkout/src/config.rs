//! Configuration for the checkout service

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::orchestrator::OrchestratorSettings;

/// Checkout service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutConfig {
    /// JSON-RPC endpoint (chain node, or a wallet that signs for us)
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    /// Payment token contract address
    pub token_address: String,

    /// Product collection contract address
    pub collection_address: String,

    /// Marketplace contract address
    pub marketplace_address: String,

    /// Local signing key; when absent the RPC endpoint must sign
    #[serde(default)]
    pub wallet_private_key: Option<String>,

    /// Account address used with a remote signing wallet
    #[serde(default)]
    pub wallet_address: Option<String>,

    /// Cart store API URL
    #[serde(default = "default_cart_store_url")]
    pub cart_store_url: String,

    /// Cart store request timeout in seconds
    #[serde(default = "default_cart_request_timeout_secs")]
    pub cart_request_timeout_secs: u64,

    /// Cart store connect timeout in seconds
    #[serde(default = "default_cart_connect_timeout_secs")]
    pub cart_connect_timeout_secs: u64,

    /// Bound on the allowance read
    #[serde(default = "default_allowance_timeout_secs")]
    pub allowance_timeout_secs: u64,

    /// Bound on the approval, including the wallet prompt and confirmation
    #[serde(default = "default_approval_timeout_secs")]
    pub approval_timeout_secs: u64,

    /// Bound on the purchase, including the wallet prompt
    #[serde(default = "default_purchase_timeout_secs")]
    pub purchase_timeout_secs: u64,

    /// Approve the maximum amount instead of the cart total
    #[serde(default)]
    pub unlimited_approval: bool,

    /// Expected chain ID (0 = disable check)
    #[serde(default)]
    pub expected_chain_id: u64,

    /// HTTP API port
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

fn default_rpc_url() -> String {
    "http://localhost:8545".to_string()
}

fn default_cart_store_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_cart_request_timeout_secs() -> u64 {
    10
}

fn default_cart_connect_timeout_secs() -> u64 {
    3
}

fn default_allowance_timeout_secs() -> u64 {
    15
}

fn default_approval_timeout_secs() -> u64 {
    180
}

fn default_purchase_timeout_secs() -> u64 {
    120
}

fn default_http_port() -> u16 {
    9090
}

impl CheckoutConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            rpc_url: std::env::var("RPC_URL").unwrap_or_else(|_| default_rpc_url()),
            token_address: required("TOKEN_ADDRESS")?,
            collection_address: required("COLLECTION_ADDRESS")?,
            marketplace_address: required("MARKETPLACE_ADDRESS")?,
            wallet_private_key: optional("WALLET_PRIVATE_KEY"),
            wallet_address: optional("WALLET_ADDRESS"),
            cart_store_url: std::env::var("CART_STORE_URL")
                .unwrap_or_else(|_| default_cart_store_url()),
            cart_request_timeout_secs: std::env::var("CART_REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_cart_request_timeout_secs),
            cart_connect_timeout_secs: std::env::var("CART_CONNECT_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_cart_connect_timeout_secs),
            allowance_timeout_secs: std::env::var("ALLOWANCE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_allowance_timeout_secs),
            approval_timeout_secs: std::env::var("APPROVAL_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_approval_timeout_secs),
            purchase_timeout_secs: std::env::var("PURCHASE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_purchase_timeout_secs),
            unlimited_approval: std::env::var("UNLIMITED_APPROVAL")
                .ok()
                .map(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            expected_chain_id: std::env::var("EXPECTED_CHAIN_ID")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_http_port),
        };

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wallet_private_key.is_none() && self.wallet_address.is_none() {
            return Err(ConfigError::MissingEnvVar(
                "WALLET_PRIVATE_KEY or WALLET_ADDRESS".to_string(),
            ));
        }

        for (field, value) in [
            ("ALLOWANCE_TIMEOUT_SECS", self.allowance_timeout_secs),
            ("APPROVAL_TIMEOUT_SECS", self.approval_timeout_secs),
            ("PURCHASE_TIMEOUT_SECS", self.purchase_timeout_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    message: "must be greater than zero".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Orchestrator timeouts and approval policy
    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            allowance_timeout: Duration::from_secs(self.allowance_timeout_secs),
            approval_timeout: Duration::from_secs(self.approval_timeout_secs),
            purchase_timeout: Duration::from_secs(self.purchase_timeout_secs),
            unlimited_approval: self.unlimited_approval,
        }
    }

    pub fn cart_request_timeout(&self) -> Duration {
        Duration::from_secs(self.cart_request_timeout_secs)
    }

    pub fn cart_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.cart_connect_timeout_secs)
    }
}

fn required(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}
