//! Error types for the checkout service
//!
//! Gateways never hand provider errors to the orchestrator. They decode them
//! into [`RawFailure`], which the classifier turns into the user-facing
//! taxonomy. Cart store and configuration problems have their own enums.

use thiserror::Error;

/// EIP-1193: the user rejected the request.
const USER_REJECTED_CODE: i64 = 4001;
/// EIP-1193: the requested account or method has not been authorized.
const UNAUTHORIZED_CODE: i64 = 4100;
/// EIP-1193: the provider is disconnected from all chains.
const DISCONNECTED_CODE: i64 = 4900;
/// EIP-1193: the provider is not connected to the requested chain.
const CHAIN_DISCONNECTED_CODE: i64 = 4901;
/// Geth-style code for `execution reverted`.
const EXECUTION_REVERTED_CODE: i64 = 3;

const REVERT_PREFIX: &str = "execution reverted";

/// Failure shapes produced at the contract gateway boundary
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RawFailure {
    #[error("Wallet rejected the request: {message}")]
    UserRejected { message: String },

    #[error("Contract call reverted: {reason}")]
    Reverted { reason: String },

    #[error("Insufficient funds: {message}")]
    InsufficientFunds { message: String },

    #[error("Wallet unavailable: {message}")]
    WalletUnavailable { message: String },

    #[error("Timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Transport failure: {message}")]
    Transport { message: String },

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Unrecognized failure: {0}")]
    Unrecognized(String),
}

impl RawFailure {
    /// Decode a JSON-RPC error response returned by a node or wallet
    pub fn from_rpc_payload(code: i64, message: &str) -> Self {
        let lowered = message.to_ascii_lowercase();

        if code == USER_REJECTED_CODE
            || lowered.contains("user rejected")
            || lowered.contains("user denied")
        {
            return RawFailure::UserRejected {
                message: message.to_string(),
            };
        }

        if matches!(
            code,
            UNAUTHORIZED_CODE | DISCONNECTED_CODE | CHAIN_DISCONNECTED_CODE
        ) {
            return RawFailure::WalletUnavailable {
                message: message.to_string(),
            };
        }

        if lowered.contains("insufficient funds") {
            return RawFailure::InsufficientFunds {
                message: message.to_string(),
            };
        }

        if code == EXECUTION_REVERTED_CODE || lowered.contains(REVERT_PREFIX) {
            return RawFailure::Reverted {
                reason: revert_reason(message),
            };
        }

        RawFailure::Rpc {
            code,
            message: message.to_string(),
        }
    }
}

/// Strip the `execution reverted:` prefix nodes put in front of the reason
fn revert_reason(message: &str) -> String {
    let trimmed = message.trim();
    let lowered = trimmed.to_ascii_lowercase();

    match lowered.find(REVERT_PREFIX) {
        Some(start) => {
            let rest = &trimmed[start + REVERT_PREFIX.len()..];
            let rest = rest.trim_start_matches(':').trim();
            if rest.is_empty() {
                "execution reverted".to_string()
            } else {
                rest.to_string()
            }
        }
        None => trimmed.to_string(),
    }
}

/// Cart store API errors
#[derive(Error, Debug)]
pub enum CartStoreError {
    #[error("Failed to connect to cart store at {url}: {message}")]
    ConnectionFailed { url: String, message: String },

    #[error("Cart store returned error status {status}: {body}")]
    HttpError { status: u16, body: String },

    #[error("Failed to parse cart store response: {0}")]
    ParseError(String),

    #[error("Cart store request timeout after {seconds}s")]
    Timeout { seconds: u64 },
}

impl CartStoreError {
    /// Whether a fresh attempt may succeed without changing the cart
    pub fn is_transient(&self) -> bool {
        match self {
            CartStoreError::ConnectionFailed { .. } => true,
            CartStoreError::Timeout { .. } => true,
            CartStoreError::HttpError { status, .. } => *status >= 500,
            CartStoreError::ParseError(_) => false,
        }
    }
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Invalid private key format")]
    InvalidPrivateKey,

    #[error("Invalid address format for {field}: {value}")]
    InvalidAddress { field: String, value: String },

    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
}
