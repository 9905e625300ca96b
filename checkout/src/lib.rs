//! CoFi Checkout Service
//!
//! Settles storefront carts on-chain: authorizes the payment token for the
//! marketplace when needed, submits a single multi-item purchase, and reports
//! a stable outcome the storefront can show without knowing about the chain.

pub mod cart;
pub mod classify;
pub mod config;
pub mod error;
pub mod gateway;
pub mod health;
pub mod orchestrator;
pub mod service;
pub mod types;


pub use config::CheckoutConfig;
pub use health::{HealthServer, HealthState};
pub use orchestrator::{OrchestratorSettings, PurchaseOrchestrator};
pub use service::CheckoutService;
pub use types::*;
