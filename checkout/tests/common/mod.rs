//! Common test utilities for integration tests

pub mod mock_cart_store;
pub mod mock_rpc;

pub use mock_cart_store::MockCartStore;
pub use mock_rpc::MockRpc;
