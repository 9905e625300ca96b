//! CoFi Checkout Service
//!
//! Serves the storefront's checkout API and settles carts on-chain.

use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use cofi_checkout::{
    cart::CartStoreClient, gateway, CheckoutConfig, CheckoutService, HealthServer, HealthState,
    PurchaseOrchestrator,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,cofi_checkout=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_ansi(true)
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "CoFi checkout service starting"
    );

    let config = CheckoutConfig::from_env()?;

    info!(
        rpc = %config.rpc_url,
        token = %config.token_address,
        collection = %config.collection_address,
        marketplace = %config.marketplace_address,
        cart_store = %config.cart_store_url,
        local_signer = config.wallet_private_key.is_some(),
        unlimited_approval = config.unlimited_approval,
        http_port = config.http_port,
        "Configuration loaded"
    );

    let gateways = gateway::connect(&config).await?;

    let orchestrator = Arc::new(PurchaseOrchestrator::new(
        Arc::clone(&gateways.token),
        Arc::clone(&gateways.marketplace),
        config.orchestrator_settings(),
    ));

    let cart_store = Arc::new(CartStoreClient::new_with_timeouts(
        &config.cart_store_url,
        config.cart_request_timeout(),
        config.cart_connect_timeout(),
    ));
    if !cart_store.health().await {
        // Checkouts report a network failure until the cart store is back.
        error!(url = %config.cart_store_url, "Cart store is not reachable");
    }

    let service = Arc::new(CheckoutService::new(orchestrator, cart_store));

    let state = Arc::new(HealthState::new(
        service,
        gateways.wallet.clone(),
        Arc::clone(&gateways.collection),
    ));
    state.set_ready(true).await;

    let server = HealthServer::new(state, config.http_port);

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!(error = %e, "Checkout API failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    info!("Checkout service stopped");
    Ok(())
}
