//! Checkout flow: read the cart, purchase, clear the cart on success

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::{
    cart::CartStore,
    classify::classify_cart_error,
    error::CartStoreError,
    orchestrator::PurchaseOrchestrator,
    types::{ApprovalState, CheckoutStats, PurchaseOutcome, WalletIdentity},
};

/// Checkout service that ties the cart store to the orchestrator
pub struct CheckoutService {
    orchestrator: Arc<PurchaseOrchestrator>,
    cart_store: Arc<dyn CartStore>,
    stats: Arc<RwLock<CheckoutStats>>,
}

impl CheckoutService {
    /// Create a new checkout service
    pub fn new(orchestrator: Arc<PurchaseOrchestrator>, cart_store: Arc<dyn CartStore>) -> Self {
        Self::with_stats(
            orchestrator,
            cart_store,
            Arc::new(RwLock::new(CheckoutStats::default())),
        )
    }

    /// Create a checkout service recording into shared stats
    pub fn with_stats(
        orchestrator: Arc<PurchaseOrchestrator>,
        cart_store: Arc<dyn CartStore>,
        stats: Arc<RwLock<CheckoutStats>>,
    ) -> Self {
        Self {
            orchestrator,
            cart_store,
            stats,
        }
    }

    /// Buy everything in the wallet owner's cart.
    ///
    /// The cart is cleared only after a confirmed purchase.
    pub async fn checkout(&self, wallet: &WalletIdentity) -> PurchaseOutcome {
        let owner = wallet.address();

        let snapshot = match self.cart_store.get_cart(owner).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(wallet = %owner, error = %e, "Failed to read cart");
                let outcome: PurchaseOutcome = classify_cart_error(&e).into();
                self.stats.write().await.record_outcome(&outcome);
                return outcome;
            }
        };

        let (outcome, approval) = self.orchestrator.attempt(&snapshot, wallet).await;

        {
            let mut stats = self.stats.write().await;
            stats.record_outcome(&outcome);
            if approval != ApprovalState::NotRequested {
                stats.record_approval();
            }
        }

        if let PurchaseOutcome::Confirmed { transaction_id } = &outcome {
            match self.cart_store.clear(owner).await {
                Ok(()) => {
                    info!(
                        wallet = %owner,
                        tx_hash = %transaction_id,
                        "Checkout complete, cart cleared"
                    );
                }
                Err(e) => {
                    // The purchase went through; the cart is reconciled later.
                    error!(
                        wallet = %owner,
                        tx_hash = %transaction_id,
                        error = %e,
                        "Purchase confirmed but cart could not be cleared"
                    );
                    self.stats.write().await.record_clear_failure();
                }
            }
        }

        outcome
    }

    /// Remove one line from the wallet owner's cart
    pub async fn remove_line(
        &self,
        wallet: &WalletIdentity,
        line_id: &str,
    ) -> Result<(), CartStoreError> {
        self.cart_store.remove_line(wallet.address(), line_id).await
    }

    /// Get current statistics
    pub async fn stats(&self) -> CheckoutStats {
        self.stats.read().await.clone()
    }

    /// Shared statistics handle
    pub fn stats_ref(&self) -> Arc<RwLock<CheckoutStats>> {
        Arc::clone(&self.stats)
    }
}
