//! Purchase orchestration: allowance check, optional approval, purchase.

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use alloy::primitives::{Address, TxHash, U256};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::classify::{classify, ClassifiedFailure, Stage};
use crate::error::RawFailure;
use crate::gateway::{MarketplaceGateway, TokenGateway};
use crate::types::{ApprovalState, CartSnapshot, PurchaseOutcome, PurchaseRequest, WalletIdentity};

/// Timeouts and approval policy for purchase attempts
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub allowance_timeout: Duration,
    pub approval_timeout: Duration,
    pub purchase_timeout: Duration,
    /// Approve `U256::MAX` instead of the cart total
    pub unlimited_approval: bool,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            allowance_timeout: Duration::from_secs(15),
            approval_timeout: Duration::from_secs(180),
            purchase_timeout: Duration::from_secs(120),
            unlimited_approval: false,
        }
    }
}

impl OrchestratorSettings {
    fn approval_amount(&self, total: U256) -> U256 {
        if self.unlimited_approval {
            U256::MAX
        } else {
            total
        }
    }
}

/// Turns a cart snapshot into an approve-then-purchase sequence.
///
/// Holds no per-attempt state beyond the set of wallets with an attempt in
/// flight, so failed attempts can always be retried with a fresh snapshot.
pub struct PurchaseOrchestrator {
    token: Arc<dyn TokenGateway>,
    marketplace: Arc<dyn MarketplaceGateway>,
    settings: OrchestratorSettings,
    in_flight: Arc<Mutex<HashSet<Address>>>,
}

impl PurchaseOrchestrator {
    pub fn new(
        token: Arc<dyn TokenGateway>,
        marketplace: Arc<dyn MarketplaceGateway>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            token,
            marketplace,
            settings,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Run one purchase attempt for `snapshot`, paid by `wallet`
    pub async fn purchase(
        &self,
        snapshot: &CartSnapshot,
        wallet: &WalletIdentity,
    ) -> PurchaseOutcome {
        self.attempt(snapshot, wallet).await.0
    }

    /// Like [`purchase`](Self::purchase), also reporting how far authorization got
    pub async fn attempt(
        &self,
        snapshot: &CartSnapshot,
        wallet: &WalletIdentity,
    ) -> (PurchaseOutcome, ApprovalState) {
        let attempt_id = Uuid::new_v4();
        let mut approval = ApprovalState::NotRequested;

        let outcome = match self.run(attempt_id, snapshot, wallet, &mut approval).await {
            Ok(tx_hash) => {
                let transaction_id = format!("0x{}", hex::encode(tx_hash.as_slice()));
                info!(
                    attempt_id = %attempt_id,
                    wallet = %wallet.address(),
                    tx_hash = %transaction_id,
                    approval = approval.as_str(),
                    "Purchase submitted"
                );
                PurchaseOutcome::Confirmed { transaction_id }
            }
            Err(failure) => {
                warn!(
                    attempt_id = %attempt_id,
                    wallet = %wallet.address(),
                    kind = failure.kind.as_str(),
                    retryable = failure.retryable,
                    approval = approval.as_str(),
                    "Purchase failed"
                );
                failure.into()
            }
        };

        (outcome, approval)
    }

    async fn run(
        &self,
        attempt_id: Uuid,
        snapshot: &CartSnapshot,
        wallet: &WalletIdentity,
        approval: &mut ApprovalState,
    ) -> Result<TxHash, ClassifiedFailure> {
        if !wallet.is_signable() {
            return Err(ClassifiedFailure::wallet_not_signable());
        }

        let request = PurchaseRequest::derive(snapshot).map_err(|defect| {
            debug!(attempt_id = %attempt_id, defect = %defect, "Rejecting cart");
            ClassifiedFailure::invalid_cart(&defect)
        })?;

        let _slot = InFlightSlot::acquire(&self.in_flight, wallet.address())
            .ok_or_else(ClassifiedFailure::purchase_in_progress)?;

        let total = U256::from(request.total_price());
        let spender = self.marketplace.address();

        info!(
            attempt_id = %attempt_id,
            wallet = %wallet.address(),
            items = snapshot.len(),
            total = %total,
            "Starting purchase"
        );

        let allowance = bounded(
            self.settings.allowance_timeout,
            self.token.current_allowance(wallet.address(), spender),
        )
        .await
        .map_err(|raw| self.reject(attempt_id, Stage::Allowance, &raw))?;

        if allowance < total {
            approval.advance(ApprovalState::Pending);
            let amount = self.settings.approval_amount(total);

            debug!(
                attempt_id = %attempt_id,
                allowance = %allowance,
                amount = %amount,
                "Requesting approval"
            );

            match bounded(
                self.settings.approval_timeout,
                self.token.approve(wallet, spender, amount),
            )
            .await
            {
                Ok(tx_hash) => {
                    approval.advance(ApprovalState::Granted);
                    debug!(attempt_id = %attempt_id, tx_hash = %tx_hash, "Approval granted");
                }
                Err(raw) => {
                    approval.advance(ApprovalState::Denied);
                    return Err(self.reject(attempt_id, Stage::Approval, &raw));
                }
            }
        } else {
            debug!(attempt_id = %attempt_id, allowance = %allowance, "Allowance covers total");
        }

        bounded(
            self.settings.purchase_timeout,
            self.marketplace.purchase(wallet, &request),
        )
        .await
        .map_err(|raw| self.reject(attempt_id, Stage::Purchase, &raw))
    }

    fn reject(&self, attempt_id: Uuid, stage: Stage, raw: &RawFailure) -> ClassifiedFailure {
        warn!(
            attempt_id = %attempt_id,
            stage = stage.as_str(),
            error = %raw,
            "Gateway call failed"
        );
        classify(stage, raw)
    }

    /// Whether an attempt for `wallet` is currently running
    pub fn is_in_flight(&self, wallet: Address) -> bool {
        lock(&self.in_flight).contains(&wallet)
    }
}

/// Await `future`, turning expiry of `limit` into a timeout failure
async fn bounded<T, F>(limit: Duration, future: F) -> Result<T, RawFailure>
where
    F: Future<Output = Result<T, RawFailure>>,
{
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result,
        Err(_) => Err(RawFailure::Timeout {
            seconds: limit.as_secs(),
        }),
    }
}

fn lock(set: &Mutex<HashSet<Address>>) -> MutexGuard<'_, HashSet<Address>> {
    // The set stays consistent even if a holder panicked.
    set.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Marks a wallet busy until dropped, including when the attempt is cancelled
struct InFlightSlot {
    set: Arc<Mutex<HashSet<Address>>>,
    wallet: Address,
}

impl InFlightSlot {
    fn acquire(set: &Arc<Mutex<HashSet<Address>>>, wallet: Address) -> Option<Self> {
        if !lock(set).insert(wallet) {
            return None;
        }
        Some(Self {
            set: Arc::clone(set),
            wallet,
        })
    }
}

impl Drop for InFlightSlot {
    fn drop(&mut self) {
        lock(&self.set).remove(&self.wallet);
    }
}
