//! Types for the checkout service

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One line of a cart as read from the cart store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineItem {
    /// Cart store identifier of this line
    pub line_id: String,

    /// Catalog product identifier
    pub product_id: String,

    /// On-chain collection token identifier
    pub token_id: u128,

    /// Unit price in the smallest currency unit
    pub unit_price: u128,

    /// Number of units
    pub quantity: u64,
}

/// Immutable read of a cart taken at the start of a purchase attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSnapshot {
    lines: Vec<CartLineItem>,
}

impl CartSnapshot {
    pub fn new(lines: Vec<CartLineItem>) -> Self {
        Self { lines }
    }

    pub fn lines(&self) -> &[CartLineItem] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }
}

/// Why a snapshot cannot be turned into a purchase
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestDefect {
    EmptyCart,
    ZeroQuantity { line_id: String },
    TotalOverflow,
}

impl fmt::Display for RequestDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestDefect::EmptyCart => write!(f, "cart is empty"),
            RequestDefect::ZeroQuantity { line_id } => {
                write!(f, "line {} has a zero quantity", line_id)
            }
            RequestDefect::TotalOverflow => write!(f, "cart total overflows"),
        }
    }
}

/// Marketplace call arguments derived from a borrowed snapshot.
///
/// `token_ids[i]` and `amounts[i]` always describe `snapshot.lines()[i]`.
#[derive(Debug, Clone)]
pub struct PurchaseRequest<'a> {
    snapshot: &'a CartSnapshot,
    token_ids: Vec<u128>,
    amounts: Vec<u64>,
    total_price: u128,
}

impl<'a> PurchaseRequest<'a> {
    /// Derive the request, recomputing the total from the snapshot
    pub fn derive(snapshot: &'a CartSnapshot) -> Result<Self, RequestDefect> {
        if snapshot.is_empty() {
            return Err(RequestDefect::EmptyCart);
        }

        let mut token_ids = Vec::with_capacity(snapshot.len());
        let mut amounts = Vec::with_capacity(snapshot.len());
        let mut total_price: u128 = 0;

        for line in snapshot.lines() {
            if line.quantity == 0 {
                return Err(RequestDefect::ZeroQuantity {
                    line_id: line.line_id.clone(),
                });
            }

            let line_total = line
                .unit_price
                .checked_mul(u128::from(line.quantity))
                .ok_or(RequestDefect::TotalOverflow)?;
            total_price = total_price
                .checked_add(line_total)
                .ok_or(RequestDefect::TotalOverflow)?;

            token_ids.push(line.token_id);
            amounts.push(line.quantity);
        }

        debug_assert_eq!(token_ids.len(), amounts.len());

        Ok(Self {
            snapshot,
            token_ids,
            amounts,
            total_price,
        })
    }

    pub fn snapshot(&self) -> &CartSnapshot {
        self.snapshot
    }

    pub fn token_ids(&self) -> &[u128] {
        &self.token_ids
    }

    pub fn amounts(&self) -> &[u64] {
        &self.amounts
    }

    pub fn total_price(&self) -> u128 {
        self.total_price
    }
}

/// Connect/disconnect state shared by every copy of a wallet identity
#[derive(Debug, Clone)]
pub struct WalletSession {
    connected: Arc<AtomicBool>,
}

impl WalletSession {
    pub fn connected() -> Self {
        Self {
            connected: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn connect(&self) {
        self.connected.store(true, Ordering::SeqCst);
    }

    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// The account purchases are signed and paid from
#[derive(Debug, Clone)]
pub struct WalletIdentity {
    address: Address,
    chain_id: u64,
    session: WalletSession,
}

impl WalletIdentity {
    pub fn new(address: Address, chain_id: u64) -> Self {
        Self {
            address,
            chain_id,
            session: WalletSession::connected(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn session(&self) -> &WalletSession {
        &self.session
    }

    /// Connected and backed by a real account
    pub fn is_signable(&self) -> bool {
        self.session.is_connected() && !self.address.is_zero()
    }
}

/// Closed set of failure kinds shown to the storefront
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    InvalidRequest,
    UserRejected,
    ApprovalFailed,
    PurchaseRejected,
    Network,
    Unknown,
}

impl FailureKind {
    pub const ALL: [FailureKind; 6] = [
        FailureKind::InvalidRequest,
        FailureKind::UserRejected,
        FailureKind::ApprovalFailed,
        FailureKind::PurchaseRejected,
        FailureKind::Network,
        FailureKind::Unknown,
    ];

    /// String representation for logs and metric labels
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::InvalidRequest => "invalid_request",
            FailureKind::UserRejected => "user_rejected",
            FailureKind::ApprovalFailed => "approval_failed",
            FailureKind::PurchaseRejected => "purchase_rejected",
            FailureKind::Network => "network",
            FailureKind::Unknown => "unknown",
        }
    }
}

/// Final result of one purchase attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PurchaseOutcome {
    Confirmed {
        transaction_id: String,
    },
    Failed {
        kind: FailureKind,
        message: String,
        retryable: bool,
    },
}

impl PurchaseOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, PurchaseOutcome::Confirmed { .. })
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            PurchaseOutcome::Confirmed { .. } => None,
            PurchaseOutcome::Failed { kind, .. } => Some(*kind),
        }
    }
}

/// Authorization progress within a single attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApprovalState {
    #[default]
    NotRequested,
    Pending,
    Granted,
    Denied,
}

impl ApprovalState {
    /// Move to `next` if the transition is legal.
    ///
    /// Returns false and leaves the state alone otherwise.
    pub fn advance(&mut self, next: ApprovalState) -> bool {
        let legal = matches!(
            (*self, next),
            (ApprovalState::NotRequested, ApprovalState::Pending)
                | (ApprovalState::Pending, ApprovalState::Granted)
                | (ApprovalState::Pending, ApprovalState::Denied)
        );
        if legal {
            *self = next;
        }
        legal
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalState::NotRequested => "not-requested",
            ApprovalState::Pending => "pending",
            ApprovalState::Granted => "granted",
            ApprovalState::Denied => "denied",
        }
    }
}

/// Checkout service statistics
#[derive(Debug, Clone, Default)]
pub struct CheckoutStats {
    pub total_attempts: u64,
    pub total_confirmed: u64,
    pub total_failed: u64,
    pub invalid_request: u64,
    pub user_rejected: u64,
    pub approval_failed: u64,
    pub purchase_rejected: u64,
    pub network: u64,
    pub unknown: u64,
    /// Attempts that needed an approval transaction
    pub approvals_requested: u64,
    /// Confirmed purchases whose cart could not be cleared
    pub cart_clear_failures: u64,
    pub last_transaction_id: Option<String>,
    pub last_confirmed_time: Option<DateTime<Utc>>,
}

impl CheckoutStats {
    /// Record the outcome of one attempt
    pub fn record_outcome(&mut self, outcome: &PurchaseOutcome) {
        self.total_attempts += 1;

        match outcome {
            PurchaseOutcome::Confirmed { transaction_id } => {
                self.total_confirmed += 1;
                self.last_transaction_id = Some(transaction_id.clone());
                self.last_confirmed_time = Some(Utc::now());
            }
            PurchaseOutcome::Failed { kind, .. } => {
                self.total_failed += 1;
                *self.failures_mut(*kind) += 1;
            }
        }
    }

    pub fn record_approval(&mut self) {
        self.approvals_requested += 1;
    }

    pub fn record_clear_failure(&mut self) {
        self.cart_clear_failures += 1;
    }

    pub fn failures(&self, kind: FailureKind) -> u64 {
        match kind {
            FailureKind::InvalidRequest => self.invalid_request,
            FailureKind::UserRejected => self.user_rejected,
            FailureKind::ApprovalFailed => self.approval_failed,
            FailureKind::PurchaseRejected => self.purchase_rejected,
            FailureKind::Network => self.network,
            FailureKind::Unknown => self.unknown,
        }
    }

    fn failures_mut(&mut self, kind: FailureKind) -> &mut u64 {
        match kind {
            FailureKind::InvalidRequest => &mut self.invalid_request,
            FailureKind::UserRejected => &mut self.user_rejected,
            FailureKind::ApprovalFailed => &mut self.approval_failed,
            FailureKind::PurchaseRejected => &mut self.purchase_rejected,
            FailureKind::Network => &mut self.network,
            FailureKind::Unknown => &mut self.unknown,
        }
    }

    /// Share of attempts that were confirmed
    pub fn success_rate(&self) -> f64 {
        if self.total_attempts == 0 {
            return 1.0;
        }
        self.total_confirmed as f64 / self.total_attempts as f64
    }
}
