//! Maps gateway and cart store failures onto the storefront's error kinds.
//!
//! Messages produced here are shown to shoppers verbatim, so they never carry
//! contract vocabulary, error codes, or addresses.

use serde::Serialize;

use crate::error::{CartStoreError, RawFailure};
use crate::types::{FailureKind, PurchaseOutcome, RequestDefect};

const MSG_EMPTY_CART: &str = "Your cart is empty. Add a product before checking out.";
const MSG_BAD_CART: &str =
    "Your cart contains an item we cannot check out. Please review your cart.";
const MSG_WALLET: &str = "Connect your wallet to complete the purchase.";
const MSG_BUSY: &str =
    "A purchase is already in progress for this wallet. Please wait for it to finish.";
const MSG_REJECTED: &str = "The request was cancelled in your wallet.";
const MSG_APPROVAL: &str = "We could not authorize the payment. Please try again.";
const MSG_PURCHASE: &str = "The purchase could not be completed. Please try again.";
const MSG_UNAVAILABLE: &str =
    "One or more products in your cart are no longer available. Please update your cart.";
const MSG_FUNDS: &str = "Your wallet balance is too low to complete this purchase.";
const MSG_NETWORK: &str = "The network is not responding. Please try again in a moment.";
const MSG_UNKNOWN: &str = "Something went wrong. Please try again.";

/// Revert reasons that will fail again until the cart or wallet changes
const PERMANENT_REASONS: &[&str] = &[
    "delisted",
    "not listed",
    "not for sale",
    "sold out",
    "insufficient balance",
    "exceeds balance",
];

/// Step of an attempt a raw failure came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Allowance,
    Approval,
    Purchase,
    /// Read-only collection balance lookup outside any attempt
    Holdings,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Allowance => "allowance",
            Stage::Approval => "approval",
            Stage::Purchase => "purchase",
            Stage::Holdings => "holdings",
        }
    }
}

/// A failure ready to show to the storefront
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedFailure {
    pub kind: FailureKind,
    pub message: String,
    pub retryable: bool,
}

impl ClassifiedFailure {
    fn new(kind: FailureKind, message: &str, retryable: bool) -> Self {
        Self {
            kind,
            message: message.to_string(),
            retryable,
        }
    }

    pub fn invalid_cart(defect: &RequestDefect) -> Self {
        let message = match defect {
            RequestDefect::EmptyCart => MSG_EMPTY_CART,
            _ => MSG_BAD_CART,
        };
        Self::new(FailureKind::InvalidRequest, message, false)
    }

    pub fn wallet_not_signable() -> Self {
        Self::new(FailureKind::InvalidRequest, MSG_WALLET, false)
    }

    pub fn purchase_in_progress() -> Self {
        Self::new(FailureKind::InvalidRequest, MSG_BUSY, false)
    }
}

impl From<ClassifiedFailure> for PurchaseOutcome {
    fn from(failure: ClassifiedFailure) -> Self {
        PurchaseOutcome::Failed {
            kind: failure.kind,
            message: failure.message,
            retryable: failure.retryable,
        }
    }
}

/// Classify a raw gateway failure seen at `stage`
pub fn classify(stage: Stage, failure: &RawFailure) -> ClassifiedFailure {
    use ClassifiedFailure as C;
    use FailureKind::*;

    match (stage, failure) {
        (_, RawFailure::WalletUnavailable { .. }) => C::new(InvalidRequest, MSG_WALLET, false),

        (
            Stage::Allowance | Stage::Holdings,
            RawFailure::Timeout { .. } | RawFailure::Transport { .. },
        ) => C::new(Network, MSG_NETWORK, true),
        (Stage::Allowance | Stage::Holdings, _) => C::new(Unknown, MSG_UNKNOWN, true),

        (Stage::Approval, RawFailure::UserRejected { .. }) => {
            C::new(UserRejected, MSG_REJECTED, true)
        }
        (Stage::Approval, RawFailure::InsufficientFunds { .. }) => {
            C::new(ApprovalFailed, MSG_FUNDS, false)
        }
        (
            Stage::Approval,
            RawFailure::Reverted { .. } | RawFailure::Timeout { .. } | RawFailure::Transport { .. },
        ) => C::new(ApprovalFailed, MSG_APPROVAL, true),
        (Stage::Approval, _) => C::new(Unknown, MSG_UNKNOWN, true),

        (Stage::Purchase, RawFailure::UserRejected { .. }) => {
            C::new(UserRejected, MSG_REJECTED, true)
        }
        (Stage::Purchase, RawFailure::Reverted { reason }) => classify_revert(reason),
        (Stage::Purchase, RawFailure::InsufficientFunds { .. }) => {
            C::new(PurchaseRejected, MSG_FUNDS, false)
        }
        (Stage::Purchase, RawFailure::Timeout { .. } | RawFailure::Transport { .. }) => {
            C::new(Network, MSG_NETWORK, true)
        }
        (Stage::Purchase, _) => C::new(Unknown, MSG_UNKNOWN, true),
    }
}

fn classify_revert(reason: &str) -> ClassifiedFailure {
    let lowered = reason.to_ascii_lowercase();

    match PERMANENT_REASONS.iter().find(|p| lowered.contains(*p)) {
        Some(p) if p.contains("balance") => {
            ClassifiedFailure::new(FailureKind::PurchaseRejected, MSG_FUNDS, false)
        }
        Some(_) => ClassifiedFailure::new(FailureKind::PurchaseRejected, MSG_UNAVAILABLE, false),
        None => ClassifiedFailure::new(FailureKind::PurchaseRejected, MSG_PURCHASE, true),
    }
}

/// Classify a failure to read the cart before an attempt
pub fn classify_cart_error(err: &CartStoreError) -> ClassifiedFailure {
    match err {
        CartStoreError::ParseError(_) => {
            ClassifiedFailure::new(FailureKind::InvalidRequest, MSG_BAD_CART, false)
        }
        e if e.is_transient() => ClassifiedFailure::new(FailureKind::Network, MSG_NETWORK, true),
        _ => ClassifiedFailure::new(FailureKind::Unknown, MSG_UNKNOWN, true),
    }
}
