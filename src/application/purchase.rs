use crate::domain::account::Balance;
use crate::domain::ports::{LedgerRef, LedgerTx};
use crate::domain::purchase::PurchaseRequest;
use crate::domain::listing::ListingView;
use crate::error::MarketError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Why a purchase did not happen.
#[derive(Error, Debug)]
pub enum PurchaseError {
    #[error("Game not found.")]
    NotFound,
    #[error("Already purchased.")]
    AlreadyPurchased,
    #[error("Insufficient funds.")]
    InsufficientFunds,
    #[error("You cannot buy your own game.")]
    OwnListing,
    #[error("Account not found.")]
    UnknownBuyer,
    #[error("Store busy, retry later.")]
    Busy,
    #[error("Store failure: {0}")]
    Store(MarketError),
}

impl PurchaseError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, PurchaseError::Busy)
    }
}

impl From<MarketError> for PurchaseError {
    fn from(err: MarketError) -> Self {
        if err.is_busy() {
            PurchaseError::Busy
        } else {
            PurchaseError::Store(err)
        }
    }
}

/// What happens when an owner tries to buy their own listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelfPurchasePolicy {
    /// Treated like any other purchase: the owner pays themselves.
    #[default]
    Allow,
    /// Refused with `OwnListing`.
    Reject,
}

impl FromStr for SelfPurchasePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "allow" => Ok(SelfPurchasePolicy::Allow),
            "reject" => Ok(SelfPurchasePolicy::Reject),
            other => Err(format!("unknown self-purchase policy: {other}")),
        }
    }
}

/// Backoff schedule for `Busy` outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(25),
        }
    }
}

impl RetryPolicy {
    fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// Executes buy requests as single lock-scoped transactions.
///
/// The listing row is locked first, then the buyer and seller accounts in
/// ascending id order. Every purchase of a listing is therefore serialised,
/// and two buyers paying each other cannot deadlock.
#[derive(Clone)]
pub struct PurchaseEngine {
    ledger: LedgerRef,
    policy: SelfPurchasePolicy,
}

impl PurchaseEngine {
    pub fn new(ledger: LedgerRef) -> Self {
        Self {
            ledger,
            policy: SelfPurchasePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: SelfPurchasePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> SelfPurchasePolicy {
        self.policy
    }

    /// Buys `request.listing` for `request.buyer`.
    ///
    /// On any error nothing is written: the transaction is rolled back and
    /// its row locks released.
    pub async fn purchase(
        &self,
        request: PurchaseRequest,
    ) -> std::result::Result<ListingView, PurchaseError> {
        let mut tx = self.ledger.begin().await?;
        match self.run(tx.as_mut(), &request).await {
            Ok(view) => {
                tx.commit().await?;
                info!(
                    buyer = %request.buyer,
                    listing = %request.listing,
                    price = %view.price,
                    "purchase committed"
                );
                Ok(view)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "rollback failed");
                }
                debug!(
                    buyer = %request.buyer,
                    listing = %request.listing,
                    error = %err,
                    "purchase rejected"
                );
                Err(err)
            }
        }
    }

    /// Like [`purchase`](Self::purchase), retrying `Busy` outcomes with
    /// exponential backoff.
    pub async fn purchase_with_retry(
        &self,
        request: PurchaseRequest,
        retry: RetryPolicy,
    ) -> std::result::Result<ListingView, PurchaseError> {
        let mut attempt = 1;
        loop {
            match self.purchase(request).await {
                Err(err) if err.is_retryable() && attempt < retry.max_attempts => {
                    let delay = retry.delay_for(attempt);
                    warn!(attempt, ?delay, listing = %request.listing, "store busy, retrying purchase");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                outcome => return outcome,
            }
        }
    }

    async fn run(
        &self,
        tx: &mut (dyn LedgerTx + '_),
        request: &PurchaseRequest,
    ) -> std::result::Result<ListingView, PurchaseError> {
        let listing = tx
            .listing_for_update(request.listing)
            .await?
            .ok_or(PurchaseError::NotFound)?;

        if self.policy == SelfPurchasePolicy::Reject && listing.is_owned_by(request.buyer) {
            return Err(PurchaseError::OwnListing);
        }
        if tx.purchase_exists(request.buyer, listing.id).await? {
            return Err(PurchaseError::AlreadyPurchased);
        }

        let mut to_lock = vec![request.buyer];
        if let Some(owner) = listing.owner
            && owner != request.buyer
        {
            to_lock.push(owner);
        }
        to_lock.sort();
        let mut buyer = None;
        for id in to_lock {
            let account = tx.account_for_update(id).await?;
            if id == request.buyer {
                buyer = account;
            }
        }
        let buyer = buyer.ok_or(PurchaseError::UnknownBuyer)?;

        let price = Balance::from(listing.price);
        if buyer.balance < price {
            return Err(PurchaseError::InsufficientFunds);
        }

        tx.adjust_balance(buyer.id, -price).await?;
        let seller = match listing.owner {
            Some(owner) => {
                tx.adjust_balance(owner, price).await?;
                tx.account(owner).await?
            }
            None => {
                debug!(listing = %listing.id, price = %listing.price, "unowned listing, payment has no recipient");
                None
            }
        };
        tx.insert_purchase(buyer.id, listing.id).await?;

        Ok(ListingView::new(listing, seller.as_ref()))
    }
}
