use super::ids::{AccountId, ListingId, PurchaseId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Durable proof that `buyer` bought `listing`. At most one exists per pair.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct PurchaseRecord {
    pub id: PurchaseId,
    pub buyer: AccountId,
    pub listing: ListingId,
    pub created_at: DateTime<Utc>,
}

impl PurchaseRecord {
    pub fn new(id: PurchaseId, buyer: AccountId, listing: ListingId) -> Self {
        Self {
            id,
            buyer,
            listing,
            created_at: Utc::now(),
        }
    }
}

/// Input of a single buy call.
#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
pub struct PurchaseRequest {
    pub buyer: AccountId,
    pub listing: ListingId,
}

impl PurchaseRequest {
    pub fn new(buyer: AccountId, listing: ListingId) -> Self {
        Self { buyer, listing }
    }
}
