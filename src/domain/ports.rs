//! Storage ports implemented by the infrastructure adapters.
//!
//! Plain CRUD goes through the per-entity stores. Anything that moves money
//! goes through a [`LedgerTx`], which holds row locks until it is committed,
//! rolled back or dropped.

use super::account::{Account, AccountPatch, Amount, Balance, NewAccount};
use super::comment::{Comment, NewComment};
use super::ids::{AccountId, CommentId, ListingId};
use super::listing::{Listing, ListingPatch, NewListing};
use super::purchase::PurchaseRecord;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Fails with `Conflict` if the email is taken.
    async fn insert(&self, account: NewAccount) -> Result<Account>;
    async fn get(&self, id: AccountId) -> Result<Option<Account>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>>;
    async fn update(&self, id: AccountId, patch: AccountPatch) -> Result<Account>;
    /// Atomic increment of the balance.
    async fn deposit(&self, id: AccountId, amount: Amount) -> Result<Account>;
    /// Removes the account with its listings, purchases and comments.
    async fn delete(&self, id: AccountId) -> Result<()>;
    async fn all(&self) -> Result<Vec<Account>>;
}

#[async_trait]
pub trait ListingStore: Send + Sync {
    /// Fails with `Conflict` if the title is taken.
    async fn insert(&self, owner: Option<AccountId>, listing: NewListing) -> Result<Listing>;
    /// Inserts all listings or none of them.
    async fn insert_many(
        &self,
        owner: Option<AccountId>,
        listings: Vec<NewListing>,
    ) -> Result<Vec<Listing>>;
    async fn get(&self, id: ListingId) -> Result<Option<Listing>>;
    async fn update(&self, id: ListingId, patch: ListingPatch) -> Result<Listing>;
    /// Removes the listing with its purchase records and comments.
    async fn delete(&self, id: ListingId) -> Result<()>;
    async fn all(&self) -> Result<Vec<Listing>>;
    async fn count(&self) -> Result<usize>;
}

#[async_trait]
pub trait PurchaseStore: Send + Sync {
    async fn exists_for(&self, buyer: AccountId, listing: ListingId) -> Result<bool>;
    async fn for_buyer(&self, buyer: AccountId) -> Result<Vec<PurchaseRecord>>;
}

#[async_trait]
pub trait CommentStore: Send + Sync {
    /// Fails with `Conflict` on a second comment by the same author.
    async fn insert(&self, comment: NewComment) -> Result<Comment>;
    async fn get(&self, id: CommentId) -> Result<Option<Comment>>;
    async fn for_listing(&self, listing: ListingId) -> Result<Vec<Comment>>;
    async fn delete(&self, id: CommentId) -> Result<()>;
}

/// Source of lock-scoped transactions.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn begin<'a>(&'a self) -> Result<Box<dyn LedgerTx + 'a>>;
}

/// A unit of work over accounts, listings and purchase records.
///
/// Reads observe the transaction's own staged writes. Nothing is visible to
/// other readers before `commit`. Dropping without committing rolls back.
#[async_trait]
pub trait LedgerTx: Send {
    /// Reads the listing and holds its exclusive row lock until the end of
    /// the transaction. Fails with `Busy` if the lock wait times out.
    async fn listing_for_update(&mut self, id: ListingId) -> Result<Option<Listing>>;
    /// Reads the account and holds its exclusive row lock.
    async fn account_for_update(&mut self, id: AccountId) -> Result<Option<Account>>;
    /// Reads the account without locking it.
    async fn account(&mut self, id: AccountId) -> Result<Option<Account>>;
    async fn purchase_exists(&mut self, buyer: AccountId, listing: ListingId) -> Result<bool>;
    /// Stages a signed balance change.
    async fn adjust_balance(&mut self, id: AccountId, delta: Balance) -> Result<()>;
    async fn insert_purchase(&mut self, buyer: AccountId, listing: ListingId) -> Result<()>;
    async fn commit(self: Box<Self>) -> Result<()>;
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Everything a full backend provides.
pub trait MarketStore: AccountStore + ListingStore + PurchaseStore + CommentStore + Ledger {}

impl<T> MarketStore for T where T: AccountStore + ListingStore + PurchaseStore + CommentStore + Ledger {}

pub type AccountStoreRef = Arc<dyn AccountStore>;
pub type ListingStoreRef = Arc<dyn ListingStore>;
pub type PurchaseStoreRef = Arc<dyn PurchaseStore>;
pub type CommentStoreRef = Arc<dyn CommentStore>;
pub type LedgerRef = Arc<dyn Ledger>;
