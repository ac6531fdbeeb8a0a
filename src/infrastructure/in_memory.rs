use crate::domain::account::{Account, AccountPatch, Amount, Balance, NewAccount};
use crate::domain::comment::{Comment, NewComment};
use crate::domain::ids::{AccountId, CommentId, ListingId, PurchaseId};
use crate::domain::listing::{Listing, ListingPatch, NewListing};
use crate::domain::ports::{
    AccountStore, CommentStore, Ledger, LedgerTx, ListingStore, PurchaseStore,
};
use crate::domain::purchase::PurchaseRecord;
use crate::error::{MarketError, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::Display;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, warn};

/// Default upper bound on waiting for a row lock.
pub const DEFAULT_LOCK_WAIT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct Sequences {
    account: u64,
    listing: u64,
    purchase: u64,
    comment: u64,
}

impl Sequences {
    fn next(counter: &mut u64) -> u64 {
        *counter += 1;
        *counter
    }
}

#[derive(Default)]
struct Tables {
    accounts: BTreeMap<AccountId, Account>,
    listings: BTreeMap<ListingId, Listing>,
    purchases: BTreeMap<PurchaseId, PurchaseRecord>,
    purchase_pairs: HashMap<(AccountId, ListingId), PurchaseId>,
    comments: BTreeMap<CommentId, Comment>,
    seq: Sequences,
}

impl Tables {
    fn email_taken(&self, email: &str, except: Option<AccountId>) -> bool {
        self.accounts
            .values()
            .any(|a| Some(a.id) != except && a.email.eq_ignore_ascii_case(email))
    }

    fn title_taken(&self, title: &str, except: Option<ListingId>) -> bool {
        self.listings
            .values()
            .any(|l| Some(l.id) != except && l.title == title)
    }

    fn remove_listing(&mut self, id: ListingId) {
        self.listings.remove(&id);
        self.purchases.retain(|_, p| p.listing != id);
        self.purchase_pairs.retain(|(_, listing), _| *listing != id);
        self.comments.retain(|_, c| c.listing != id);
    }

    fn remove_account(&mut self, id: AccountId) {
        let owned: Vec<ListingId> = self
            .listings
            .values()
            .filter(|l| l.is_owned_by(id))
            .map(|l| l.id)
            .collect();
        for listing in owned {
            self.remove_listing(listing);
        }
        self.purchases.retain(|_, p| p.buyer != id);
        self.purchase_pairs.retain(|(buyer, _), _| *buyer != id);
        self.comments.retain(|_, c| c.author != id);
        self.accounts.remove(&id);
    }
}

/// Registry of per-row exclusive locks.
struct RowLocks<K> {
    rows: DashMap<K, Arc<Mutex<()>>>,
}

impl<K: Eq + Hash + Copy + Display> RowLocks<K> {
    fn new() -> Self {
        Self {
            rows: DashMap::new(),
        }
    }

    async fn acquire(&self, key: K, wait: Duration) -> Result<OwnedMutexGuard<()>> {
        let row = self.rows.entry(key).or_default().clone();
        tokio::time::timeout(wait, row.lock_owned())
            .await
            .map_err(|_| {
                warn!(row = %key, ?wait, "row lock wait timed out");
                MarketError::Busy(format!("Lock wait timeout on row {key}"))
            })
    }

    fn forget(&self, key: &K) {
        self.rows.remove(key);
    }
}

/// A thread-safe in-memory backend.
///
/// All tables live behind one `Arc<RwLock<..>>` so a commit applies every
/// staged change under a single write lock. Row locks are separate
/// `tokio::sync::Mutex`es keyed by id, held by a transaction until it ends.
#[derive(Clone)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    listing_locks: Arc<RowLocks<ListingId>>,
    account_locks: Arc<RowLocks<AccountId>>,
    lock_wait: Duration,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Creates a new, empty store.
    pub fn new() -> Self {
        Self::with_lock_wait(DEFAULT_LOCK_WAIT)
    }

    pub fn with_lock_wait(lock_wait: Duration) -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
            listing_locks: Arc::new(RowLocks::new()),
            account_locks: Arc::new(RowLocks::new()),
            lock_wait,
        }
    }

    async fn lock_listing(&self, id: ListingId) -> Result<OwnedMutexGuard<()>> {
        self.listing_locks.acquire(id, self.lock_wait).await
    }

    async fn lock_account(&self, id: AccountId) -> Result<OwnedMutexGuard<()>> {
        self.account_locks.acquire(id, self.lock_wait).await
    }
}

#[async_trait]
impl AccountStore for InMemoryStore {
    async fn insert(&self, account: NewAccount) -> Result<Account> {
        let mut tables = self.tables.write().await;
        if tables.email_taken(&account.email, None) {
            return Err(MarketError::Conflict(
                "A user with that email already exists.".to_string(),
            ));
        }
        let id = AccountId(Sequences::next(&mut tables.seq.account));
        let account = Account::new(id, account);
        tables.accounts.insert(id, account.clone());
        Ok(account)
    }

    async fn get(&self, id: AccountId) -> Result<Option<Account>> {
        let tables = self.tables.read().await;
        Ok(tables.accounts.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        let tables = self.tables.read().await;
        Ok(tables
            .accounts
            .values()
            .find(|a| a.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn update(&self, id: AccountId, patch: AccountPatch) -> Result<Account> {
        let mut tables = self.tables.write().await;
        if let Some(email) = &patch.email
            && tables.email_taken(email, Some(id))
        {
            return Err(MarketError::Conflict(
                "A user with that email already exists.".to_string(),
            ));
        }
        let account = tables
            .accounts
            .get_mut(&id)
            .ok_or_else(|| MarketError::NotFound("User not found.".to_string()))?;
        account.apply(patch);
        Ok(account.clone())
    }

    async fn deposit(&self, id: AccountId, amount: Amount) -> Result<Account> {
        let mut tables = self.tables.write().await;
        let account = tables
            .accounts
            .get_mut(&id)
            .ok_or_else(|| MarketError::NotFound("User not found.".to_string()))?;
        account.deposit(amount)?;
        Ok(account.clone())
    }

    async fn delete(&self, id: AccountId) -> Result<()> {
        let owned: Vec<ListingId> = {
            let tables = self.tables.read().await;
            tables
                .listings
                .values()
                .filter(|l| l.is_owned_by(id))
                .map(|l| l.id)
                .collect()
        };
        // Same order as a purchase: listings first, then the account.
        let mut guards = Vec::with_capacity(owned.len() + 1);
        for listing in &owned {
            guards.push(self.lock_listing(*listing).await?);
        }
        guards.push(self.lock_account(id).await?);

        let mut tables = self.tables.write().await;
        if !tables.accounts.contains_key(&id) {
            return Err(MarketError::NotFound("User not found.".to_string()));
        }
        tables.remove_account(id);
        drop(tables);
        drop(guards);
        for listing in &owned {
            self.listing_locks.forget(listing);
        }
        self.account_locks.forget(&id);
        Ok(())
    }

    async fn all(&self) -> Result<Vec<Account>> {
        let tables = self.tables.read().await;
        Ok(tables.accounts.values().cloned().collect())
    }
}

#[async_trait]
impl ListingStore for InMemoryStore {
    async fn insert(&self, owner: Option<AccountId>, listing: NewListing) -> Result<Listing> {
        let mut created = self.insert_many(owner, vec![listing]).await?;
        created
            .pop()
            .ok_or_else(|| MarketError::InternalError("Listing insert returned nothing".to_string()))
    }

    async fn insert_many(
        &self,
        owner: Option<AccountId>,
        listings: Vec<NewListing>,
    ) -> Result<Vec<Listing>> {
        let mut tables = self.tables.write().await;
        if let Some(owner) = owner
            && !tables.accounts.contains_key(&owner)
        {
            return Err(MarketError::NotFound("User not found.".to_string()));
        }
        let mut titles = HashSet::new();
        for listing in &listings {
            if tables.title_taken(&listing.title, None) || !titles.insert(listing.title.as_str()) {
                return Err(MarketError::Conflict(format!(
                    "A game with the title \"{}\" already exists.",
                    listing.title
                )));
            }
        }
        let mut created = Vec::with_capacity(listings.len());
        for listing in listings {
            let id = ListingId(Sequences::next(&mut tables.seq.listing));
            let listing = Listing::new(id, owner, listing);
            tables.listings.insert(id, listing.clone());
            created.push(listing);
        }
        Ok(created)
    }

    async fn get(&self, id: ListingId) -> Result<Option<Listing>> {
        let tables = self.tables.read().await;
        Ok(tables.listings.get(&id).cloned())
    }

    async fn update(&self, id: ListingId, patch: ListingPatch) -> Result<Listing> {
        let _row = self.lock_listing(id).await?;
        let mut tables = self.tables.write().await;
        if let Some(title) = &patch.title
            && tables.title_taken(title, Some(id))
        {
            return Err(MarketError::Conflict(format!(
                "A game with the title \"{title}\" already exists."
            )));
        }
        let listing = tables
            .listings
            .get_mut(&id)
            .ok_or_else(|| MarketError::NotFound("Game not found.".to_string()))?;
        listing.apply(patch);
        Ok(listing.clone())
    }

    async fn delete(&self, id: ListingId) -> Result<()> {
        let row = self.lock_listing(id).await?;
        let mut tables = self.tables.write().await;
        if !tables.listings.contains_key(&id) {
            return Err(MarketError::NotFound("Game not found.".to_string()));
        }
        tables.remove_listing(id);
        drop(tables);
        drop(row);
        self.listing_locks.forget(&id);
        Ok(())
    }

    async fn all(&self) -> Result<Vec<Listing>> {
        let tables = self.tables.read().await;
        Ok(tables.listings.values().cloned().collect())
    }

    async fn count(&self) -> Result<usize> {
        let tables = self.tables.read().await;
        Ok(tables.listings.len())
    }
}

#[async_trait]
impl PurchaseStore for InMemoryStore {
    async fn exists_for(&self, buyer: AccountId, listing: ListingId) -> Result<bool> {
        let tables = self.tables.read().await;
        Ok(tables.purchase_pairs.contains_key(&(buyer, listing)))
    }

    async fn for_buyer(&self, buyer: AccountId) -> Result<Vec<PurchaseRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .purchases
            .values()
            .filter(|p| p.buyer == buyer)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CommentStore for InMemoryStore {
    async fn insert(&self, comment: NewComment) -> Result<Comment> {
        let mut tables = self.tables.write().await;
        if !tables.listings.contains_key(&comment.listing) {
            return Err(MarketError::NotFound("Game not found.".to_string()));
        }
        if !tables.accounts.contains_key(&comment.author) {
            return Err(MarketError::NotFound("User not found.".to_string()));
        }
        if tables
            .comments
            .values()
            .any(|c| c.listing == comment.listing && c.author == comment.author)
        {
            return Err(MarketError::Conflict(
                "You have already commented on this game.".to_string(),
            ));
        }
        let id = CommentId(Sequences::next(&mut tables.seq.comment));
        let comment = Comment::new(id, comment);
        tables.comments.insert(id, comment.clone());
        Ok(comment)
    }

    async fn get(&self, id: CommentId) -> Result<Option<Comment>> {
        let tables = self.tables.read().await;
        Ok(tables.comments.get(&id).cloned())
    }

    async fn for_listing(&self, listing: ListingId) -> Result<Vec<Comment>> {
        let tables = self.tables.read().await;
        Ok(tables
            .comments
            .values()
            .filter(|c| c.listing == listing)
            .cloned()
            .collect())
    }

    async fn delete(&self, id: CommentId) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables
            .comments
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| MarketError::NotFound("Comment not found.".to_string()))
    }
}

#[async_trait]
impl Ledger for InMemoryStore {
    async fn begin<'a>(&'a self) -> Result<Box<dyn LedgerTx + 'a>> {
        Ok(Box::new(InMemoryTx {
            store: self,
            guards: Vec::new(),
            locked_listings: HashSet::new(),
            locked_accounts: HashSet::new(),
            deltas: HashMap::new(),
            purchases: Vec::new(),
        }))
    }
}

/// A transaction over [`InMemoryStore`].
///
/// Writes are staged locally and applied in `commit` under the table write
/// lock. Row guards are released when the value is dropped.
pub struct InMemoryTx<'a> {
    store: &'a InMemoryStore,
    guards: Vec<OwnedMutexGuard<()>>,
    locked_listings: HashSet<ListingId>,
    locked_accounts: HashSet<AccountId>,
    deltas: HashMap<AccountId, Balance>,
    purchases: Vec<(AccountId, ListingId)>,
}

impl<'a> InMemoryTx<'a> {
    fn with_staged(&self, account: Option<Account>) -> Result<Option<Account>> {
        account
            .map(|mut account| -> Result<Account> {
                if let Some(delta) = self.deltas.get(&account.id) {
                    account.balance = account.balance.checked_add(*delta)?;
                }
                Ok(account)
            })
            .transpose()
    }
}

#[async_trait]
impl<'a> LedgerTx for InMemoryTx<'a> {
    async fn listing_for_update(&mut self, id: ListingId) -> Result<Option<Listing>> {
        if !self.locked_listings.contains(&id) {
            let guard = self.store.lock_listing(id).await?;
            self.locked_listings.insert(id);
            self.guards.push(guard);
        }
        let tables = self.store.tables.read().await;
        Ok(tables.listings.get(&id).cloned())
    }

    async fn account_for_update(&mut self, id: AccountId) -> Result<Option<Account>> {
        if !self.locked_accounts.contains(&id) {
            let guard = self.store.lock_account(id).await?;
            self.locked_accounts.insert(id);
            self.guards.push(guard);
        }
        self.account(id).await
    }

    async fn account(&mut self, id: AccountId) -> Result<Option<Account>> {
        let account = {
            let tables = self.store.tables.read().await;
            tables.accounts.get(&id).cloned()
        };
        self.with_staged(account)
    }

    async fn purchase_exists(&mut self, buyer: AccountId, listing: ListingId) -> Result<bool> {
        if self.purchases.contains(&(buyer, listing)) {
            return Ok(true);
        }
        let tables = self.store.tables.read().await;
        Ok(tables.purchase_pairs.contains_key(&(buyer, listing)))
    }

    async fn adjust_balance(&mut self, id: AccountId, delta: Balance) -> Result<()> {
        let staged = self.deltas.entry(id).or_default();
        *staged = staged.checked_add(delta)?;
        Ok(())
    }

    async fn insert_purchase(&mut self, buyer: AccountId, listing: ListingId) -> Result<()> {
        if self.purchases.contains(&(buyer, listing)) {
            return Err(MarketError::Conflict("Already purchased.".to_string()));
        }
        self.purchases.push((buyer, listing));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let mut tables = self.store.tables.write().await;

        // Verify every constraint before touching anything.
        let mut balances = Vec::with_capacity(self.deltas.len());
        for (id, delta) in &self.deltas {
            let account = tables
                .accounts
                .get(id)
                .ok_or_else(|| MarketError::NotFound(format!("Account {id} vanished mid-transaction")))?;
            let balance = account.balance.checked_add(*delta)?;
            if balance.is_negative() {
                return Err(MarketError::Conflict(format!(
                    "Balance of account {id} would become negative"
                )));
            }
            balances.push((*id, balance));
        }
        for (buyer, listing) in &self.purchases {
            if tables.purchase_pairs.contains_key(&(*buyer, *listing)) {
                return Err(MarketError::Conflict("Already purchased.".to_string()));
            }
            if !tables.listings.contains_key(listing) || !tables.accounts.contains_key(buyer) {
                return Err(MarketError::NotFound(format!(
                    "Purchase of listing {listing} by {buyer} references a deleted row"
                )));
            }
        }

        for (id, balance) in balances {
            if let Some(account) = tables.accounts.get_mut(&id) {
                account.balance = balance;
            }
        }
        for (buyer, listing) in &self.purchases {
            let id = PurchaseId(Sequences::next(&mut tables.seq.purchase));
            tables
                .purchases
                .insert(id, PurchaseRecord::new(id, *buyer, *listing));
            tables.purchase_pairs.insert((*buyer, *listing), id);
        }
        debug!(
            accounts = self.deltas.len(),
            purchases = self.purchases.len(),
            "in-memory transaction committed"
        );
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        debug!(
            staged = self.deltas.len() + self.purchases.len(),
            "in-memory transaction rolled back"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::listing::{Category, Price};
    use rust_decimal_macros::dec;

    fn listing(title: &str, price: rust_decimal::Decimal) -> NewListing {
        NewListing::new(title, Category::Action, Price::new(price).unwrap())
    }

    #[tokio::test]
    async fn test_in_memory_account_store() {
        let store = InMemoryStore::new();
        let account = AccountStore::insert(&store, NewAccount::new("a@example.com"))
            .await
            .unwrap();

        let retrieved = AccountStore::get(&store, account.id).await.unwrap().unwrap();
        assert_eq!(retrieved, account);
        assert!(AccountStore::get(&store, AccountId(99)).await.unwrap().is_none());

        let duplicate = AccountStore::insert(&store, NewAccount::new("A@example.com")).await;
        assert!(matches!(duplicate, Err(MarketError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_deposit_is_cumulative() {
        let store = InMemoryStore::new();
        let account = AccountStore::insert(&store, NewAccount::new("a@example.com"))
            .await
            .unwrap();
        let amount = Amount::new(dec!(12.50)).unwrap();
        store.deposit(account.id, amount).await.unwrap();
        let account = store.deposit(account.id, amount).await.unwrap();
        assert_eq!(account.balance, Balance::new(dec!(25.00)));
    }

    #[tokio::test]
    async fn test_listing_titles_are_unique() {
        let store = InMemoryStore::new();
        ListingStore::insert(&store, None, listing("Chess", dec!(20)))
            .await
            .unwrap();
        let again = ListingStore::insert(&store, None, listing("Chess", dec!(30))).await;
        assert!(matches!(again, Err(MarketError::Conflict(_))));

        let batch = store
            .insert_many(None, vec![listing("Go", dec!(20)), listing("Go", dec!(20))])
            .await;
        assert!(matches!(batch, Err(MarketError::Conflict(_))));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_listing_delete_cascades() {
        let store = InMemoryStore::new();
        let buyer = AccountStore::insert(&store, NewAccount::new("b@example.com").with_balance(dec!(100)))
            .await
            .unwrap();
        let game = ListingStore::insert(&store, None, listing("Chess", dec!(20)))
            .await
            .unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.insert_purchase(buyer.id, game.id).await.unwrap();
        tx.commit().await.unwrap();
        CommentStore::insert(&store, NewComment::new(game.id, buyer.id, "fun").unwrap())
            .await
            .unwrap();

        ListingStore::delete(&store, game.id).await.unwrap();
        assert!(!store.exists_for(buyer.id, game.id).await.unwrap());
        assert!(store.for_listing(game.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_account_delete_cascades() {
        let store = InMemoryStore::new();
        let seller = AccountStore::insert(&store, NewAccount::new("s@example.com"))
            .await
            .unwrap();
        ListingStore::insert(&store, Some(seller.id), listing("Chess", dec!(20)))
            .await
            .unwrap();

        AccountStore::delete(&store, seller.id).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
        assert!(matches!(
            AccountStore::delete(&store, seller.id).await,
            Err(MarketError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_dropped_transaction_leaves_no_trace() {
        let store = InMemoryStore::new();
        let buyer = AccountStore::insert(&store, NewAccount::new("b@example.com").with_balance(dec!(50)))
            .await
            .unwrap();
        let game = ListingStore::insert(&store, None, listing("Chess", dec!(20)))
            .await
            .unwrap();

        {
            let mut tx = store.begin().await.unwrap();
            tx.listing_for_update(game.id).await.unwrap();
            tx.adjust_balance(buyer.id, Balance::new(dec!(-20))).await.unwrap();
            tx.insert_purchase(buyer.id, game.id).await.unwrap();
            let staged = tx.account(buyer.id).await.unwrap().unwrap();
            assert_eq!(staged.balance, Balance::new(dec!(30)));
        }

        let buyer = AccountStore::get(&store, buyer.id).await.unwrap().unwrap();
        assert_eq!(buyer.balance, Balance::new(dec!(50)));
        assert!(!store.exists_for(buyer.id, game.id).await.unwrap());

        // The row lock was released with the transaction.
        let mut tx = store.begin().await.unwrap();
        assert!(tx.listing_for_update(game.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_lock_wait_timeout_is_busy() {
        let store = InMemoryStore::with_lock_wait(Duration::from_millis(20));
        let game = ListingStore::insert(&store, None, listing("Chess", dec!(20)))
            .await
            .unwrap();

        let mut holder = store.begin().await.unwrap();
        holder.listing_for_update(game.id).await.unwrap();

        let mut waiter = store.begin().await.unwrap();
        let result = waiter.listing_for_update(game.id).await;
        assert!(matches!(result, Err(MarketError::Busy(_))));

        let patch = ListingPatch {
            summary: Some("x".into()),
            ..Default::default()
        };
        let update = ListingStore::update(&store, game.id, patch).await;
        assert!(matches!(update, Err(MarketError::Busy(_))));
    }

    #[tokio::test]
    async fn test_commit_refuses_negative_balance() {
        let store = InMemoryStore::new();
        let buyer = AccountStore::insert(&store, NewAccount::new("b@example.com").with_balance(dec!(10)))
            .await
            .unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.adjust_balance(buyer.id, Balance::new(dec!(-11))).await.unwrap();
        assert!(matches!(tx.commit().await, Err(MarketError::Conflict(_))));

        let buyer = AccountStore::get(&store, buyer.id).await.unwrap().unwrap();
        assert_eq!(buyer.balance, Balance::new(dec!(10)));
    }

    #[tokio::test]
    async fn test_deposit_overflow_is_rejected() {
        let store = InMemoryStore::new();
        let rich = AccountStore::insert(
            &store,
            NewAccount::new("rich@example.com").with_balance(rust_decimal::Decimal::MAX),
        )
        .await
        .unwrap();

        let result = store.deposit(rich.id, Amount::new(Amount::MAX).unwrap()).await;
        assert!(matches!(result, Err(MarketError::ValidationError(_))));
        let rich = AccountStore::get(&store, rich.id).await.unwrap().unwrap();
        assert_eq!(rich.balance, Balance::new(rust_decimal::Decimal::MAX));
    }

    #[tokio::test]
    async fn test_commit_refuses_balance_overflow() {
        let store = InMemoryStore::new();
        let rich = AccountStore::insert(
            &store,
            NewAccount::new("rich@example.com").with_balance(rust_decimal::Decimal::MAX),
        )
        .await
        .unwrap();
        let buyer = AccountStore::insert(&store, NewAccount::new("b@example.com").with_balance(dec!(30)))
            .await
            .unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.adjust_balance(buyer.id, Balance::new(dec!(-30))).await.unwrap();
        tx.adjust_balance(rich.id, Balance::new(dec!(30))).await.unwrap();
        assert!(matches!(
            tx.account(rich.id).await,
            Err(MarketError::ValidationError(_))
        ));
        assert!(matches!(tx.commit().await, Err(MarketError::ValidationError(_))));

        let buyer = AccountStore::get(&store, buyer.id).await.unwrap().unwrap();
        assert_eq!(buyer.balance, Balance::new(dec!(30)));
    }

    #[tokio::test]
    async fn test_comments_one_per_author() {
        let store = InMemoryStore::new();
        let author = AccountStore::insert(&store, NewAccount::new("c@example.com"))
            .await
            .unwrap();
        let game = ListingStore::insert(&store, None, listing("Chess", dec!(20)))
            .await
            .unwrap();

        CommentStore::insert(&store, NewComment::new(game.id, author.id, "first").unwrap())
            .await
            .unwrap();
        let second =
            CommentStore::insert(&store, NewComment::new(game.id, author.id, "second").unwrap()).await;
        assert!(matches!(second, Err(MarketError::Conflict(_))));

        let orphan =
            CommentStore::insert(&store, NewComment::new(ListingId(42), author.id, "hi").unwrap()).await;
        assert!(matches!(orphan, Err(MarketError::NotFound(_))));
    }
}
