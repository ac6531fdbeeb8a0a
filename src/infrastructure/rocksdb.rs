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
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, Transaction, TransactionDB,
    TransactionDBOptions,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Column Family for account rows, keyed by id.
pub const CF_ACCOUNTS: &str = "accounts";
/// Column Family for listing rows, keyed by id.
pub const CF_LISTINGS: &str = "listings";
/// Column Family for purchase records, keyed by `buyer ++ listing`.
pub const CF_PURCHASES: &str = "purchases";
/// Column Family for comments, keyed by id.
pub const CF_COMMENTS: &str = "comments";
/// Unique indexes: `email:<lowercase email>`, `title:<title>`, `comment:<listing ++ author>`.
pub const CF_INDEXES: &str = "indexes";
/// Id sequences.
pub const CF_META: &str = "meta";

const ALL_CFS: [&str; 6] = [
    CF_ACCOUNTS,
    CF_LISTINGS,
    CF_PURCHASES,
    CF_COMMENTS,
    CF_INDEXES,
    CF_META,
];

type Txn<'a> = Transaction<'a, TransactionDB>;

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(bytes)?)
}

fn pair_key(first: u64, second: u64) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&first.to_be_bytes());
    key[8..].copy_from_slice(&second.to_be_bytes());
    key
}

fn email_key(email: &str) -> Vec<u8> {
    format!("email:{}", email.to_lowercase()).into_bytes()
}

fn title_key(title: &str) -> Vec<u8> {
    format!("title:{title}").into_bytes()
}

fn comment_pair_key(listing: ListingId, author: AccountId) -> Vec<u8> {
    let mut key = b"comment:".to_vec();
    key.extend_from_slice(&pair_key(listing.value(), author.value()));
    key
}

/// A persistent store implementation using a pessimistic RocksDB
/// `TransactionDB`.
///
/// Every write runs inside a RocksDB transaction. `get_for_update` takes the
/// row lock, and a lock wait longer than the configured timeout surfaces as
/// `MarketError::Busy`.
///
/// RocksDB calls are synchronous. A contended `get_for_update` parks the
/// calling runtime worker for at most the lock timeout passed to [`open`](Self::open).
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<TransactionDB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<TransactionDB>,
}

impl RocksDBStore {
    /// Opens or creates a database at `path`, creating missing column families.
    pub fn open<P: AsRef<Path>>(path: P, lock_wait: Duration) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let mut txn_opts = TransactionDBOptions::default();
        txn_opts.set_txn_lock_timeout(lock_wait.as_millis() as i64);

        let cfs = ALL_CFS
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));
        let db = TransactionDB::open_cf_descriptors(&opts, &txn_opts, path.as_ref(), cfs)?;
        info!(path = %path.as_ref().display(), "opened RocksDB store");

        Ok(Self { db: Arc::new(db) })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            MarketError::InternalError(format!("{name} column family not found"))
        })
    }

    fn next_id(&self, txn: &Txn<'_>, sequence: &str) -> Result<u64> {
        let meta = self.cf(CF_META)?;
        let current = match txn.get_for_update_cf(meta, sequence, true)? {
            Some(bytes) => decode::<u64>(&bytes)?,
            None => 0,
        };
        let next = current + 1;
        txn.put_cf(meta, sequence, encode(&next)?)?;
        Ok(next)
    }

    fn get_row<T: DeserializeOwned>(&self, cf: &str, key: &[u8]) -> Result<Option<T>> {
        self.db
            .get_cf(self.cf(cf)?, key)?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    fn scan<T: DeserializeOwned>(&self, cf: &str) -> Result<Vec<T>> {
        let mut rows = Vec::new();
        for item in self.db.iterator_cf(self.cf(cf)?, IteratorMode::Start) {
            let (_key, value) = item?;
            rows.push(decode(&value)?);
        }
        Ok(rows)
    }

    fn lock_row<T: DeserializeOwned>(&self, txn: &Txn<'_>, cf: &str, key: &[u8]) -> Result<Option<T>> {
        txn.get_for_update_cf(self.cf(cf)?, key, true)?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    /// Locks every listing owned by `owner` that is not in `locked` yet and
    /// appends the locked rows.
    fn lock_owned_listings(
        &self,
        txn: &Txn<'_>,
        owner: AccountId,
        locked: &mut Vec<Listing>,
    ) -> Result<()> {
        for listing in self.scan::<Listing>(CF_LISTINGS)? {
            if !listing.is_owned_by(owner) || locked.iter().any(|l| l.id == listing.id) {
                continue;
            }
            if let Some(row) = self.lock_row::<Listing>(txn, CF_LISTINGS, &listing.id.to_key())? {
                locked.push(row);
            }
        }
        Ok(())
    }

    /// Deletes a listing and everything hanging off it inside `txn`.
    fn cascade_listing(&self, txn: &Txn<'_>, listing: &Listing) -> Result<()> {
        let purchases = self.cf(CF_PURCHASES)?;
        for record in self.scan::<PurchaseRecord>(CF_PURCHASES)? {
            if record.listing == listing.id {
                txn.delete_cf(purchases, pair_key(record.buyer.value(), record.listing.value()))?;
            }
        }
        let comments = self.cf(CF_COMMENTS)?;
        let indexes = self.cf(CF_INDEXES)?;
        for comment in self.scan::<Comment>(CF_COMMENTS)? {
            if comment.listing == listing.id {
                txn.delete_cf(comments, comment.id.to_key())?;
                txn.delete_cf(indexes, comment_pair_key(comment.listing, comment.author))?;
            }
        }
        txn.delete_cf(indexes, title_key(&listing.title))?;
        txn.delete_cf(self.cf(CF_LISTINGS)?, listing.id.to_key())?;
        Ok(())
    }
}

#[async_trait]
impl AccountStore for RocksDBStore {
    async fn insert(&self, account: NewAccount) -> Result<Account> {
        let txn = self.db.transaction();
        let indexes = self.cf(CF_INDEXES)?;
        if txn.get_for_update_cf(indexes, email_key(&account.email), true)?.is_some() {
            return Err(MarketError::Conflict(
                "A user with that email already exists.".to_string(),
            ));
        }
        let id = AccountId(self.next_id(&txn, "seq:account")?);
        let account = Account::new(id, account);
        txn.put_cf(indexes, email_key(&account.email), encode(&id)?)?;
        txn.put_cf(self.cf(CF_ACCOUNTS)?, id.to_key(), encode(&account)?)?;
        txn.commit()?;
        Ok(account)
    }

    async fn get(&self, id: AccountId) -> Result<Option<Account>> {
        self.get_row(CF_ACCOUNTS, &id.to_key())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        match self.get_row::<AccountId>(CF_INDEXES, &email_key(email))? {
            Some(id) => self.get_row(CF_ACCOUNTS, &id.to_key()),
            None => Ok(None),
        }
    }

    async fn update(&self, id: AccountId, patch: AccountPatch) -> Result<Account> {
        let txn = self.db.transaction();
        let mut account: Account = self
            .lock_row(&txn, CF_ACCOUNTS, &id.to_key())?
            .ok_or_else(|| MarketError::NotFound("User not found.".to_string()))?;
        let indexes = self.cf(CF_INDEXES)?;
        if let Some(email) = &patch.email
            && !email.eq_ignore_ascii_case(&account.email)
        {
            if txn.get_for_update_cf(indexes, email_key(email), true)?.is_some() {
                return Err(MarketError::Conflict(
                    "A user with that email already exists.".to_string(),
                ));
            }
            txn.delete_cf(indexes, email_key(&account.email))?;
            txn.put_cf(indexes, email_key(email), encode(&id)?)?;
        }
        account.apply(patch);
        txn.put_cf(self.cf(CF_ACCOUNTS)?, id.to_key(), encode(&account)?)?;
        txn.commit()?;
        Ok(account)
    }

    async fn deposit(&self, id: AccountId, amount: Amount) -> Result<Account> {
        let txn = self.db.transaction();
        let mut account: Account = self
            .lock_row(&txn, CF_ACCOUNTS, &id.to_key())?
            .ok_or_else(|| MarketError::NotFound("User not found.".to_string()))?;
        account.deposit(amount)?;
        txn.put_cf(self.cf(CF_ACCOUNTS)?, id.to_key(), encode(&account)?)?;
        txn.commit()?;
        Ok(account)
    }

    async fn delete(&self, id: AccountId) -> Result<()> {
        let txn = self.db.transaction();
        // Same order as a purchase: listings first, then the account.
        let mut owned = Vec::new();
        self.lock_owned_listings(&txn, id, &mut owned)?;
        let account: Account = self
            .lock_row(&txn, CF_ACCOUNTS, &id.to_key())?
            .ok_or_else(|| MarketError::NotFound("User not found.".to_string()))?;
        // `insert_many` locks the owner row, so nothing new can appear now.
        self.lock_owned_listings(&txn, id, &mut owned)?;

        for listing in &owned {
            self.cascade_listing(&txn, listing)?;
        }
        let purchases = self.cf(CF_PURCHASES)?;
        for record in self.scan::<PurchaseRecord>(CF_PURCHASES)? {
            if record.buyer == id {
                txn.delete_cf(purchases, pair_key(record.buyer.value(), record.listing.value()))?;
            }
        }
        let comments = self.cf(CF_COMMENTS)?;
        let indexes = self.cf(CF_INDEXES)?;
        for comment in self.scan::<Comment>(CF_COMMENTS)? {
            if comment.author == id {
                txn.delete_cf(comments, comment.id.to_key())?;
                txn.delete_cf(indexes, comment_pair_key(comment.listing, comment.author))?;
            }
        }
        txn.delete_cf(indexes, email_key(&account.email))?;
        txn.delete_cf(self.cf(CF_ACCOUNTS)?, id.to_key())?;
        txn.commit()?;
        Ok(())
    }

    async fn all(&self) -> Result<Vec<Account>> {
        self.scan(CF_ACCOUNTS)
    }
}

#[async_trait]
impl ListingStore for RocksDBStore {
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
        let txn = self.db.transaction();
        if let Some(owner) = owner
            && self.lock_row::<Account>(&txn, CF_ACCOUNTS, &owner.to_key())?.is_none()
        {
            return Err(MarketError::NotFound("User not found.".to_string()));
        }
        let indexes = self.cf(CF_INDEXES)?;
        let rows = self.cf(CF_LISTINGS)?;
        let mut titles = HashSet::new();
        let mut created = Vec::with_capacity(listings.len());
        for listing in listings {
            if !titles.insert(listing.title.clone())
                || txn.get_for_update_cf(indexes, title_key(&listing.title), true)?.is_some()
            {
                return Err(MarketError::Conflict(format!(
                    "A game with the title \"{}\" already exists.",
                    listing.title
                )));
            }
            let id = ListingId(self.next_id(&txn, "seq:listing")?);
            let listing = Listing::new(id, owner, listing);
            txn.put_cf(indexes, title_key(&listing.title), encode(&id)?)?;
            txn.put_cf(rows, id.to_key(), encode(&listing)?)?;
            created.push(listing);
        }
        txn.commit()?;
        Ok(created)
    }

    async fn get(&self, id: ListingId) -> Result<Option<Listing>> {
        self.get_row(CF_LISTINGS, &id.to_key())
    }

    async fn update(&self, id: ListingId, patch: ListingPatch) -> Result<Listing> {
        let txn = self.db.transaction();
        let mut listing: Listing = self
            .lock_row(&txn, CF_LISTINGS, &id.to_key())?
            .ok_or_else(|| MarketError::NotFound("Game not found.".to_string()))?;
        let indexes = self.cf(CF_INDEXES)?;
        if let Some(title) = &patch.title
            && *title != listing.title
        {
            if txn.get_for_update_cf(indexes, title_key(title), true)?.is_some() {
                return Err(MarketError::Conflict(format!(
                    "A game with the title \"{title}\" already exists."
                )));
            }
            txn.delete_cf(indexes, title_key(&listing.title))?;
            txn.put_cf(indexes, title_key(title), encode(&id)?)?;
        }
        listing.apply(patch);
        txn.put_cf(self.cf(CF_LISTINGS)?, id.to_key(), encode(&listing)?)?;
        txn.commit()?;
        Ok(listing)
    }

    async fn delete(&self, id: ListingId) -> Result<()> {
        let txn = self.db.transaction();
        let listing: Listing = self
            .lock_row(&txn, CF_LISTINGS, &id.to_key())?
            .ok_or_else(|| MarketError::NotFound("Game not found.".to_string()))?;
        self.cascade_listing(&txn, &listing)?;
        txn.commit()?;
        Ok(())
    }

    async fn all(&self) -> Result<Vec<Listing>> {
        self.scan(CF_LISTINGS)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self
            .db
            .iterator_cf(self.cf(CF_LISTINGS)?, IteratorMode::Start)
            .count())
    }
}

#[async_trait]
impl PurchaseStore for RocksDBStore {
    async fn exists_for(&self, buyer: AccountId, listing: ListingId) -> Result<bool> {
        let key = pair_key(buyer.value(), listing.value());
        Ok(self.db.get_cf(self.cf(CF_PURCHASES)?, key)?.is_some())
    }

    async fn for_buyer(&self, buyer: AccountId) -> Result<Vec<PurchaseRecord>> {
        let prefix = buyer.to_key();
        let mut records = Vec::new();
        for item in self.db.prefix_iterator_cf(self.cf(CF_PURCHASES)?, prefix) {
            let (key, value) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            records.push(decode(&value)?);
        }
        Ok(records)
    }
}

#[async_trait]
impl CommentStore for RocksDBStore {
    async fn insert(&self, comment: NewComment) -> Result<Comment> {
        let txn = self.db.transaction();
        if self
            .lock_row::<Listing>(&txn, CF_LISTINGS, &comment.listing.to_key())?
            .is_none()
        {
            return Err(MarketError::NotFound("Game not found.".to_string()));
        }
        if self
            .lock_row::<Account>(&txn, CF_ACCOUNTS, &comment.author.to_key())?
            .is_none()
        {
            return Err(MarketError::NotFound("User not found.".to_string()));
        }
        let indexes = self.cf(CF_INDEXES)?;
        let pair = comment_pair_key(comment.listing, comment.author);
        if txn.get_for_update_cf(indexes, &pair, true)?.is_some() {
            return Err(MarketError::Conflict(
                "You have already commented on this game.".to_string(),
            ));
        }
        let id = CommentId(self.next_id(&txn, "seq:comment")?);
        let comment = Comment::new(id, comment);
        txn.put_cf(indexes, &pair, encode(&id)?)?;
        txn.put_cf(self.cf(CF_COMMENTS)?, id.to_key(), encode(&comment)?)?;
        txn.commit()?;
        Ok(comment)
    }

    async fn get(&self, id: CommentId) -> Result<Option<Comment>> {
        self.get_row(CF_COMMENTS, &id.to_key())
    }

    async fn for_listing(&self, listing: ListingId) -> Result<Vec<Comment>> {
        Ok(self
            .scan::<Comment>(CF_COMMENTS)?
            .into_iter()
            .filter(|c| c.listing == listing)
            .collect())
    }

    async fn delete(&self, id: CommentId) -> Result<()> {
        let txn = self.db.transaction();
        let comment: Comment = self
            .lock_row(&txn, CF_COMMENTS, &id.to_key())?
            .ok_or_else(|| MarketError::NotFound("Comment not found.".to_string()))?;
        txn.delete_cf(self.cf(CF_INDEXES)?, comment_pair_key(comment.listing, comment.author))?;
        txn.delete_cf(self.cf(CF_COMMENTS)?, id.to_key())?;
        txn.commit()?;
        Ok(())
    }
}

#[async_trait]
impl Ledger for RocksDBStore {
    async fn begin<'a>(&'a self) -> Result<Box<dyn LedgerTx + 'a>> {
        Ok(Box::new(RocksDBTx {
            store: self,
            txn: self.db.transaction(),
        }))
    }
}

/// A pessimistic RocksDB transaction. Dropping it without `commit` discards
/// every write and releases its locks.
pub struct RocksDBTx<'a> {
    store: &'a RocksDBStore,
    txn: Txn<'a>,
}

#[async_trait]
impl<'a> LedgerTx for RocksDBTx<'a> {
    async fn listing_for_update(&mut self, id: ListingId) -> Result<Option<Listing>> {
        self.store.lock_row(&self.txn, CF_LISTINGS, &id.to_key())
    }

    async fn account_for_update(&mut self, id: AccountId) -> Result<Option<Account>> {
        self.store.lock_row(&self.txn, CF_ACCOUNTS, &id.to_key())
    }

    async fn account(&mut self, id: AccountId) -> Result<Option<Account>> {
        self.txn
            .get_cf(self.store.cf(CF_ACCOUNTS)?, id.to_key())?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    async fn purchase_exists(&mut self, buyer: AccountId, listing: ListingId) -> Result<bool> {
        let key = pair_key(buyer.value(), listing.value());
        Ok(self
            .txn
            .get_for_update_cf(self.store.cf(CF_PURCHASES)?, key, true)?
            .is_some())
    }

    async fn adjust_balance(&mut self, id: AccountId, delta: Balance) -> Result<()> {
        let mut account: Account = self
            .store
            .lock_row(&self.txn, CF_ACCOUNTS, &id.to_key())?
            .ok_or_else(|| MarketError::NotFound(format!("Account {id} not found")))?;
        account.balance = account.balance.checked_add(delta)?;
        if account.balance.is_negative() {
            return Err(MarketError::Conflict(format!(
                "Balance of account {id} would become negative"
            )));
        }
        self.txn
            .put_cf(self.store.cf(CF_ACCOUNTS)?, id.to_key(), encode(&account)?)?;
        Ok(())
    }

    async fn insert_purchase(&mut self, buyer: AccountId, listing: ListingId) -> Result<()> {
        let purchases = self.store.cf(CF_PURCHASES)?;
        let key = pair_key(buyer.value(), listing.value());
        if self.txn.get_for_update_cf(purchases, key, true)?.is_some() {
            return Err(MarketError::Conflict("Already purchased.".to_string()));
        }
        let id = PurchaseId(self.store.next_id(&self.txn, "seq:purchase")?);
        let record = PurchaseRecord::new(id, buyer, listing);
        self.txn.put_cf(purchases, key, encode(&record)?)?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.txn.commit()?;
        debug!("RocksDB transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.txn.rollback()?;
        debug!("RocksDB transaction rolled back");
        Ok(())
    }
}
