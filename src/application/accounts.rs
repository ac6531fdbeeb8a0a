use crate::domain::account::{Account, AccountPatch, Amount, Balance, NewAccount};
use crate::domain::ids::AccountId;
use crate::domain::listing::Listing;
use crate::domain::ports::{AccountStoreRef, ListingStoreRef};
use crate::error::{MarketError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Account projection returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccountView {
    pub id: AccountId,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: String,
    pub display_name: String,
    pub balance: Balance,
    pub joined_at: DateTime<Utc>,
    pub games_count: usize,
}

impl AccountView {
    pub fn new(account: Account, games_count: usize) -> Self {
        Self {
            full_name: account.full_name(),
            display_name: account.display_name(),
            id: account.id,
            email: account.email,
            first_name: account.first_name,
            last_name: account.last_name,
            balance: account.balance,
            joined_at: account.joined_at,
            games_count,
        }
    }
}

/// Public profile returned by the user directory. Email and balance stay
/// private to their owner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserSummary {
    pub id: AccountId,
    pub display_name: String,
    pub joined_at: DateTime<Utc>,
    pub games_count: usize,
}

impl UserSummary {
    pub fn new(account: &Account, games_count: usize) -> Self {
        Self {
            id: account.id,
            display_name: account.display_name(),
            joined_at: account.joined_at,
            games_count,
        }
    }
}

#[derive(Clone)]
pub struct AccountService {
    accounts: AccountStoreRef,
    listings: ListingStoreRef,
}

impl AccountService {
    pub fn new(accounts: AccountStoreRef, listings: ListingStoreRef) -> Self {
        Self { accounts, listings }
    }

    pub async fn register(&self, account: NewAccount) -> Result<AccountView> {
        let account = self.accounts.insert(account.validated()?).await?;
        info!(account = %account.id, "account registered");
        Ok(AccountView::new(account, 0))
    }

    pub async fn get(&self, id: AccountId) -> Result<AccountView> {
        let account = self.find(id).await?;
        let games_count = self.games_count(id).await?;
        Ok(AccountView::new(account, games_count))
    }

    pub async fn update(&self, id: AccountId, patch: AccountPatch) -> Result<AccountView> {
        let account = self.accounts.update(id, patch.validated()?).await?;
        let games_count = self.games_count(id).await?;
        Ok(AccountView::new(account, games_count))
    }

    pub async fn deposit(&self, id: AccountId, amount: Amount) -> Result<AccountView> {
        let account = self.accounts.deposit(id, amount).await?;
        info!(account = %id, amount = %amount.value(), "balance topped up");
        let games_count = self.games_count(id).await?;
        Ok(AccountView::new(account, games_count))
    }

    /// Accounts may only delete themselves.
    pub async fn delete(&self, caller: AccountId, id: AccountId) -> Result<()> {
        self.find(id).await?;
        if caller != id {
            return Err(MarketError::Forbidden("Not allowed.".to_string()));
        }
        self.accounts.delete(id).await?;
        info!(account = %id, "account deleted");
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<UserSummary>> {
        let listings = self.listings.all().await?;
        Ok(self
            .accounts
            .all()
            .await?
            .iter()
            .map(|account| UserSummary::new(account, owned_count(&listings, account.id)))
            .collect())
    }

    async fn find(&self, id: AccountId) -> Result<Account> {
        self.accounts
            .get(id)
            .await?
            .ok_or_else(|| MarketError::NotFound("User not found.".to_string()))
    }

    async fn games_count(&self, id: AccountId) -> Result<usize> {
        Ok(owned_count(&self.listings.all().await?, id))
    }
}

fn owned_count(listings: &[Listing], owner: AccountId) -> usize {
    listings.iter().filter(|l| l.is_owned_by(owner)).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::listing::{Category, NewListing, Price};
    use crate::domain::ports::ListingStore;
    use crate::infrastructure::in_memory::InMemoryStore;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn service(store: &InMemoryStore) -> AccountService {
        let store = Arc::new(store.clone());
        AccountService::new(store.clone(), store)
    }

    #[tokio::test]
    async fn test_register_rejects_duplicate_email() {
        let store = InMemoryStore::new();
        let accounts = service(&store);

        let view = accounts
            .register(NewAccount::new("Ada@Example.com").with_name("Ada", "Lovelace"))
            .await
            .unwrap();
        assert_eq!(view.email, "Ada@example.com");
        assert_eq!(view.full_name, "Ada Lovelace");
        assert_eq!(view.balance, Balance::ZERO);

        let duplicate = accounts.register(NewAccount::new("Ada@example.COM")).await;
        assert!(matches!(
            duplicate,
            Err(MarketError::Conflict(msg)) if msg == "A user with that email already exists."
        ));
    }

    #[tokio::test]
    async fn test_deposit_and_games_count() {
        let store = InMemoryStore::new();
        let accounts = service(&store);
        let me = accounts.register(NewAccount::new("me@example.com")).await.unwrap();
        ListingStore::insert(
            &store,
            Some(me.id),
            NewListing::new("Chess", Category::Board, Price::new(dec!(20)).unwrap()),
        )
        .await
        .unwrap();

        let view = accounts
            .deposit(me.id, Amount::new(dec!(25.50)).unwrap())
            .await
            .unwrap();
        assert_eq!(view.balance, Balance::new(dec!(25.50)));
        assert_eq!(view.games_count, 1);
        let directory = accounts.list().await.unwrap();
        assert_eq!(directory[0].games_count, 1);
        assert_eq!(directory[0].display_name, "me@example.com");
    }

    #[tokio::test]
    async fn test_delete_self_only() {
        let store = InMemoryStore::new();
        let accounts = service(&store);
        let me = accounts.register(NewAccount::new("me@example.com")).await.unwrap();
        let other = accounts.register(NewAccount::new("you@example.com")).await.unwrap();

        let denied = accounts.delete(me.id, other.id).await;
        assert!(matches!(denied, Err(MarketError::Forbidden(_))));
        let missing = accounts.delete(me.id, AccountId(99)).await;
        assert!(matches!(
            missing,
            Err(MarketError::NotFound(msg)) if msg == "User not found."
        ));

        accounts.delete(me.id, me.id).await.unwrap();
        assert!(matches!(accounts.get(me.id).await, Err(MarketError::NotFound(_))));
        assert!(accounts.get(other.id).await.is_ok());
    }
}
