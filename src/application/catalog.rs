use super::query::{ListingQuery, Page};
use crate::domain::account::Account;
use crate::domain::ids::{AccountId, ListingId};
use crate::domain::listing::{Category, Listing, ListingPatch, ListingView, NewListing, Price};
use crate::domain::ports::{AccountStoreRef, ListingStoreRef, PurchaseStoreRef};
use crate::error::{MarketError, Result};
use chrono::Utc;
use rand::Rng;
use rand::seq::SliceRandom;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::info;

pub const SEED_COUNT: usize = 20;

/// Result of a fixture import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureOutcome {
    Imported(usize),
    /// The catalog already had listings.
    Skipped,
}

/// Listing CRUD and queries on top of the storage ports.
#[derive(Clone)]
pub struct CatalogService {
    listings: ListingStoreRef,
    accounts: AccountStoreRef,
    purchases: PurchaseStoreRef,
}

impl CatalogService {
    pub fn new(
        listings: ListingStoreRef,
        accounts: AccountStoreRef,
        purchases: PurchaseStoreRef,
    ) -> Self {
        Self {
            listings,
            accounts,
            purchases,
        }
    }

    pub async fn list(&self, query: &ListingQuery) -> Result<Page<ListingView>> {
        let page = query.apply(self.listings.all().await?)?;
        let sellers = self.sellers(&page.results).await?;
        Ok(page.map(|listing| {
            let seller = listing.owner.and_then(|id| sellers.get(&id));
            ListingView::new(listing, seller)
        }))
    }

    pub async fn get(&self, id: ListingId) -> Result<ListingView> {
        let listing = self.find(id).await?;
        self.view(listing).await
    }

    pub async fn create(&self, owner: AccountId, listing: NewListing) -> Result<ListingView> {
        let listing = self
            .listings
            .insert(Some(owner), listing.validated()?)
            .await?;
        info!(listing = %listing.id, owner = %owner, "listing created");
        self.view(listing).await
    }

    pub async fn update(
        &self,
        caller: AccountId,
        id: ListingId,
        patch: ListingPatch,
    ) -> Result<ListingView> {
        self.owned_by(caller, id).await?;
        let listing = self.listings.update(id, patch.validated()?).await?;
        self.view(listing).await
    }

    pub async fn delete(&self, caller: AccountId, id: ListingId) -> Result<()> {
        self.owned_by(caller, id).await?;
        self.listings.delete(id).await?;
        info!(listing = %id, "listing deleted");
        Ok(())
    }

    /// Listings owned by `owner`, newest first.
    pub async fn mine(&self, owner: AccountId) -> Result<Vec<ListingView>> {
        let mut listings: Vec<Listing> = self
            .listings
            .all()
            .await?
            .into_iter()
            .filter(|l| l.is_owned_by(owner))
            .collect();
        listings.sort_by(|a, b| b.id.cmp(&a.id));
        self.views(listings).await
    }

    /// Listings `buyer` has purchased, newest listing first.
    pub async fn bought(&self, buyer: AccountId) -> Result<Vec<ListingView>> {
        let mut listings = Vec::new();
        for record in self.purchases.for_buyer(buyer).await? {
            if let Some(listing) = self.listings.get(record.listing).await? {
                listings.push(listing);
            }
        }
        listings.sort_by(|a, b| b.id.cmp(&a.id));
        self.views(listings).await
    }

    /// Creates a batch of demo listings owned by `owner`.
    pub async fn seed(&self, owner: AccountId) -> Result<usize> {
        let stamp = Utc::now().format("%Y%m%d-%H%M%S").to_string();
        let batch = {
            let mut rng = rand::thread_rng();
            (1..=SEED_COUNT)
                .map(|i| -> Result<NewListing> {
                    let title: String = format!("Game {i} - {stamp}").chars().take(24).collect();
                    let category = *Category::ALL
                        .choose(&mut rng)
                        .unwrap_or(&Category::Other);
                    let price = Price::new(Decimal::from(rng.gen_range(100u32..=279)))?;
                    Ok(NewListing::new(title, category, price).with_summary("Auto-generated"))
                })
                .collect::<Result<Vec<_>>>()?
        };
        let created = self.listings.insert_many(Some(owner), batch).await?;
        info!(owner = %owner, count = created.len(), "seeded demo listings");
        Ok(created.len())
    }

    /// Imports unowned listings, but only into an empty catalog.
    pub async fn load_fixture(&self, listings: Vec<NewListing>) -> Result<FixtureOutcome> {
        if self.listings.count().await? > 0 {
            info!("catalog not empty, skipping fixture import");
            return Ok(FixtureOutcome::Skipped);
        }
        let listings = listings
            .into_iter()
            .map(NewListing::validated)
            .collect::<Result<Vec<_>>>()?;
        let created = self.listings.insert_many(None, listings).await?;
        info!(count = created.len(), "fixture imported");
        Ok(FixtureOutcome::Imported(created.len()))
    }

    async fn find(&self, id: ListingId) -> Result<Listing> {
        self.listings
            .get(id)
            .await?
            .ok_or_else(|| MarketError::NotFound("Game not found.".to_string()))
    }

    async fn owned_by(&self, caller: AccountId, id: ListingId) -> Result<Listing> {
        let listing = self.find(id).await?;
        if !listing.is_owned_by(caller) {
            return Err(MarketError::Forbidden(
                "You can only modify your own listings.".to_string(),
            ));
        }
        Ok(listing)
    }

    async fn sellers(&self, listings: &[Listing]) -> Result<HashMap<AccountId, Account>> {
        let mut sellers = HashMap::new();
        for owner in listings.iter().filter_map(|l| l.owner) {
            if !sellers.contains_key(&owner)
                && let Some(account) = self.accounts.get(owner).await?
            {
                sellers.insert(owner, account);
            }
        }
        Ok(sellers)
    }

    async fn view(&self, listing: Listing) -> Result<ListingView> {
        let seller = match listing.owner {
            Some(owner) => self.accounts.get(owner).await?,
            None => None,
        };
        Ok(ListingView::new(listing, seller.as_ref()))
    }

    async fn views(&self, listings: Vec<Listing>) -> Result<Vec<ListingView>> {
        let sellers = self.sellers(&listings).await?;
        Ok(listings
            .into_iter()
            .map(|listing| {
                let seller = listing.owner.and_then(|id| sellers.get(&id));
                ListingView::new(listing, seller)
            })
            .collect())
    }
}
