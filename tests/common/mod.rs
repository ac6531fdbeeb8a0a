#![allow(dead_code)]

use gamemarket::application::purchase::{RetryPolicy, SelfPurchasePolicy};
use gamemarket::domain::account::{Account, NewAccount};
use gamemarket::domain::ids::AccountId;
use gamemarket::domain::listing::{Category, Listing, NewListing, Price};
use gamemarket::domain::ports::{AccountStore, ListingStore};
use gamemarket::infrastructure::in_memory::InMemoryStore;
use gamemarket::interfaces::http::auth::{Claims, UserIdClaim};
use gamemarket::interfaces::http::state::{AppState, HttpSettings};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use rust_decimal::Decimal;
use std::fs::File;
use std::io::Error;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub const SECRET: &str = "test-secret";

pub fn settings(policy: SelfPurchasePolicy) -> HttpSettings {
    HttpSettings {
        jwt_secret: SECRET.to_string(),
        self_purchase: policy,
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        },
    }
}

pub fn app_state(store: &InMemoryStore) -> AppState {
    AppState::new(Arc::new(store.clone()), settings(SelfPurchasePolicy::Allow))
}

pub fn token_for(id: AccountId) -> String {
    let exp = (chrono::Utc::now().timestamp() + 3600) as usize;
    encode(
        &Header::new(Algorithm::HS256),
        &Claims {
            user_id: UserIdClaim::Number(id.value()),
            exp,
        },
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

pub async fn account(store: &InMemoryStore, email: &str, balance: Decimal) -> Account {
    AccountStore::insert(store, NewAccount::new(email).with_balance(balance))
        .await
        .unwrap()
}

pub async fn listing(
    store: &InMemoryStore,
    owner: Option<AccountId>,
    title: &str,
    price: Decimal,
) -> Listing {
    ListingStore::insert(
        store,
        owner,
        NewListing::new(title, Category::Action, Price::new(price).unwrap()),
    )
    .await
    .unwrap()
}

pub fn generate_fixture(path: &Path, rows: usize) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);

    wtr.write_record(["title", "category", "price", "summary"])?;

    for i in 1..=rows {
        wtr.write_record([format!("Fixture {i}").as_str(), "Other", "15.00", "generated"])?;
    }

    wtr.flush()?;
    Ok(())
}
