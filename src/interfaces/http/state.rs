use super::auth::TokenVerifier;
use crate::application::accounts::AccountService;
use crate::application::catalog::CatalogService;
use crate::application::comments::CommentService;
use crate::application::purchase::{PurchaseEngine, RetryPolicy, SelfPurchasePolicy};
use crate::domain::ports::MarketStore;
use std::sync::Arc;

/// Knobs the HTTP layer needs beyond the store itself.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub jwt_secret: String,
    pub self_purchase: SelfPurchasePolicy,
    pub retry: RetryPolicy,
}

/// Shared state injected into every handler.
#[derive(Clone)]
pub struct AppState {
    pub accounts: AccountService,
    pub catalog: CatalogService,
    pub comments: CommentService,
    pub engine: PurchaseEngine,
    pub retry: RetryPolicy,
    pub tokens: Arc<TokenVerifier>,
}

impl AppState {
    pub fn new<S: MarketStore + 'static>(store: Arc<S>, settings: HttpSettings) -> Self {
        Self {
            accounts: AccountService::new(store.clone(), store.clone()),
            catalog: CatalogService::new(store.clone(), store.clone(), store.clone()),
            comments: CommentService::new(store.clone(), store.clone(), store.clone()),
            engine: PurchaseEngine::new(store).with_policy(settings.self_purchase),
            retry: settings.retry,
            tokens: Arc::new(TokenVerifier::new(settings.jwt_secret.as_bytes())),
        }
    }
}
