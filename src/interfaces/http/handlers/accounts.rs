use crate::application::accounts::{AccountView, UserSummary};
use crate::domain::account::{AccountPatch, Amount, NewAccount};
use crate::domain::ids::AccountId;
use crate::interfaces::http::auth::Caller;
use crate::interfaces::http::error::{ApiError, AppJson, AppPath};
use crate::interfaces::http::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct DepositRequest {
    pub amount: Amount,
}

pub async fn signup(
    State(state): State<AppState>,
    AppJson(account): AppJson<NewAccount>,
) -> Result<(StatusCode, Json<AccountView>), ApiError> {
    let view = state.accounts.register(account).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn me(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<AccountView>, ApiError> {
    Ok(Json(state.accounts.get(caller.account_id).await?))
}

pub async fn update_me(
    State(state): State<AppState>,
    caller: Caller,
    AppJson(patch): AppJson<AccountPatch>,
) -> Result<Json<AccountView>, ApiError> {
    Ok(Json(state.accounts.update(caller.account_id, patch).await?))
}

pub async fn deposit(
    State(state): State<AppState>,
    caller: Caller,
    AppJson(request): AppJson<DepositRequest>,
) -> Result<Json<AccountView>, ApiError> {
    let view = state
        .accounts
        .deposit(caller.account_id, request.amount)
        .await?;
    Ok(Json(view))
}

pub async fn list_users(
    State(state): State<AppState>,
    _caller: Caller,
) -> Result<Json<Vec<UserSummary>>, ApiError> {
    Ok(Json(state.accounts.list().await?))
}

pub async fn delete_account(
    State(state): State<AppState>,
    caller: Caller,
    AppPath(id): AppPath<u64>,
) -> Result<StatusCode, ApiError> {
    state.accounts.delete(caller.account_id, AccountId(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
