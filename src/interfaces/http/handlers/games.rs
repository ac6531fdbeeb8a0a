use crate::application::query::{ListingQuery, Page};
use crate::domain::ids::ListingId;
use crate::domain::listing::{ListingPatch, ListingView, NewListing};
use crate::domain::purchase::PurchaseRequest;
use crate::interfaces::http::auth::Caller;
use crate::interfaces::http::error::{ApiError, AppJson, AppPath, AppQuery};
use crate::interfaces::http::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use serde_json::{Value, json};

pub async fn list_games(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ListingQuery>,
) -> Result<Json<Page<ListingView>>, ApiError> {
    Ok(Json(state.catalog.list(&query).await?))
}

pub async fn create_game(
    State(state): State<AppState>,
    caller: Caller,
    AppJson(listing): AppJson<NewListing>,
) -> Result<(StatusCode, Json<ListingView>), ApiError> {
    let view = state.catalog.create(caller.account_id, listing).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn get_game(
    State(state): State<AppState>,
    AppPath(id): AppPath<u64>,
) -> Result<Json<ListingView>, ApiError> {
    Ok(Json(state.catalog.get(ListingId(id)).await?))
}

pub async fn update_game(
    State(state): State<AppState>,
    caller: Caller,
    AppPath(id): AppPath<u64>,
    AppJson(patch): AppJson<ListingPatch>,
) -> Result<Json<ListingView>, ApiError> {
    let view = state
        .catalog
        .update(caller.account_id, ListingId(id), patch)
        .await?;
    Ok(Json(view))
}

pub async fn delete_game(
    State(state): State<AppState>,
    caller: Caller,
    AppPath(id): AppPath<u64>,
) -> Result<StatusCode, ApiError> {
    state.catalog.delete(caller.account_id, ListingId(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn my_games(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<Vec<ListingView>>, ApiError> {
    Ok(Json(state.catalog.mine(caller.account_id).await?))
}

pub async fn bought_games(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<Vec<ListingView>>, ApiError> {
    Ok(Json(state.catalog.bought(caller.account_id).await?))
}

pub async fn seed_games(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let created = state.catalog.seed(caller.account_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "detail": format!("{created} games created successfully.") })),
    ))
}

/// `POST /api/games/{id}/buy`
pub async fn buy_game(
    State(state): State<AppState>,
    caller: Caller,
    AppPath(id): AppPath<u64>,
) -> Result<(StatusCode, Json<ListingView>), ApiError> {
    let request = PurchaseRequest::new(caller.account_id, ListingId(id));
    let view = state
        .engine
        .purchase_with_retry(request, state.retry)
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}
