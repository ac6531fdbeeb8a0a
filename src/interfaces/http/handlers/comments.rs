use crate::domain::comment::CommentView;
use crate::domain::ids::{CommentId, ListingId};
use crate::interfaces::http::auth::Caller;
use crate::interfaces::http::error::{ApiError, AppJson, AppPath};
use crate::interfaces::http::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub text: String,
}

pub async fn list_comments(
    State(state): State<AppState>,
    _caller: Caller,
    AppPath(game_id): AppPath<u64>,
) -> Result<Json<Vec<CommentView>>, ApiError> {
    Ok(Json(state.comments.list(ListingId(game_id)).await?))
}

pub async fn create_comment(
    State(state): State<AppState>,
    caller: Caller,
    AppPath(game_id): AppPath<u64>,
    AppJson(request): AppJson<CommentRequest>,
) -> Result<(StatusCode, Json<CommentView>), ApiError> {
    let view = state
        .comments
        .create(caller.account_id, ListingId(game_id), &request.text)
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    caller: Caller,
    AppPath(id): AppPath<u64>,
) -> Result<StatusCode, ApiError> {
    state.comments.delete(caller.account_id, CommentId(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
