//! JSON API over the application services.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod state;

use axum::{
    Router,
    routing::{delete, get, post},
};
use handlers::{accounts, comments, games, health};
use state::AppState;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        // Accounts
        .route("/api/accounts/signup", post(accounts::signup))
        .route("/api/accounts/me", get(accounts::me).patch(accounts::update_me))
        .route("/api/accounts/me/deposit", post(accounts::deposit))
        .route("/api/accounts/users", get(accounts::list_users))
        .route("/api/accounts/delete/{id}", delete(accounts::delete_account))
        // Catalog
        .route("/api/games", get(games::list_games).post(games::create_game))
        .route("/api/games/mine", get(games::my_games))
        .route("/api/games/bought-games", get(games::bought_games))
        .route("/api/games/seed", post(games::seed_games))
        .route(
            "/api/games/{id}",
            get(games::get_game)
                .patch(games::update_game)
                .delete(games::delete_game),
        )
        .route("/api/games/{id}/buy", post(games::buy_game))
        // Comments
        .route(
            "/api/common/comments/{game_id}",
            get(comments::list_comments).post(comments::create_comment),
        )
        .route("/api/common/comments/delete/{id}", delete(comments::delete_comment))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
