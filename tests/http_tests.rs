use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use gamemarket::application::purchase::SelfPurchasePolicy;
use gamemarket::domain::account::Balance;
use gamemarket::domain::ids::AccountId;
use gamemarket::domain::ports::{AccountStore, PurchaseStore};
use gamemarket::infrastructure::in_memory::InMemoryStore;
use gamemarket::interfaces::http::router;
use gamemarket::interfaces::http::state::AppState;
use rust_decimal_macros::dec;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

mod common;

async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    caller: Option<AccountId>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(id) = caller {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", common::token_for(id)));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_buy_scenarios() {
    let store = InMemoryStore::new();
    let seller = common::account(&store, "seller@example.com", dec!(0)).await;
    let rich = common::account(&store, "rich@example.com", dec!(100)).await;
    let poor = common::account(&store, "poor@example.com", dec!(5)).await;
    let chess = common::listing(&store, Some(seller.id), "Chess", dec!(30)).await;
    let pricey = common::listing(&store, Some(seller.id), "Pricey", dec!(50)).await;
    let app = router(common::app_state(&store));

    let uri = format!("/api/games/{}/buy", chess.id);
    let (status, body) = call(&app, Method::POST, &uri, Some(rich.id), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["title"], "Chess");
    assert_eq!(body["price"], "30.00");
    assert_eq!(body["seller_display"], "seller@example.com");

    let (status, body) = call(&app, Method::POST, &uri, Some(rich.id), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "detail": "Already purchased." }));

    let uri = format!("/api/games/{}/buy", pricey.id);
    let (status, body) = call(&app, Method::POST, &uri, Some(poor.id), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "detail": "Insufficient funds." }));

    let (status, body) = call(&app, Method::POST, "/api/games/999/buy", Some(rich.id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "detail": "Game not found." }));

    let seller = AccountStore::get(&store, seller.id).await.unwrap().unwrap();
    let rich = AccountStore::get(&store, rich.id).await.unwrap().unwrap();
    assert_eq!(seller.balance, Balance::new(dec!(30)));
    assert_eq!(rich.balance, Balance::new(dec!(70)));
}

#[tokio::test]
async fn test_buy_with_deleted_account_and_own_listing() {
    let store = InMemoryStore::new();
    let owner = common::account(&store, "owner@example.com", dec!(100)).await;
    let game = common::listing(&store, Some(owner.id), "Mine", dec!(20)).await;
    let state = AppState::new(
        Arc::new(store.clone()),
        common::settings(SelfPurchasePolicy::Reject),
    );
    let app = router(state);

    let uri = format!("/api/games/{}/buy", game.id);
    let (status, body) = call(&app, Method::POST, &uri, Some(owner.id), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "detail": "You cannot buy your own game." }));

    let (status, body) = call(&app, Method::POST, &uri, Some(AccountId(404)), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "detail": "Account not found." }));
}

#[tokio::test]
async fn test_authentication_is_required() {
    let store = InMemoryStore::new();
    let app = router(common::app_state(&store));

    let (status, body) = call(&app, Method::POST, "/api/games/1/buy", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        body,
        json!({ "detail": "Authentication credentials were not provided." })
    );

    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/accounts/me")
        .header(header::AUTHORIZATION, "Bearer not-a-jwt")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["detail"], "Given token not valid for any token type");

    let (status, _) = call(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_account_flow() {
    let store = InMemoryStore::new();
    let app = router(common::app_state(&store));

    let signup = json!({ "email": "ada@Example.com", "first_name": "Ada", "last_name": "Lovelace" });
    let (status, body) = call(&app, Method::POST, "/api/accounts/signup", None, Some(signup.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["email"], "ada@example.com");
    assert_eq!(body["balance"], "0");
    let id = AccountId(body["id"].as_u64().unwrap());

    let (status, body) = call(&app, Method::POST, "/api/accounts/signup", None, Some(signup)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "A user with that email already exists.");

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/accounts/me/deposit",
        Some(id),
        Some(json!({ "amount": "25.50" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balance"], "25.50");

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/accounts/me/deposit",
        Some(id),
        Some(json!({ "amount": "-5" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(
        &app,
        Method::PATCH,
        "/api/accounts/me",
        Some(id),
        Some(json!({ "first_name": "Augusta" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["display_name"], "Augusta Lovelace");

    let other = common::account(&store, "other@example.com", dec!(70)).await;
    let (status, body) = call(&app, Method::GET, "/api/accounts/users", Some(id), None).await;
    assert_eq!(status, StatusCode::OK);
    let users = body.as_array().unwrap();
    assert_eq!(users.len(), 2);
    for user in users {
        assert!(user.get("email").is_none());
        assert!(user.get("balance").is_none());
    }
    assert_eq!(users[0]["display_name"], "Augusta Lovelace");

    let (status, body) = call(&app, Method::DELETE, "/api/accounts/delete/99", Some(id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "User not found.");

    let uri = format!("/api/accounts/delete/{}", other.id);
    let (status, body) = call(&app, Method::DELETE, &uri, Some(id), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["detail"], "Not allowed.");

    let uri = format!("/api/accounts/delete/{id}");
    let (status, _) = call(&app, Method::DELETE, &uri, Some(id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(AccountStore::get(&store, id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_malformed_path_and_query_get_detail_bodies() {
    let store = InMemoryStore::new();
    let buyer = common::account(&store, "buyer@example.com", dec!(100)).await;
    let app = router(common::app_state(&store));

    let (status, body) = call(&app, Method::POST, "/api/games/abc/buy", Some(buyer.id), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].is_string());

    let (status, body) = call(&app, Method::GET, "/api/games?page=x", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].is_string());

    let (status, body) = call(&app, Method::DELETE, "/api/common/comments/delete/-1", Some(buyer.id), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn test_catalog_flow() {
    let store = InMemoryStore::new();
    let owner = common::account(&store, "owner@example.com", dec!(0)).await;
    let other = common::account(&store, "other@example.com", dec!(500)).await;
    let app = router(common::app_state(&store));

    let new_game = json!({ "title": "Doom", "category": "ACTION", "price": "39.99" });
    let (status, body) = call(&app, Method::POST, "/api/games", Some(owner.id), Some(new_game)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["owner_id"], owner.id.value());
    let uri = format!("/api/games/{}", body["id"]);

    let bad_price = json!({ "title": "Cheap", "category": "OTHER", "price": "1.00" });
    let (status, _) = call(&app, Method::POST, "/api/games", Some(owner.id), Some(bad_price)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(
        &app,
        Method::PATCH,
        &uri,
        Some(other.id),
        Some(json!({ "price": "10.00" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["detail"], "You can only modify your own listings.");

    let (status, body) = call(&app, Method::POST, "/api/games/seed", Some(owner.id), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["detail"], "20 games created successfully.");

    let (status, body) = call(&app, Method::GET, "/api/games?per_page=8&page=2", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 21);
    assert_eq!(body["results"].as_array().unwrap().len(), 8);
    assert_eq!(body["next"], 3);

    let (status, body) = call(&app, Method::GET, "/api/games?page=9", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Invalid page.");

    let (status, body) = call(&app, Method::GET, "/api/games?search=doom", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);

    let (status, body) = call(&app, Method::GET, "/api/games/mine", Some(owner.id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 21);

    let buy = format!("{uri}/buy");
    let (status, _) = call(&app, Method::POST, &buy, Some(other.id), None).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = call(&app, Method::GET, "/api/games/bought-games", Some(other.id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["title"], "Doom");

    let (status, _) = call(&app, Method::DELETE, &uri, Some(owner.id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(store.for_buyer(other.id).await.unwrap().is_empty());
    let (status, _) = call(&app, Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_comment_flow() {
    let store = InMemoryStore::new();
    let alice = common::account(&store, "alice@example.com", dec!(0)).await;
    let bob = common::account(&store, "bob@example.com", dec!(0)).await;
    let game = common::listing(&store, None, "Chess", dec!(20)).await;
    let app = router(common::app_state(&store));

    let uri = format!("/api/common/comments/{}", game.id);
    let (status, body) = call(&app, Method::POST, &uri, Some(alice.id), Some(json!({ "text": "Nice" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user_email"], "alice@example.com");
    let comment_id = body["id"].as_u64().unwrap();

    let (status, _) = call(&app, Method::POST, &uri, Some(alice.id), Some(json!({ "text": "Again" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(&app, Method::GET, &uri, Some(bob.id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let delete = format!("/api/common/comments/delete/{comment_id}");
    let (status, _) = call(&app, Method::DELETE, &delete, Some(bob.id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = call(&app, Method::DELETE, &delete, Some(alice.id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}
