use crate::application::purchase::PurchaseError;
use crate::error::MarketError;
use axum::{
    Json,
    extract::{
        FromRequest, FromRequestParts,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::error;

const BUSY: &str = "Store busy, retry later.";
const INTERNAL: &str = "Internal server error.";

/// Every handler returns `Result<_, ApiError>`; the body is always
/// `{"detail": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error(transparent)]
    Market(#[from] MarketError),
    #[error(transparent)]
    Purchase(#[from] PurchaseError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl ApiError {
    fn status_and_detail(&self) -> (StatusCode, String) {
        match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Market(err) => match err {
                MarketError::ValidationError(msg) | MarketError::Conflict(msg) => {
                    (StatusCode::BAD_REQUEST, msg.clone())
                }
                MarketError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
                MarketError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
                MarketError::Busy(_) => (StatusCode::SERVICE_UNAVAILABLE, BUSY.to_string()),
                other => {
                    error!(error = %other, "request failed");
                    (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.to_string())
                }
            },
            ApiError::Purchase(err) => match err {
                PurchaseError::NotFound | PurchaseError::UnknownBuyer => {
                    (StatusCode::NOT_FOUND, err.to_string())
                }
                PurchaseError::AlreadyPurchased
                | PurchaseError::InsufficientFunds
                | PurchaseError::OwnListing => (StatusCode::BAD_REQUEST, err.to_string()),
                PurchaseError::Busy => (StatusCode::SERVICE_UNAVAILABLE, BUSY.to_string()),
                PurchaseError::Store(inner) => {
                    error!(error = %inner, "purchase failed in the store");
                    (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.to_string())
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = self.status_and_detail();
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

/// `Json` whose rejection is reported as an `ApiError`.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct AppJson<T>(pub T);

impl<T: Serialize> IntoResponse for AppJson<T> {
    fn into_response(self) -> Response {
        Json(self.0).into_response()
    }
}

/// `Path` whose rejection is reported as an `ApiError`.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct AppPath<T>(pub T);

/// `Query` whose rejection is reported as an `ApiError`.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct AppQuery<T>(pub T);
