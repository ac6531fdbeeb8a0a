use super::error::ApiError;
use super::state::AppState;
use crate::domain::ids::AccountId;
use axum::{extract::FromRequestParts, http::header, http::request::Parts};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use tracing::debug;

const MISSING: &str = "Authentication credentials were not provided.";
const INVALID: &str = "Given token not valid for any token type";

/// Issuers put the account id either as a number or as a string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum UserIdClaim {
    Number(u64),
    Text(String),
}

impl UserIdClaim {
    fn account_id(&self) -> Option<AccountId> {
        match self {
            UserIdClaim::Number(id) => Some(AccountId(*id)),
            UserIdClaim::Text(raw) => raw.parse().ok().map(AccountId),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: UserIdClaim,
    pub exp: usize,
}

/// Verifies HS256 bearer tokens issued by the identity provider.
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            key: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn verify(&self, token: &str) -> Result<AccountId, ApiError> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            debug!(error = %e, "token rejected");
            ApiError::Unauthorized(INVALID.to_string())
        })?;
        data.claims
            .user_id
            .account_id()
            .ok_or_else(|| ApiError::Unauthorized(INVALID.to_string()))
    }
}

/// The authenticated account making the request.
#[derive(Debug, Clone, Copy)]
pub struct Caller {
    pub account_id: AccountId,
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or_else(|| ApiError::Unauthorized(MISSING.to_string()))?;
        let value = header
            .to_str()
            .map_err(|_| ApiError::Unauthorized(INVALID.to_string()))?;
        let token = value
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::Unauthorized(MISSING.to_string()))?;

        let account_id = state.tokens.verify(token.trim())?;
        Ok(Caller { account_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};

    fn token(secret: &[u8], user_id: UserIdClaim, exp: usize) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &Claims { user_id, exp },
            &EncodingKey::from_secret(secret),
        )
        .unwrap()
    }

    fn far_future() -> usize {
        (chrono::Utc::now().timestamp() + 3600) as usize
    }

    #[test]
    fn test_verify_accepts_numeric_and_text_ids() {
        let verifier = TokenVerifier::new(b"secret");
        let numeric = token(b"secret", UserIdClaim::Number(7), far_future());
        assert_eq!(verifier.verify(&numeric).unwrap(), AccountId(7));
        let text = token(b"secret", UserIdClaim::Text("8".to_string()), far_future());
        assert_eq!(verifier.verify(&text).unwrap(), AccountId(8));
    }

    #[test]
    fn test_verify_rejects_bad_signature_and_expired() {
        let verifier = TokenVerifier::new(b"secret");
        let forged = token(b"other", UserIdClaim::Number(7), far_future());
        assert!(matches!(verifier.verify(&forged), Err(ApiError::Unauthorized(_))));
        let expired = token(b"secret", UserIdClaim::Number(7), 1);
        assert!(matches!(verifier.verify(&expired), Err(ApiError::Unauthorized(_))));
    }
}
