use super::account::Account;
use super::ids::{AccountId, CommentId, ListingId};
use crate::error::{MarketError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A remark left by an account on a listing; one per (listing, author).
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Comment {
    pub id: CommentId,
    pub listing: ListingId,
    pub author: AccountId,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(id: CommentId, new: NewComment) -> Self {
        Self {
            id,
            listing: new.listing,
            author: new.author,
            text: new.text,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewComment {
    pub listing: ListingId,
    pub author: AccountId,
    pub text: String,
}

impl NewComment {
    pub fn new(listing: ListingId, author: AccountId, text: impl Into<String>) -> Result<Self> {
        let text = text.into().trim().to_string();
        if text.is_empty() {
            return Err(MarketError::ValidationError(
                "This field may not be blank.".to_string(),
            ));
        }
        Ok(Self {
            listing,
            author,
            text,
        })
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct CommentView {
    pub id: CommentId,
    pub text: String,
    pub user_email: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CommentView {
    pub fn new(comment: Comment, author: Option<&Account>) -> Self {
        Self {
            id: comment.id,
            text: comment.text,
            user_email: author.map(|a| a.email.clone()),
            created_at: comment.created_at,
        }
    }
}
