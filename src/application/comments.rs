use crate::domain::comment::{CommentView, NewComment};
use crate::domain::ids::{AccountId, CommentId, ListingId};
use crate::domain::ports::{AccountStoreRef, CommentStoreRef, ListingStoreRef};
use crate::error::{MarketError, Result};
use tracing::info;

#[derive(Clone)]
pub struct CommentService {
    comments: CommentStoreRef,
    listings: ListingStoreRef,
    accounts: AccountStoreRef,
}

impl CommentService {
    pub fn new(
        comments: CommentStoreRef,
        listings: ListingStoreRef,
        accounts: AccountStoreRef,
    ) -> Self {
        Self {
            comments,
            listings,
            accounts,
        }
    }

    /// Oldest first.
    pub async fn list(&self, listing: ListingId) -> Result<Vec<CommentView>> {
        self.ensure_listing(listing).await?;
        let mut comments = self.comments.for_listing(listing).await?;
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        let mut views = Vec::with_capacity(comments.len());
        for comment in comments {
            let author = self.accounts.get(comment.author).await?;
            views.push(CommentView::new(comment, author.as_ref()));
        }
        Ok(views)
    }

    pub async fn create(
        &self,
        author: AccountId,
        listing: ListingId,
        text: &str,
    ) -> Result<CommentView> {
        self.ensure_listing(listing).await?;
        let comment = self
            .comments
            .insert(NewComment::new(listing, author, text)?)
            .await?;
        info!(comment = %comment.id, listing = %listing, "comment created");
        let author = self.accounts.get(author).await?;
        Ok(CommentView::new(comment, author.as_ref()))
    }

    /// Comments by someone else are reported as missing.
    pub async fn delete(&self, caller: AccountId, id: CommentId) -> Result<()> {
        match self.comments.get(id).await? {
            Some(comment) if comment.author == caller => self.comments.delete(id).await,
            _ => Err(MarketError::NotFound("Comment not found.".to_string())),
        }
    }

    async fn ensure_listing(&self, listing: ListingId) -> Result<()> {
        match self.listings.get(listing).await? {
            Some(_) => Ok(()),
            None => Err(MarketError::NotFound("Game not found.".to_string())),
        }
    }
}
