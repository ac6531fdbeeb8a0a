use super::account::{Account, Balance};
use super::ids::{AccountId, ListingId};
use crate::error::{MarketError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const MAX_TITLE_LEN: usize = 24;

/// Asking price of a listing, two decimal places, within `[MIN, MAX]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Price(Decimal);

impl Price {
    pub const MIN: Decimal = dec!(10.00);
    pub const MAX: Decimal = dec!(999.99);

    pub fn new(value: Decimal) -> Result<Self> {
        if value.normalize().scale() > 2 {
            return Err(MarketError::ValidationError(
                "Ensure that there are no more than 2 decimal places.".to_string(),
            ));
        }
        if value < Self::MIN || value > Self::MAX {
            return Err(MarketError::ValidationError(format!(
                "Price must be between {} and {}.",
                Self::MIN,
                Self::MAX
            )));
        }
        let mut value = value.normalize();
        value.rescale(2);
        Ok(Self(value))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Price {
    type Error = MarketError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.0
    }
}

impl From<Price> for Balance {
    fn from(price: Price) -> Self {
        Balance::new(price.0)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Category {
    #[serde(alias = "Action")]
    Action,
    #[serde(alias = "Adventure")]
    Adventure,
    #[serde(alias = "Puzzle")]
    Puzzle,
    #[serde(alias = "Strategy")]
    Strategy,
    #[serde(alias = "Sports")]
    Sports,
    #[serde(alias = "Board/Card Game")]
    Board,
    #[serde(alias = "Other")]
    Other,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Action,
        Category::Adventure,
        Category::Puzzle,
        Category::Strategy,
        Category::Sports,
        Category::Board,
        Category::Other,
    ];

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Category::Action => "Action",
            Category::Adventure => "Adventure",
            Category::Puzzle => "Puzzle",
            Category::Strategy => "Strategy",
            Category::Sports => "Sports",
            Category::Board => "Board/Card Game",
            Category::Other => "Other",
        }
    }
}

impl FromStr for Category {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        Category::ALL
            .into_iter()
            .find(|c| {
                s.eq_ignore_ascii_case(c.label())
                    || s.eq_ignore_ascii_case(&format!("{c:?}"))
            })
            .ok_or_else(|| MarketError::ValidationError(format!("\"{s}\" is not a valid choice.")))
    }
}

/// A game offered for sale.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Listing {
    pub id: ListingId,
    pub title: String,
    pub category: Category,
    pub price: Price,
    pub summary: Option<String>,
    pub image_ref: Option<String>,
    /// `None` for house listings; purchases of those have no payee.
    pub owner: Option<AccountId>,
    pub created_at: DateTime<Utc>,
}

impl Listing {
    pub fn new(id: ListingId, owner: Option<AccountId>, new: NewListing) -> Self {
        Self {
            id,
            title: new.title,
            category: new.category,
            price: new.price,
            summary: new.summary,
            image_ref: new.image_ref,
            owner,
            created_at: Utc::now(),
        }
    }

    pub fn is_owned_by(&self, account: AccountId) -> bool {
        self.owner == Some(account)
    }

    pub fn apply(&mut self, patch: ListingPatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        if let Some(price) = patch.price {
            self.price = price;
        }
        if let Some(summary) = patch.summary {
            self.summary = Some(summary).filter(|s| !s.trim().is_empty());
        }
        if let Some(image_ref) = patch.image_ref {
            self.image_ref = Some(image_ref).filter(|s| !s.trim().is_empty());
        }
    }
}

/// Creation payload. The owner is never taken from the body.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct NewListing {
    pub title: String,
    pub category: Category,
    pub price: Price,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub image_ref: Option<String>,
}

impl NewListing {
    pub fn new(title: impl Into<String>, category: Category, price: Price) -> Self {
        Self {
            title: title.into(),
            category,
            price,
            summary: None,
            image_ref: None,
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn validated(self) -> Result<Self> {
        Ok(Self {
            title: validate_title(&self.title)?,
            summary: self.summary.filter(|s| !s.trim().is_empty()),
            image_ref: self.image_ref.filter(|s| !s.trim().is_empty()),
            ..self
        })
    }
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct ListingPatch {
    pub title: Option<String>,
    pub category: Option<Category>,
    pub price: Option<Price>,
    pub summary: Option<String>,
    pub image_ref: Option<String>,
}

impl ListingPatch {
    pub fn validated(self) -> Result<Self> {
        let title = self.title.as_deref().map(validate_title).transpose()?;
        Ok(Self { title, ..self })
    }
}

fn validate_title(raw: &str) -> Result<String> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(MarketError::ValidationError(
            "Title may not be blank.".to_string(),
        ));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(MarketError::ValidationError(format!(
            "Ensure title has no more than {MAX_TITLE_LEN} characters."
        )));
    }
    Ok(title.to_string())
}

/// Public projection of a listing, as returned by the catalog and the buy
/// endpoint.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct ListingView {
    pub id: ListingId,
    pub title: String,
    pub summary: Option<String>,
    pub price: Price,
    pub category: Category,
    pub image_ref: Option<String>,
    pub owner_id: Option<AccountId>,
    pub seller_display: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ListingView {
    pub fn new(listing: Listing, seller: Option<&Account>) -> Self {
        Self {
            id: listing.id,
            title: listing.title,
            summary: listing.summary,
            price: listing.price,
            category: listing.category,
            image_ref: listing.image_ref,
            owner_id: listing.owner,
            seller_display: seller.map(Account::display_name),
            created_at: listing.created_at,
        }
    }
}
