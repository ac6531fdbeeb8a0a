//! Search, ordering and pagination of the public catalog.

use crate::domain::listing::Listing;
use crate::error::{MarketError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering as CmpOrdering;
use std::str::FromStr;

pub const PAGE_SIZES: [usize; 4] = [4, 6, 8, 12];
pub const DEFAULT_PAGE_SIZE: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Id,
    Price,
    Title,
    CreatedAt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ordering {
    pub key: SortKey,
    pub descending: bool,
}

impl Default for Ordering {
    /// Newest first.
    fn default() -> Self {
        Self {
            key: SortKey::Id,
            descending: true,
        }
    }
}

impl FromStr for Ordering {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        match s {
            "newest" => {
                return Ok(Self {
                    key: SortKey::CreatedAt,
                    descending: true,
                });
            }
            "oldest" => {
                return Ok(Self {
                    key: SortKey::CreatedAt,
                    descending: false,
                });
            }
            _ => {}
        }
        let (descending, field) = match s.strip_prefix('-') {
            Some(field) => (true, field),
            None => (false, s),
        };
        let key = match field {
            "id" => SortKey::Id,
            "price" => SortKey::Price,
            "title" => SortKey::Title,
            "created_at" => SortKey::CreatedAt,
            other => {
                return Err(MarketError::ValidationError(format!(
                    "Invalid ordering field: {other}"
                )));
            }
        };
        Ok(Self { key, descending })
    }
}

impl Ordering {
    fn compare(&self, a: &Listing, b: &Listing) -> CmpOrdering {
        let ord = match self.key {
            SortKey::Id => a.id.cmp(&b.id),
            SortKey::Price => a.price.cmp(&b.price),
            SortKey::Title => a.title.cmp(&b.title),
            SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
        }
        // Stable tiebreak so pages never overlap.
        .then_with(|| a.id.cmp(&b.id));
        if self.descending { ord.reverse() } else { ord }
    }
}

/// Query-string parameters of the catalog listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingQuery {
    pub search: Option<String>,
    #[serde(alias = "sort")]
    pub ordering: Option<String>,
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

impl ListingQuery {
    pub fn page_size(&self) -> usize {
        match self.per_page {
            Some(size) if PAGE_SIZES.contains(&size) => size,
            _ => DEFAULT_PAGE_SIZE,
        }
    }

    /// An unparseable ordering falls back to the default one.
    pub fn ordering(&self) -> Ordering {
        self.ordering
            .as_deref()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default()
    }

    /// Filters, sorts and slices `listings`.
    pub fn apply(&self, mut listings: Vec<Listing>) -> Result<Page<Listing>> {
        if let Some(term) = self.search.as_deref().map(str::trim)
            && !term.is_empty()
        {
            let term = term.to_lowercase();
            listings.retain(|l| l.title.to_lowercase().contains(&term));
        }
        let ordering = self.ordering();
        listings.sort_by(|a, b| ordering.compare(a, b));
        Page::slice(listings, self.page.unwrap_or(1), self.page_size())
    }
}

/// One page of results.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
    pub count: usize,
    pub page: usize,
    pub per_page: usize,
    pub next: Option<usize>,
    pub previous: Option<usize>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// The first page always exists, even when empty.
    pub fn slice(items: Vec<T>, page: usize, per_page: usize) -> Result<Self> {
        let count = items.len();
        let pages = count.div_ceil(per_page).max(1);
        if page == 0 || page > pages {
            return Err(MarketError::NotFound("Invalid page.".to_string()));
        }
        let results = items
            .into_iter()
            .skip((page - 1) * per_page)
            .take(per_page)
            .collect();
        Ok(Self {
            count,
            page,
            per_page,
            next: (page < pages).then_some(page + 1),
            previous: (page > 1).then(|| page - 1),
            results,
        })
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            count: self.count,
            page: self.page,
            per_page: self.per_page,
            next: self.next,
            previous: self.previous,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}
