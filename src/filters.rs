// src/filters.rs
use serde::Deserialize;

use crate::models::{AuthUser, Listing};

/// Search box and category selector state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ListingQuery {
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub category: String,
}

impl ListingQuery {
    pub fn new(search: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            search: search.into(),
            category: category.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.search.trim().is_empty() && self.category.is_empty()
    }

    pub fn clear(&mut self) {
        self.search.clear();
        self.category.clear();
    }

    pub fn matches(&self, listing: &Listing) -> bool {
        self.matcher().matches(listing)
    }

    fn matcher(&self) -> Matcher<'_> {
        Matcher {
            category: &self.category,
            needle: self.search.trim().to_lowercase(),
        }
    }
}

struct Matcher<'a> {
    category: &'a str,
    needle: String,
}

impl Matcher<'_> {
    fn matches(&self, listing: &Listing) -> bool {
        let category_ok = self.category.is_empty() || listing.category == self.category;
        let text_ok = self.needle.is_empty()
            || listing.title.to_lowercase().contains(&self.needle)
            || listing.description.to_lowercase().contains(&self.needle);
        category_ok && text_ok
    }
}

/// Keeps the input order; never re-sorts.
pub fn filter_listings<'a>(listings: &'a [Listing], query: &ListingQuery) -> Vec<&'a Listing> {
    let matcher = query.matcher();
    listings.iter().filter(|l| matcher.matches(l)).collect()
}

/// Owners and admins may edit or delete; anonymous viewers never.
pub fn is_editable(listing: &Listing, user: Option<&AuthUser>, is_admin: bool) -> bool {
    match user {
        Some(user) => listing.is_owned_by(user) || is_admin,
        None => false,
    }
}
