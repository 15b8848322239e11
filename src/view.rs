// src/view.rs
//! Render-ready descriptors for the listing grid. Pure data; `render`
//! turns them into markup.

use crate::filters::{ListingQuery, filter_listings, is_editable};
use crate::models::Listing;
use crate::session::SessionContext;

pub const EMPTY_GRID_MESSAGE: &str = "No listings yet.";

const EXCERPT_CHARS: usize = 140;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingCard {
    pub id: String,
    pub title: String,
    pub category: String,
    pub price_label: String,
    pub owner_email: String,
    pub image_url: String,
    pub excerpt: String,
    /// Edit and delete affordances are shown only when set.
    pub editable: bool,
}

impl ListingCard {
    pub fn new(listing: &Listing, session: &SessionContext) -> Self {
        Self {
            id: listing.id.clone(),
            title: listing.title.clone(),
            category: listing.category.clone(),
            price_label: format!("${}", listing.price),
            owner_email: listing.user_email.clone(),
            image_url: listing
                .image_url
                .clone()
                .filter(|url| !url.is_empty())
                .unwrap_or_else(|| placeholder_image(&listing.id)),
            excerpt: excerpt(&listing.description),
            editable: is_editable(listing, session.user(), session.is_admin()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridView {
    Empty { message: &'static str },
    Cards(Vec<ListingCard>),
}

impl GridView {
    pub fn cards(&self) -> &[ListingCard] {
        match self {
            GridView::Empty { .. } => &[],
            GridView::Cards(cards) => cards.as_slice(),
        }
    }

    pub fn editable_count(&self) -> usize {
        self.cards().iter().filter(|c| c.editable).count()
    }
}

/// Filters the cached listings and annotates each with what the viewer may do.
pub fn build_grid(listings: &[Listing], session: &SessionContext, query: &ListingQuery) -> GridView {
    let cards: Vec<ListingCard> = filter_listings(listings, query)
        .into_iter()
        .map(|l| ListingCard::new(l, session))
        .collect();

    if cards.is_empty() {
        GridView::Empty {
            message: EMPTY_GRID_MESSAGE,
        }
    } else {
        GridView::Cards(cards)
    }
}

fn placeholder_image(listing_id: &str) -> String {
    format!("https://picsum.photos/seed/{}/600/400", listing_id)
}

fn excerpt(description: &str) -> String {
    let mut chars = description.chars();
    let head: String = chars.by_ref().take(EXCERPT_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}
