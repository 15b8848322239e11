// src/catalog.rs
//! Local mirror of the `categories` and `listings` collections.
//!
//! The remote store is the source of truth. Every reload replaces a whole
//! collection with a fresh fetch; there is no incremental patching.

use std::cmp::Ordering;

use icu_collator::{Collator, CollatorOptions};
use strum::Display;

use crate::gateway::{Collection, Document, DocumentStore, GatewayError};
use crate::models::{Category, Listing};

/// Collections mirrored by [`CatalogCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum CachedCollection {
    Categories,
    Listings,
}

impl CachedCollection {
    pub fn collection(self) -> Collection {
        match self {
            CachedCollection::Categories => Collection::Categories,
            CachedCollection::Listings => Collection::Listings,
        }
    }
}

/// One entry of a category `<select>`: value is the slug, label the name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryOption {
    pub value: String,
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogCache {
    categories: Vec<Category>,
    listings: Vec<Listing>,
    category_options: Vec<CategoryOption>,
}

impl CatalogCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn listings(&self) -> &[Listing] {
        &self.listings
    }

    pub fn category_options(&self) -> &[CategoryOption] {
        &self.category_options
    }

    pub fn listing(&self, id: &str) -> Option<&Listing> {
        self.listings.iter().find(|l| l.id == id)
    }

    pub fn category(&self, id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    /// Replaces one collection with the store's current contents.
    ///
    /// On failure the previous contents stay in place and the error is
    /// returned unchanged.
    pub async fn refresh_collection(
        &mut self,
        store: &dyn DocumentStore,
        collection: CachedCollection,
    ) -> Result<(), GatewayError> {
        match collection {
            CachedCollection::Categories => self.reload_categories(store).await,
            CachedCollection::Listings => self.reload_listings(store).await,
        }
    }

    pub async fn reload_categories(&mut self, store: &dyn DocumentStore) -> Result<(), GatewayError> {
        let mut categories: Vec<Category> = decode_all(store, Collection::Categories).await?;
        sort_categories(&mut categories);

        self.category_options = categories
            .iter()
            .map(|c| CategoryOption {
                value: c.slug.clone(),
                label: c.name.clone(),
            })
            .collect();
        self.categories = categories;
        tracing::debug!("Reloaded {} categories", self.categories.len());
        Ok(())
    }

    pub async fn reload_listings(&mut self, store: &dyn DocumentStore) -> Result<(), GatewayError> {
        let mut listings: Vec<Listing> = decode_all(store, Collection::Listings).await?;
        sort_listings(&mut listings);

        self.listings = listings;
        tracing::debug!("Reloaded {} listings", self.listings.len());
        Ok(())
    }
}

async fn decode_all<T: serde::de::DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: Collection,
) -> Result<Vec<T>, GatewayError> {
    let docs = store.list(collection).await.map_err(|e| {
        tracing::error!("Fetching {} failed: {}", collection, e);
        e
    })?;
    docs.iter().map(Document::decode).collect()
}

/// Locale-aware name order (root collation), exact spelling as the tie-break.
pub fn sort_categories(categories: &mut [Category]) {
    match Collator::try_new(&Default::default(), CollatorOptions::new()) {
        Ok(collator) => categories.sort_by(|a, b| {
            collator
                .compare(&a.name, &b.name)
                .then_with(|| a.name.cmp(&b.name))
        }),
        Err(e) => {
            tracing::warn!("Collator unavailable, sorting categories by code point: {}", e);
            categories.sort_by(|a, b| compare_code_points(&a.name, &b.name));
        }
    }
}

fn compare_code_points(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Newest first; listings without a timestamp go last. Stable for ties.
pub fn sort_listings(listings: &mut [Listing]) {
    listings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
