// src/form.rs
//! Listing and category forms: state of the editing surface and the writes
//! a submit turns into.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::{Validate, ValidationError};

use crate::errors::AppError;
use crate::gateway::{BlobStore, Collection, DocumentStore, WriteFields};
use crate::models::{AuthUser, Listing, is_valid_slug, slugify};

pub const REQUIRED_FIELDS_MESSAGE: &str = "Title, price, and category are required.";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FormMode {
    #[default]
    Create,
    Edit(String),
}

/// Values of the listing form fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Validate)]
pub struct ListingDraft {
    #[serde(default)]
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "Price is required"))]
    pub price: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "Category is required"))]
    pub category: String,

    #[serde(default)]
    pub description: String,
}

impl ListingDraft {
    pub fn from_listing(listing: &Listing) -> Self {
        Self {
            title: listing.title.clone(),
            price: listing.price.clone(),
            category: listing.category.clone(),
            description: listing.description.clone(),
        }
    }

    pub fn trimmed(&self) -> Self {
        Self {
            title: self.title.trim().to_string(),
            price: self.price.trim().to_string(),
            category: self.category.clone(),
            description: self.description.trim().to_string(),
        }
    }
}

/// A file picked in the form's image input.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// State of the listing editing surface.
#[derive(Debug, Clone, Default)]
pub struct ListingForm {
    mode: FormMode,
    draft: ListingDraft,
    error: Option<String>,
    open: bool,
}

impl ListingForm {
    pub fn mode(&self) -> &FormMode {
        &self.mode
    }

    pub fn draft(&self) -> &ListingDraft {
        &self.draft
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn heading(&self) -> &'static str {
        match self.mode {
            FormMode::Create => "New Listing",
            FormMode::Edit(_) => "Edit Listing",
        }
    }

    pub fn open_new(&mut self) {
        self.reset();
        self.open = true;
    }

    pub fn open_edit(&mut self, listing: &Listing) {
        self.mode = FormMode::Edit(listing.id.clone());
        self.draft = ListingDraft::from_listing(listing);
        self.error = None;
        self.open = true;
    }

    pub fn close(&mut self) {
        self.open = false;
    }

    /// Empties every field and returns to create mode.
    pub fn reset(&mut self) {
        self.mode = FormMode::Create;
        self.draft = ListingDraft::default();
        self.error = None;
    }

    pub fn set_draft(&mut self, draft: ListingDraft) {
        self.draft = draft;
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }
}

/// Replaces everything outside `[a-zA-Z0-9._-]` with `_`.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Blob path for an image: namespaced by owner, prefixed by upload time.
pub fn upload_path(owner_uid: &str, uploaded_at_millis: i64, file_name: &str) -> String {
    format!(
        "listings/{}/{}-{}",
        owner_uid,
        uploaded_at_millis,
        sanitize_file_name(file_name)
    )
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ListingPayload<'a> {
    title: &'a str,
    price: &'a str,
    category: &'a str,
    description: &'a str,
    user_id: &'a str,
    user_email: &'a str,
    is_active: bool,
}

async fn upload_image(
    image: ImageUpload,
    owner: &AuthUser,
    blobs: &dyn BlobStore,
) -> Result<String, AppError> {
    let path = upload_path(&owner.uid, Utc::now().timestamp_millis(), &image.file_name);
    let handle = blobs
        .upload(&path, image.bytes, image.content_type.as_deref())
        .await?;
    Ok(blobs.retrievable_url(&handle).await?)
}

/// Validates the draft, uploads the image if any, then writes the document.
/// Returns the listing id.
///
/// Nothing remote happens when validation fails, and no document is written
/// when the upload fails.
pub async fn submit_listing(
    mode: &FormMode,
    draft: &ListingDraft,
    image: Option<ImageUpload>,
    author: &AuthUser,
    existing: Option<&Listing>,
    documents: &dyn DocumentStore,
    blobs: &dyn BlobStore,
) -> Result<String, AppError> {
    let draft = draft.trimmed();
    if draft.validate().is_err() {
        return Err(AppError::Validation(REQUIRED_FIELDS_MESSAGE.to_string()));
    }

    let uploaded_url = match image {
        Some(image) => Some(upload_image(image, author, blobs).await?),
        None => None,
    };

    let payload = ListingPayload {
        title: &draft.title,
        price: &draft.price,
        category: &draft.category,
        description: &draft.description,
        user_id: &author.uid,
        user_email: &author.email,
        is_active: true,
    };
    let fields = WriteFields::from_serializable(&payload)?;

    match mode {
        FormMode::Create => {
            let fields = fields
                .with("imageUrl", json!(uploaded_url))
                .with_server_timestamp("createdAt");
            let id = documents.add(Collection::Listings, fields).await?;
            tracing::info!("Created listing {} for {}", id, author.email);
            Ok(id)
        }
        FormMode::Edit(id) => {
            let fields = match existing.and_then(|l| l.created_at) {
                Some(created_at) => fields.with("createdAt", json!(created_at)),
                None => fields.with_server_timestamp("createdAt"),
            };
            let image_url = uploaded_url.or_else(|| existing.and_then(|l| l.image_url.clone()));
            let fields = fields.with("imageUrl", json!(image_url));

            documents.update(Collection::Listings, id, fields).await?;
            tracing::info!("Updated listing {} by {}", id, author.email);
            Ok(id.clone())
        }
    }
}

/// Values of the admin "add category" form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryDraft {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Validate)]
pub struct NewCategory {
    #[validate(length(min = 1, message = "Category name is required"))]
    pub name: String,

    #[validate(custom(function = "validate_slug"))]
    pub slug: String,
}

fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    if is_valid_slug(slug) {
        Ok(())
    } else {
        let mut err = ValidationError::new("slug");
        err.message = Some("Slug must contain letters or digits".into());
        Err(err)
    }
}

impl CategoryDraft {
    /// Derives the slug from the name when none was typed, and normalizes a
    /// typed one the same way.
    pub fn into_new_category(self) -> Result<NewCategory, AppError> {
        let name = self.name.trim().to_string();
        let slug = match self.slug.trim() {
            "" => slugify(&name),
            typed => slugify(typed),
        };
        let category = NewCategory { name, slug };
        category.validate()?;
        Ok(category)
    }
}

pub async fn add_category(
    category: &NewCategory,
    documents: &dyn DocumentStore,
) -> Result<String, AppError> {
    let fields = WriteFields::from_serializable(category)?;
    let id = documents.add(Collection::Categories, fields).await?;
    tracing::info!("Created category {} ({})", category.name, category.slug);
    Ok(id)
}
