// src/storefront.rs
//! Per-client front-end controller. Owns the catalog mirror, the session
//! context, filter state and the open dialogs, and turns each UI event into
//! gateway calls followed by the reloads that keep the mirror authoritative.

use std::sync::Arc;

use crate::auth_models::{AuthMode, AuthPayload};
use crate::catalog::{CachedCollection, CatalogCache};
use crate::errors::AppError;
use crate::filters::{ListingQuery, is_editable};
use crate::form::{self, CategoryDraft, FormMode, ImageUpload, ListingDraft, ListingForm};
use crate::gateway::{
    BlobStore, Collection, DocumentStore, Gateway, IdentityProvider, SessionSubscription,
};
use crate::models::{AuthUser, Listing};
use crate::session::{SessionContext, SessionGate};
use crate::view::{GridView, build_grid};

pub const LOGIN_FIRST_NOTICE: &str = "Please log in first.";

/// Deletion waiting for the user's confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingDeletion {
    Listing(String),
    Category(String),
}

impl PendingDeletion {
    pub fn prompt(&self) -> &'static str {
        match self {
            PendingDeletion::Listing(_) => "Delete this listing?",
            PendingDeletion::Category(_) => "Delete this category?",
        }
    }
}

#[derive(Debug, Default)]
struct AuthSurface {
    mode: Option<AuthMode>,
    error: Option<String>,
}

#[derive(Debug, Default)]
struct AdminPanel {
    open: bool,
    error: Option<String>,
}

pub struct Storefront {
    documents: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
    identity: Arc<dyn IdentityProvider>,
    session_events: SessionSubscription,
    gate: SessionGate,
    catalog: CatalogCache,
    query: ListingQuery,
    auth: AuthSurface,
    listing_form: ListingForm,
    admin: AdminPanel,
    pending: Option<PendingDeletion>,
    notice: Option<String>,
}

impl Storefront {
    /// A signed-out client with an empty mirror. Call [`Storefront::start`]
    /// before the first render.
    pub fn new(gateway: &Gateway) -> Self {
        let identity = gateway.identities.connect();
        let session_events = identity.subscribe();
        Self {
            documents: gateway.documents.clone(),
            blobs: gateway.blobs.clone(),
            identity,
            session_events,
            gate: SessionGate::new(),
            catalog: CatalogCache::new(),
            query: ListingQuery::default(),
            auth: AuthSurface::default(),
            listing_form: ListingForm::default(),
            admin: AdminPanel::default(),
            pending: None,
            notice: None,
        }
    }

    /// Applies the initial session notification, which loads both collections.
    pub async fn start(&mut self) -> Result<(), AppError> {
        self.sync_session().await
    }

    /// Handles every session notification pushed since the last event, in
    /// order, each to completion.
    pub async fn sync_session(&mut self) -> Result<(), AppError> {
        while let Some(user) = self.session_events.take_pending() {
            self.on_session_change(user).await?;
        }
        Ok(())
    }

    async fn on_session_change(&mut self, user: Option<AuthUser>) -> Result<(), AppError> {
        self.gate.transition(user, self.documents.as_ref()).await?;
        if !self.session().is_admin() {
            self.admin = AdminPanel::default();
        }
        self.catalog.reload_categories(self.documents.as_ref()).await?;
        self.catalog.reload_listings(self.documents.as_ref()).await?;
        Ok(())
    }

    /// Replaces one collection of the mirror with a fresh fetch.
    pub async fn refresh_collection(&mut self, collection: CachedCollection) -> Result<(), AppError> {
        self.catalog
            .refresh_collection(self.documents.as_ref(), collection)
            .await?;
        Ok(())
    }

    // ---- Auth ----

    pub fn open_auth(&mut self, mode: AuthMode) {
        self.auth.mode = Some(mode);
        self.auth.error = None;
    }

    pub fn close_auth(&mut self) {
        self.auth = AuthSurface::default();
    }

    /// Rejections are shown in the auth dialog and leave the session as is.
    pub async fn submit_auth(&mut self, payload: AuthPayload) -> Result<(), AppError> {
        self.auth.error = None;
        let mode = self.auth.mode.unwrap_or(AuthMode::Login);
        let email = payload.email.trim();

        let result = match mode {
            AuthMode::Register => self.identity.sign_up(email, &payload.password).await,
            AuthMode::Login => self.identity.sign_in(email, &payload.password).await,
        };

        match result {
            Ok(user) => {
                tracing::info!("{} succeeded for {}", mode, user.email);
                self.close_auth();
                self.sync_session().await
            }
            Err(err) => {
                tracing::warn!("{} rejected for {}: {}", mode, email, err);
                self.auth.mode = Some(mode);
                self.auth.error = Some(err.to_string());
                Ok(())
            }
        }
    }

    pub async fn logout(&mut self) -> Result<(), AppError> {
        self.identity.sign_out().await?;
        self.sync_session().await
    }

    // ---- Listings ----

    pub fn new_listing(&mut self) {
        if !self.session().is_signed_in() {
            self.notice = Some(LOGIN_FIRST_NOTICE.to_string());
            return;
        }
        self.listing_form.open_new();
    }

    pub fn edit_listing(&mut self, id: &str) -> Result<(), AppError> {
        let listing = self.editable_listing(id)?.clone();
        self.listing_form.open_edit(&listing);
        Ok(())
    }

    pub fn close_listing_form(&mut self) {
        self.listing_form.close();
    }

    /// Submits the form. Validation, upload and write failures, and a failed
    /// reload afterwards, are reported inside the form, which stays open.
    pub async fn save_listing(
        &mut self,
        draft: ListingDraft,
        image: Option<ImageUpload>,
    ) -> Result<(), AppError> {
        let Some(author) = self.session().user().cloned() else {
            self.notice = Some(LOGIN_FIRST_NOTICE.to_string());
            return Ok(());
        };

        let mode = self.listing_form.mode().clone();
        let existing = match &mode {
            FormMode::Create => None,
            FormMode::Edit(id) => Some(self.editable_listing(id)?.clone()),
        };

        self.listing_form.set_draft(draft.clone());
        self.listing_form.clear_error();

        let submitted = form::submit_listing(
            &mode,
            &draft,
            image,
            &author,
            existing.as_ref(),
            self.documents.as_ref(),
            self.blobs.as_ref(),
        )
        .await;
        let outcome = match submitted {
            Ok(_) => self
                .catalog
                .reload_listings(self.documents.as_ref())
                .await
                .map_err(AppError::from),
            Err(err) => Err(err),
        };

        match outcome {
            Ok(()) => {
                self.listing_form.close();
                self.listing_form.reset();
            }
            Err(err) => {
                tracing::warn!("Saving listing failed: {}", err);
                self.listing_form.set_error(err.user_message());
            }
        }
        Ok(())
    }

    fn editable_listing(&self, id: &str) -> Result<&Listing, AppError> {
        let listing = self
            .catalog
            .listing(id)
            .ok_or_else(|| AppError::NotFound(format!("listing {id}")))?;
        let session = self.session();
        if !is_editable(listing, session.user(), session.is_admin()) {
            tracing::warn!("Refused change to listing {} by a non-owner", id);
            return Err(AppError::Forbidden(
                "You can only change your own listings".to_string(),
            ));
        }
        Ok(listing)
    }

    // ---- Deletion ----

    pub fn request_listing_deletion(&mut self, id: &str) -> Result<(), AppError> {
        self.editable_listing(id)?;
        self.pending = Some(PendingDeletion::Listing(id.to_string()));
        Ok(())
    }

    pub fn request_category_deletion(&mut self, id: &str) -> Result<(), AppError> {
        self.require_admin()?;
        if self.catalog.category(id).is_none() {
            return Err(AppError::NotFound(format!("category {id}")));
        }
        self.pending = Some(PendingDeletion::Category(id.to_string()));
        Ok(())
    }

    pub fn cancel_deletion(&mut self) {
        self.pending = None;
    }

    /// Runs the pending deletion, then reloads what it affected.
    pub async fn confirm_deletion(&mut self) -> Result<(), AppError> {
        let Some(pending) = self.pending.take() else {
            return Ok(());
        };

        match pending {
            PendingDeletion::Listing(id) => {
                self.editable_listing(&id)?;
                self.documents.delete(Collection::Listings, &id).await?;
                tracing::info!("Deleted listing {}", id);
                self.refresh_collection(CachedCollection::Listings).await
            }
            PendingDeletion::Category(id) => {
                self.require_admin()?;
                self.documents.delete(Collection::Categories, &id).await?;
                tracing::info!("Deleted category {}", id);
                self.refresh_collection(CachedCollection::Categories).await?;
                self.refresh_collection(CachedCollection::Listings).await
            }
        }
    }

    // ---- Filters ----

    pub fn set_search(&mut self, search: impl Into<String>) {
        self.query.search = search.into();
    }

    pub fn set_category_filter(&mut self, category: impl Into<String>) {
        self.query.category = category.into();
    }

    pub fn clear_filters(&mut self) {
        self.query.clear();
    }

    // ---- Admin ----

    fn require_admin(&self) -> Result<(), AppError> {
        if self.session().is_admin() {
            Ok(())
        } else {
            tracing::warn!("Refused admin action for a non-admin session");
            Err(AppError::Forbidden("Admins only".to_string()))
        }
    }

    pub fn open_admin(&mut self) -> Result<(), AppError> {
        self.require_admin()?;
        self.admin.open = true;
        self.admin.error = None;
        Ok(())
    }

    pub fn close_admin(&mut self) {
        self.admin = AdminPanel::default();
    }

    /// An unusable name or slug is reported in the admin panel; remote
    /// failures propagate.
    pub async fn add_category(&mut self, draft: CategoryDraft) -> Result<(), AppError> {
        self.require_admin()?;
        self.admin.error = None;

        let category = match draft.into_new_category() {
            Ok(category) => category,
            Err(err) => {
                self.admin.error = Some(err.user_message());
                return Ok(());
            }
        };
        form::add_category(&category, self.documents.as_ref()).await?;

        self.refresh_collection(CachedCollection::Categories).await?;
        self.refresh_collection(CachedCollection::Listings).await
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    // ---- Read side ----

    pub fn session(&self) -> &SessionContext {
        self.gate.context()
    }

    pub fn catalog(&self) -> &CatalogCache {
        &self.catalog
    }

    pub fn query(&self) -> &ListingQuery {
        &self.query
    }

    pub fn auth_mode(&self) -> Option<AuthMode> {
        self.auth.mode
    }

    pub fn auth_error(&self) -> Option<&str> {
        self.auth.error.as_deref()
    }

    pub fn listing_form(&self) -> &ListingForm {
        &self.listing_form
    }

    pub fn is_admin_open(&self) -> bool {
        self.admin.open
    }

    pub fn admin_error(&self) -> Option<&str> {
        self.admin.error.as_deref()
    }

    pub fn pending(&self) -> Option<&PendingDeletion> {
        self.pending.as_ref()
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn grid(&self) -> GridView {
        build_grid(self.catalog.listings(), self.session(), &self.query)
    }
}
