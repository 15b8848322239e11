// tests/storefront_flows.rs
//! End-to-end flows of a storefront running over the in-memory backend.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;

use marketplace_frontend::auth_models::{AuthMode, AuthPayload};
use marketplace_frontend::catalog::CachedCollection;
use marketplace_frontend::errors::AppError;
use marketplace_frontend::form::{
    CategoryDraft, FormMode, ImageUpload, ListingDraft, REQUIRED_FIELDS_MESSAGE,
};
use marketplace_frontend::gateway::memory::MemoryBackend;
use marketplace_frontend::gateway::{ADMINS_DOCUMENT, Collection, DocumentStore};
use marketplace_frontend::models::AuthUser;
use marketplace_frontend::storefront::{PendingDeletion, Storefront};

const ADMIN: &str = "boss@example.com";

async fn backend_with_admin() -> MemoryBackend {
    let backend = MemoryBackend::new();
    backend
        .documents
        .set(Collection::Meta, ADMINS_DOCUMENT, json!({ "emails": [ADMIN] }))
        .await
        .unwrap();
    backend
}

async fn storefront(backend: &MemoryBackend) -> Storefront {
    let mut store = Storefront::new(&backend.gateway());
    store.start().await.unwrap();
    store
}

async fn register(store: &mut Storefront, email: &str) -> AuthUser {
    store.open_auth(AuthMode::Register);
    store
        .submit_auth(AuthPayload {
            email: email.to_string(),
            password: "secret1".to_string(),
        })
        .await
        .unwrap();
    store.session().user().cloned().unwrap()
}

fn lamp() -> ListingDraft {
    ListingDraft {
        title: "Lamp".to_string(),
        price: "25".to_string(),
        category: "home-garden".to_string(),
        description: String::new(),
    }
}

fn photo() -> ImageUpload {
    ImageUpload {
        file_name: "lamp.png".to_string(),
        content_type: Some("image/png".to_string()),
        bytes: vec![0x89, 0x50, 0x4e, 0x47],
    }
}

async fn create_lamp(store: &mut Storefront) -> String {
    store.new_listing();
    store.save_listing(lamp(), None).await.unwrap();
    assert_eq!(store.listing_form().error(), None);
    store
        .catalog()
        .listings()
        .iter()
        .find(|l| l.title == "Lamp")
        .map(|l| l.id.clone())
        .unwrap()
}

#[tokio::test]
async fn saving_a_lamp_adds_exactly_one_listing_without_image() {
    let backend = MemoryBackend::new();
    let mut store = storefront(&backend).await;
    let ann = register(&mut store, "ann@example.com").await;

    store.new_listing();
    assert!(store.listing_form().is_open());
    store.save_listing(lamp(), None).await.unwrap();

    let listings = store.catalog().listings();
    assert_eq!(listings.len(), 1);
    let saved = &listings[0];
    assert_eq!(saved.title, "Lamp");
    assert_eq!(saved.price, "25");
    assert_eq!(saved.category, "home-garden");
    assert_eq!(saved.image_url, None);
    assert_eq!(saved.user_id, ann.uid);
    assert_eq!(saved.user_email, "ann@example.com");
    assert!(saved.is_active);
    assert!(saved.created_at.is_some());

    assert!(!store.listing_form().is_open());
    assert_eq!(store.listing_form().mode(), &FormMode::Create);
    assert_eq!(store.listing_form().draft(), &ListingDraft::default());
}

#[tokio::test]
async fn saving_with_a_picture_stores_its_url() {
    let backend = MemoryBackend::new();
    let mut store = storefront(&backend).await;
    let ann = register(&mut store, "ann@example.com").await;

    store.new_listing();
    store.save_listing(lamp(), Some(photo())).await.unwrap();

    let url = store.catalog().listings()[0].image_url.clone().unwrap();
    assert!(url.starts_with(&format!("memory://listings/{}/", ann.uid)));
    assert!(url.ends_with("-lamp.png"));
    assert_eq!(store.grid().cards()[0].image_url, url);
}

#[tokio::test]
async fn admin_category_slug_is_derived_from_name() {
    let backend = backend_with_admin().await;
    let mut store = storefront(&backend).await;
    register(&mut store, ADMIN).await;
    assert!(store.session().is_admin());

    store.open_admin().unwrap();
    store
        .add_category(CategoryDraft {
            name: "Home & Garden".to_string(),
            slug: String::new(),
        })
        .await
        .unwrap();

    let categories = store.catalog().categories();
    assert_eq!(categories.len(), 1);
    assert_eq!(categories[0].slug, "home-garden");
    assert_eq!(store.catalog().category_options()[0].value, "home-garden");
    assert_eq!(store.admin_error(), None);
}

#[tokio::test]
async fn admin_category_without_name_is_rejected_inline() {
    let backend = backend_with_admin().await;
    let mut store = storefront(&backend).await;
    register(&mut store, ADMIN).await;
    store.open_admin().unwrap();

    store.add_category(CategoryDraft::default()).await.unwrap();

    assert!(store.admin_error().is_some());
    assert!(store.catalog().categories().is_empty());
}

#[tokio::test]
async fn newer_listings_come_first() {
    let backend = MemoryBackend::new();
    for (id, seconds) in [("older", 100), ("newer", 200)] {
        let created_at: DateTime<Utc> = Utc.timestamp_opt(seconds, 0).unwrap();
        backend
            .documents
            .set(
                Collection::Listings,
                id,
                json!({ "title": id, "price": "1", "category": "misc", "createdAt": created_at }),
            )
            .await
            .unwrap();
    }

    let store = storefront(&backend).await;
    let grid = store.grid();
    let order: Vec<&str> = grid.cards().iter().map(|c| c.id.as_str()).collect();
    assert_eq!(order, ["newer", "older"]);
}

#[tokio::test]
async fn other_users_see_no_affordances_and_cannot_edit() {
    let backend = MemoryBackend::new();
    let mut ann_store = storefront(&backend).await;
    register(&mut ann_store, "ann@example.com").await;
    let id = create_lamp(&mut ann_store).await;
    assert_eq!(ann_store.grid().editable_count(), 1);

    let mut bob_store = storefront(&backend).await;
    assert_eq!(bob_store.grid().cards().len(), 1);
    assert_eq!(bob_store.grid().editable_count(), 0);

    register(&mut bob_store, "bob@example.com").await;
    assert_eq!(bob_store.grid().editable_count(), 0);
    assert!(matches!(
        bob_store.edit_listing(&id),
        Err(AppError::Forbidden(_))
    ));
    assert!(matches!(
        bob_store.request_listing_deletion(&id),
        Err(AppError::Forbidden(_))
    ));
    assert_eq!(bob_store.pending(), None);
}

#[tokio::test]
async fn admin_can_edit_anyone_and_becomes_author() {
    let backend = backend_with_admin().await;
    let mut ann_store = storefront(&backend).await;
    register(&mut ann_store, "ann@example.com").await;
    let id = create_lamp(&mut ann_store).await;

    let mut admin_store = storefront(&backend).await;
    let admin = register(&mut admin_store, ADMIN).await;
    assert_eq!(admin_store.grid().editable_count(), 1);

    admin_store.edit_listing(&id).unwrap();
    let draft = ListingDraft {
        price: "20".to_string(),
        ..admin_store.listing_form().draft().clone()
    };
    admin_store.save_listing(draft, None).await.unwrap();

    let edited = admin_store.catalog().listing(&id).unwrap();
    assert_eq!(edited.price, "20");
    assert_eq!(edited.user_id, admin.uid);
    assert_eq!(edited.user_email, ADMIN);
}

#[tokio::test]
async fn editing_preserves_timestamp_and_image() {
    let backend = MemoryBackend::new();
    let mut store = storefront(&backend).await;
    let ann = register(&mut store, "ann@example.com").await;

    let created_at: DateTime<Utc> = Utc.timestamp_opt(100, 0).unwrap();
    backend
        .documents
        .set(
            Collection::Listings,
            "l1",
            json!({
                "title": "Lamp",
                "price": "25",
                "category": "home-garden",
                "description": "Brass",
                "imageUrl": "https://cdn.example.com/lamp.png",
                "userId": ann.uid,
                "userEmail": ann.email,
                "isActive": true,
                "createdAt": created_at,
            }),
        )
        .await
        .unwrap();
    store
        .refresh_collection(CachedCollection::Listings)
        .await
        .unwrap();

    store.edit_listing("l1").unwrap();
    assert_eq!(store.listing_form().heading(), "Edit Listing");
    assert_eq!(store.listing_form().draft().description, "Brass");

    let draft = ListingDraft {
        title: "Brass Lamp".to_string(),
        ..store.listing_form().draft().clone()
    };
    store.save_listing(draft, None).await.unwrap();

    let edited = store.catalog().listing("l1").unwrap();
    assert_eq!(edited.title, "Brass Lamp");
    assert_eq!(edited.created_at, Some(created_at));
    assert_eq!(
        edited.image_url.as_deref(),
        Some("https://cdn.example.com/lamp.png")
    );
    assert_eq!(store.catalog().listings().len(), 1);
}

#[tokio::test]
async fn failed_upload_leaves_no_document_and_reports_in_form() {
    let backend = MemoryBackend::new();
    let mut store = storefront(&backend).await;
    register(&mut store, "ann@example.com").await;
    backend.blobs.fail_uploads(true);

    store.new_listing();
    store.save_listing(lamp(), Some(photo())).await.unwrap();

    assert!(store.listing_form().is_open());
    assert!(
        store
            .listing_form()
            .error()
            .is_some_and(|e| e.contains("upload rejected"))
    );
    assert_eq!(store.listing_form().draft(), &lamp());
    assert!(store.catalog().listings().is_empty());
    assert!(
        backend
            .documents
            .list(Collection::Listings)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn missing_fields_are_reported_without_remote_calls() {
    let backend = MemoryBackend::new();
    let mut store = storefront(&backend).await;
    register(&mut store, "ann@example.com").await;

    backend.documents.set_offline(true);
    store.new_listing();
    store
        .save_listing(
            ListingDraft {
                category: String::new(),
                ..lamp()
            },
            Some(photo()),
        )
        .await
        .unwrap();

    assert_eq!(store.listing_form().error(), Some(REQUIRED_FIELDS_MESSAGE));
    assert!(store.listing_form().is_open());
    assert_eq!(backend.blobs.len().await, 0);
}

#[tokio::test]
async fn remote_save_failure_is_shown_in_form() {
    let backend = MemoryBackend::new();
    let mut store = storefront(&backend).await;
    register(&mut store, "ann@example.com").await;

    backend.documents.set_offline(true);
    store.new_listing();
    store.save_listing(lamp(), None).await.unwrap();

    assert!(
        store
            .listing_form()
            .error()
            .is_some_and(|e| e.starts_with("Remote operation failed"))
    );
    assert!(store.listing_form().is_open());
}

#[tokio::test]
async fn rejected_sign_up_keeps_session() {
    let backend = MemoryBackend::new();
    let mut store = storefront(&backend).await;

    store.open_auth(AuthMode::Register);
    store
        .submit_auth(AuthPayload {
            email: "ann@example.com".to_string(),
            password: "123".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(
        store.auth_error(),
        Some("Password should be at least 6 characters.")
    );
    assert_eq!(store.auth_mode(), Some(AuthMode::Register));
    assert!(!store.session().is_signed_in());
}

#[tokio::test]
async fn admin_rights_follow_the_session() {
    let backend = backend_with_admin().await;
    let mut store = storefront(&backend).await;
    assert!(!store.session().is_admin());

    register(&mut store, ADMIN).await;
    assert!(store.session().is_admin());
    store.open_admin().unwrap();
    assert!(store.is_admin_open());

    store.logout().await.unwrap();
    assert!(!store.session().is_signed_in());
    assert!(!store.session().is_admin());
    assert!(!store.is_admin_open());
    assert!(matches!(store.open_admin(), Err(AppError::Forbidden(_))));

    register(&mut store, "ann@example.com").await;
    assert!(!store.session().is_admin());
}

#[tokio::test]
async fn listing_deletion_needs_confirmation() {
    let backend = MemoryBackend::new();
    let mut store = storefront(&backend).await;
    register(&mut store, "ann@example.com").await;
    let id = create_lamp(&mut store).await;

    store.request_listing_deletion(&id).unwrap();
    assert_eq!(store.pending(), Some(&PendingDeletion::Listing(id.clone())));
    assert_eq!(store.catalog().listings().len(), 1);

    store.confirm_deletion().await.unwrap();
    assert_eq!(store.pending(), None);
    assert!(store.catalog().listings().is_empty());
    assert!(
        backend
            .documents
            .get(Collection::Listings, &id)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn category_deletion_reloads_categories() {
    let backend = backend_with_admin().await;
    backend
        .documents
        .set(Collection::Categories, "c1", json!({ "name": "Books", "slug": "books" }))
        .await
        .unwrap();
    let mut store = storefront(&backend).await;
    register(&mut store, ADMIN).await;
    assert_eq!(store.catalog().categories().len(), 1);

    store.request_category_deletion("c1").unwrap();
    assert_eq!(
        store.pending().map(PendingDeletion::prompt),
        Some("Delete this category?")
    );
    store.confirm_deletion().await.unwrap();

    assert!(store.catalog().categories().is_empty());
    assert!(store.catalog().category_options().is_empty());
}

#[tokio::test]
async fn failed_delete_propagates_and_keeps_cache() {
    let backend = MemoryBackend::new();
    let mut store = storefront(&backend).await;
    register(&mut store, "ann@example.com").await;
    let id = create_lamp(&mut store).await;

    store.request_listing_deletion(&id).unwrap();
    backend.documents.set_offline(true);
    let result = store.confirm_deletion().await;

    assert!(matches!(result, Err(AppError::Remote(_))));
    assert_eq!(store.catalog().listings().len(), 1);
}

#[tokio::test]
async fn reloading_twice_yields_the_same_cache() {
    let backend = MemoryBackend::new();
    let mut store = storefront(&backend).await;
    register(&mut store, "ann@example.com").await;
    create_lamp(&mut store).await;

    store
        .refresh_collection(CachedCollection::Listings)
        .await
        .unwrap();
    store
        .refresh_collection(CachedCollection::Categories)
        .await
        .unwrap();
    let first = store.catalog().clone();

    store
        .refresh_collection(CachedCollection::Listings)
        .await
        .unwrap();
    store
        .refresh_collection(CachedCollection::Categories)
        .await
        .unwrap();
    assert_eq!(store.catalog(), &first);
}

#[tokio::test]
async fn search_and_category_filter_narrow_the_grid() {
    let backend = MemoryBackend::new();
    let mut store = storefront(&backend).await;
    register(&mut store, "ann@example.com").await;
    create_lamp(&mut store).await;
    store.new_listing();
    store
        .save_listing(
            ListingDraft {
                title: "Bike".to_string(),
                price: "90".to_string(),
                category: "sports".to_string(),
                description: "Comes with a lamp".to_string(),
            },
            None,
        )
        .await
        .unwrap();

    store.set_search("LAMP");
    assert_eq!(store.grid().cards().len(), 2);

    store.set_category_filter("sports");
    let titles: Vec<String> = store.grid().cards().iter().map(|c| c.title.clone()).collect();
    assert_eq!(titles, ["Bike"]);

    store.set_search("sofa");
    assert!(store.grid().cards().is_empty());

    store.clear_filters();
    assert_eq!(store.grid().cards().len(), 2);
}
