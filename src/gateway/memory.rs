// src/gateway/memory.rs
//! In-process backend used for local development and tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    BlobHandle, BlobStore, Collection, Document, DocumentStore, GatewayError, IdentityProvider,
    IdentityService, SessionChannel, SessionSubscription, WriteFields,
};
use crate::auth::AuthError;
use crate::auth_models::Credentials;
use crate::models::AuthUser;

/// All three services wired together.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    pub documents: Arc<MemoryDocumentStore>,
    pub blobs: Arc<MemoryBlobStore>,
    pub accounts: Arc<MemoryAccounts>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gateway(&self) -> super::Gateway {
        super::Gateway {
            documents: self.documents.clone(),
            blobs: self.blobs.clone(),
            identities: self.accounts.clone(),
        }
    }
}

#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<HashMap<Collection, Vec<Document>>>,
    offline: AtomicBool,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every call fails with [`GatewayError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Writes a document under a caller-chosen id, replacing any previous one.
    pub async fn set(
        &self,
        collection: Collection,
        id: &str,
        fields: Value,
    ) -> Result<(), GatewayError> {
        let Value::Object(fields) = fields else {
            return Err(GatewayError::InvalidFields(fields.to_string()));
        };
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection).or_default();
        match docs.iter_mut().find(|d| d.id == id) {
            Some(doc) => doc.fields = fields,
            None => docs.push(Document::new(id, fields)),
        }
        Ok(())
    }

    fn ensure_online(&self) -> Result<(), GatewayError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(GatewayError::Unavailable(
                "in-memory document store is offline".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn list(&self, collection: Collection) -> Result<Vec<Document>, GatewayError> {
        self.ensure_online()?;
        let collections = self.collections.read().await;
        Ok(collections.get(&collection).cloned().unwrap_or_default())
    }

    async fn get(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<Document>, GatewayError> {
        self.ensure_online()?;
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .and_then(|docs| docs.iter().find(|d| d.id == id))
            .cloned())
    }

    async fn add(&self, collection: Collection, fields: WriteFields) -> Result<String, GatewayError> {
        self.ensure_online()?;
        let id = Uuid::new_v4().simple().to_string();
        let fields = fields.resolve(Utc::now())?;
        self.collections
            .write()
            .await
            .entry(collection)
            .or_default()
            .push(Document::new(id.clone(), fields));
        Ok(id)
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        fields: WriteFields,
    ) -> Result<(), GatewayError> {
        self.ensure_online()?;
        let fields = fields.resolve(Utc::now())?;
        let mut collections = self.collections.write().await;
        let doc = collections
            .get_mut(&collection)
            .and_then(|docs| docs.iter_mut().find(|d| d.id == id))
            .ok_or_else(|| GatewayError::MissingDocument {
                collection,
                id: id.to_string(),
            })?;
        doc.fields.extend(fields);
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), GatewayError> {
        self.ensure_online()?;
        if let Some(docs) = self.collections.write().await.get_mut(&collection) {
            docs.retain(|d| d.id != id);
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
    fail_uploads: AtomicBool,
}

impl MemoryBlobStore {
    pub const URL_SCHEME: &'static str = "memory://";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub async fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.blobs.read().await.get(path).cloned()
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        _content_type: Option<&str>,
    ) -> Result<BlobHandle, GatewayError> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(GatewayError::Upload(format!("refused to store {path}")));
        }
        self.blobs.write().await.insert(path.to_string(), bytes);
        Ok(BlobHandle {
            path: path.to_string(),
            location: format!("{}{}", Self::URL_SCHEME, path),
        })
    }

    async fn retrievable_url(&self, handle: &BlobHandle) -> Result<String, GatewayError> {
        if self.blobs.read().await.contains_key(&handle.path) {
            Ok(handle.location.clone())
        } else {
            Err(GatewayError::Upload(format!("no blob at {}", handle.path)))
        }
    }
}

// Dev-only registry; passwords are kept as given.
#[derive(Debug, Clone)]
struct Account {
    uid: String,
    password: String,
}

#[derive(Default)]
pub struct MemoryAccounts {
    accounts: Arc<RwLock<HashMap<String, Account>>>,
}

impl MemoryAccounts {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityService for MemoryAccounts {
    fn connect(&self) -> Arc<dyn IdentityProvider> {
        Arc::new(MemoryIdentity {
            accounts: self.accounts.clone(),
            session: SessionChannel::new(),
        })
    }
}

pub struct MemoryIdentity {
    accounts: Arc<RwLock<HashMap<String, Account>>>,
    session: SessionChannel,
}

#[async_trait]
impl IdentityProvider for MemoryIdentity {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        let accounts = self.accounts.read().await;
        let account = accounts
            .get(email)
            .filter(|a| a.password == password)
            .ok_or(AuthError::InvalidCredentials)?;
        let user = AuthUser {
            uid: account.uid.clone(),
            email: email.to_string(),
        };
        drop(accounts);
        self.session.publish(Some(user.clone()));
        Ok(user)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        Credentials::new(email, password).check_new_account()?;

        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(email) {
            return Err(AuthError::EmailAlreadyInUse);
        }
        let uid = Uuid::new_v4().simple().to_string();
        accounts.insert(
            email.to_string(),
            Account {
                uid: uid.clone(),
                password: password.to_string(),
            },
        );
        drop(accounts);

        let user = AuthUser {
            uid,
            email: email.to_string(),
        };
        self.session.publish(Some(user.clone()));
        Ok(user)
    }

    async fn sign_out(&self) -> Result<(), GatewayError> {
        self.session.publish(None);
        Ok(())
    }

    fn subscribe(&self) -> SessionSubscription {
        self.session.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn add_then_list_returns_stamped_document() {
        let store = MemoryDocumentStore::new();
        let id = store
            .add(
                Collection::Listings,
                WriteFields::new()
                    .with("title", json!("Lamp"))
                    .with_server_timestamp("createdAt"),
            )
            .await
            .unwrap();

        let docs = store.list(Collection::Listings).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, id);
        assert!(docs[0].fields["createdAt"].is_string());
    }

    #[tokio::test]
    async fn update_merges_and_requires_existing_document() {
        let store = MemoryDocumentStore::new();
        store
            .set(Collection::Listings, "l1", json!({ "title": "Old", "price": "5" }))
            .await
            .unwrap();

        store
            .update(
                Collection::Listings,
                "l1",
                WriteFields::new().with("title", json!("New")),
            )
            .await
            .unwrap();
        let doc = store.get(Collection::Listings, "l1").await.unwrap().unwrap();
        assert_eq!(doc.fields["title"], json!("New"));
        assert_eq!(doc.fields["price"], json!("5"));

        let missing = store
            .update(Collection::Listings, "nope", WriteFields::new())
            .await;
        assert!(matches!(
            missing,
            Err(GatewayError::MissingDocument { .. })
        ));
    }

    #[tokio::test]
    async fn delete_of_missing_document_succeeds() {
        let store = MemoryDocumentStore::new();
        store.delete(Collection::Categories, "ghost").await.unwrap();
    }

    #[tokio::test]
    async fn offline_store_fails_every_call() {
        let store = MemoryDocumentStore::new();
        store.set_offline(true);
        assert!(matches!(
            store.list(Collection::Listings).await,
            Err(GatewayError::Unavailable(_))
        ));
        store.set_offline(false);
        assert!(store.list(Collection::Listings).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn blob_upload_and_url() {
        let blobs = MemoryBlobStore::new();
        let handle = blobs
            .upload("listings/u1/1-a.png", vec![1, 2, 3], Some("image/png"))
            .await
            .unwrap();
        assert_eq!(
            blobs.retrievable_url(&handle).await.unwrap(),
            "memory://listings/u1/1-a.png"
        );
        assert_eq!(blobs.get("listings/u1/1-a.png").await, Some(vec![1, 2, 3]));

        blobs.fail_uploads(true);
        assert!(blobs.upload("x", vec![], None).await.is_err());
    }

    #[tokio::test]
    async fn identities_share_accounts_but_not_sessions() {
        let accounts = MemoryAccounts::new();
        let first = accounts.connect();
        let second = accounts.connect();
        let mut second_events = second.subscribe();
        second_events.take_pending();

        let created = first.sign_up("ann@example.com", "secret1").await.unwrap();
        let signed_in = second.sign_in("ann@example.com", "secret1").await.unwrap();
        assert_eq!(created, signed_in);
        assert_eq!(second_events.take_pending(), Some(Some(signed_in)));

        first.sign_out().await.unwrap();
        assert_eq!(second_events.take_pending(), None);
    }

    #[tokio::test]
    async fn sign_in_rejections() {
        let accounts = MemoryAccounts::new();
        let identity = accounts.connect();
        identity.sign_up("ann@example.com", "secret1").await.unwrap();

        assert!(matches!(
            identity.sign_in("ann@example.com", "wrong").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            identity.sign_in("bob@example.com", "secret1").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            identity.sign_up("ann@example.com", "another1").await,
            Err(AuthError::EmailAlreadyInUse)
        ));
        assert!(matches!(
            identity.sign_up("carl@example.com", "123").await,
            Err(AuthError::WeakPassword(_))
        ));
    }
}
