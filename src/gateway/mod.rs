// src/gateway/mod.rs
//! Contract with the managed backend: identity, document collections and
//! blob storage. Everything the front end persists goes through these traits.

pub mod cloudinary;
pub mod memory;
pub mod postgres;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use sqlx::postgres::PgPoolOptions;
use strum::{AsRefStr, Display, EnumString};
use thiserror::Error;
use tokio::sync::watch;

use crate::auth::AuthError;
use crate::config::{AppConfig, BackendKind};
use crate::models::AuthUser;

/// Id of the admin allow-list document inside [`Collection::Meta`].
pub const ADMINS_DOCUMENT: &str = "admins";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum Collection {
    Categories,
    Listings,
    Meta,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed document: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("fields must be a JSON object, got: {0}")]
    InvalidFields(String),

    #[error("document {collection}/{id} does not exist")]
    MissingDocument { collection: Collection, id: String },

    #[error("upload rejected: {0}")]
    Upload(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// A stored document: opaque id plus its top-level fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Deserializes the fields with the document id available under `"id"`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, GatewayError> {
        let mut fields = self.fields.clone();
        fields.insert("id".to_string(), Value::String(self.id.clone()));
        Ok(serde_json::from_value(Value::Object(fields))?)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Value(Value),
    /// Replaced by the store's clock when the write is applied.
    ServerTimestamp,
}

/// Field set for `add`/`update`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteFields(BTreeMap<String, FieldValue>);

impl WriteFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_serializable<T: Serialize>(value: &T) -> Result<Self, GatewayError> {
        match serde_json::to_value(value)? {
            Value::Object(map) => Ok(Self(
                map.into_iter()
                    .map(|(k, v)| (k, FieldValue::Value(v)))
                    .collect(),
            )),
            other => Err(GatewayError::InvalidFields(other.to_string())),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.0.insert(key.into(), FieldValue::Value(value));
        self
    }

    pub fn with_server_timestamp(mut self, key: impl Into<String>) -> Self {
        self.0.insert(key.into(), FieldValue::ServerTimestamp);
        self
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.0.get(key)
    }

    /// Materializes the fields, stamping sentinels with `now`.
    pub fn resolve(self, now: DateTime<Utc>) -> Result<Map<String, Value>, GatewayError> {
        let stamp = serde_json::to_value(now)?;
        Ok(self
            .0
            .into_iter()
            .map(|(k, v)| match v {
                FieldValue::Value(value) => (k, value),
                FieldValue::ServerTimestamp => (k, stamp.clone()),
            })
            .collect())
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn list(&self, collection: Collection) -> Result<Vec<Document>, GatewayError>;

    async fn get(&self, collection: Collection, id: &str)
    -> Result<Option<Document>, GatewayError>;

    async fn add(&self, collection: Collection, fields: WriteFields) -> Result<String, GatewayError>;

    /// Merges `fields` into an existing document. Fails if it does not exist.
    async fn update(
        &self,
        collection: Collection,
        id: &str,
        fields: WriteFields,
    ) -> Result<(), GatewayError>;

    /// Deleting a missing document is not an error.
    async fn delete(&self, collection: Collection, id: &str) -> Result<(), GatewayError>;
}

/// Reference to an uploaded blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobHandle {
    pub path: String,
    pub location: String,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<BlobHandle, GatewayError>;

    async fn retrievable_url(&self, handle: &BlobHandle) -> Result<String, GatewayError>;
}

/// Identity session of a single client.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, AuthError>;

    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthUser, AuthError>;

    async fn sign_out(&self) -> Result<(), GatewayError>;

    /// Session-change notifications, starting with the current state.
    fn subscribe(&self) -> SessionSubscription;
}

/// Hands out a fresh, signed-out identity session per client.
pub trait IdentityService: Send + Sync {
    fn connect(&self) -> Arc<dyn IdentityProvider>;
}

/// Publishing side of session-change notifications, shared by the adapters.
#[derive(Debug)]
pub struct SessionChannel {
    tx: watch::Sender<Option<AuthUser>>,
}

impl SessionChannel {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    pub fn current(&self) -> Option<AuthUser> {
        self.tx.borrow().clone()
    }

    /// Notifies subscribers if the session actually changed.
    pub fn publish(&self, user: Option<AuthUser>) {
        self.tx.send_if_modified(move |current| {
            if *current == user {
                false
            } else {
                *current = user;
                true
            }
        });
    }

    pub fn subscribe(&self) -> SessionSubscription {
        let mut rx = self.tx.subscribe();
        rx.mark_changed();
        SessionSubscription { rx }
    }
}

impl Default for SessionChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving side; dropping it unsubscribes.
#[derive(Debug)]
pub struct SessionSubscription {
    rx: watch::Receiver<Option<AuthUser>>,
}

impl SessionSubscription {
    /// Takes the notification pushed since the last call, if any.
    pub fn take_pending(&mut self) -> Option<Option<AuthUser>> {
        match self.rx.has_changed() {
            Ok(true) => Some(self.rx.borrow_and_update().clone()),
            _ => None,
        }
    }
}

/// The three backend services, shared by every client.
#[derive(Clone)]
pub struct Gateway {
    pub documents: Arc<dyn DocumentStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub identities: Arc<dyn IdentityService>,
}

impl Gateway {
    /// Builds the configured backend.
    pub async fn connect(config: &AppConfig) -> Result<Self, GatewayError> {
        let blobs: Arc<dyn BlobStore> = match &config.cloudinary {
            Some(cloudinary) => {
                tracing::info!("Blob storage: Cloudinary ({})", cloudinary.cloud_name);
                Arc::new(cloudinary::CloudinaryBlobStore::new(cloudinary.clone()))
            }
            None => {
                tracing::warn!("Cloudinary not configured, keeping uploads in memory");
                Arc::new(memory::MemoryBlobStore::new())
            }
        };

        match config.backend {
            BackendKind::Memory => {
                let backend = memory::MemoryBackend::new();
                if !config.admin_emails.is_empty() {
                    backend
                        .documents
                        .set(
                            Collection::Meta,
                            ADMINS_DOCUMENT,
                            serde_json::json!({ "emails": config.admin_emails }),
                        )
                        .await?;
                }
                tracing::info!("Document store: in-memory");
                Ok(Self {
                    documents: backend.documents.clone(),
                    blobs,
                    identities: backend.accounts.clone(),
                })
            }
            BackendKind::Postgres => {
                let database_url = config.database_url.as_deref().ok_or_else(|| {
                    GatewayError::Unavailable("DATABASE_URL is not set".to_string())
                })?;
                let pool = PgPoolOptions::new()
                    .max_connections(5)
                    .connect(database_url)
                    .await?;
                postgres::ensure_schema(&pool).await?;
                tracing::info!("Document store: PostgreSQL");
                Ok(Self {
                    documents: Arc::new(postgres::PgDocumentStore::new(pool.clone())),
                    blobs,
                    identities: Arc::new(postgres::PgAccounts::new(pool)),
                })
            }
        }
    }
}
