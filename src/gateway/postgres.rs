// src/gateway/postgres.rs
//! Document collections and accounts kept in PostgreSQL.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    Collection, Document, DocumentStore, GatewayError, IdentityProvider, IdentityService,
    SessionChannel, SessionSubscription, WriteFields,
};
use crate::auth::{AuthError, hash_password, verify_password};
use crate::auth_models::Credentials;
use crate::models::AuthUser;

pub async fn ensure_schema(pool: &PgPool) -> Result<(), GatewayError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            collection  TEXT        NOT NULL,
            id          TEXT        NOT NULL,
            fields      JSONB       NOT NULL,
            inserted_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            PRIMARY KEY (collection, id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS accounts (
            uid           UUID        PRIMARY KEY,
            email         TEXT        NOT NULL UNIQUE,
            password_hash TEXT        NOT NULL,
            created_at    TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

fn into_object(value: Value) -> Result<Map<String, Value>, GatewayError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(GatewayError::InvalidFields(other.to_string())),
    }
}

#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn list(&self, collection: Collection) -> Result<Vec<Document>, GatewayError> {
        let rows = sqlx::query_as::<_, (String, Value)>(
            r#"
            SELECT id, fields
            FROM documents
            WHERE collection = $1
            ORDER BY inserted_at ASC, id ASC
            "#,
        )
        .bind(collection.as_ref())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, fields)| Ok::<_, GatewayError>(Document::new(id, into_object(fields)?)))
            .collect()
    }

    async fn get(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<Document>, GatewayError> {
        let row = sqlx::query_as::<_, (String, Value)>(
            "SELECT id, fields FROM documents WHERE collection = $1 AND id = $2",
        )
        .bind(collection.as_ref())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(id, fields)| Ok::<_, GatewayError>(Document::new(id, into_object(fields)?)))
            .transpose()
    }

    async fn add(&self, collection: Collection, fields: WriteFields) -> Result<String, GatewayError> {
        let id = Uuid::new_v4().simple().to_string();
        let fields = fields.resolve(Utc::now())?;

        sqlx::query("INSERT INTO documents (collection, id, fields) VALUES ($1, $2, $3)")
            .bind(collection.as_ref())
            .bind(&id)
            .bind(Value::Object(fields))
            .execute(&self.pool)
            .await?;

        tracing::debug!("Added document {}/{}", collection, id);
        Ok(id)
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        fields: WriteFields,
    ) -> Result<(), GatewayError> {
        let fields = fields.resolve(Utc::now())?;

        // `||` merges top-level keys, matching the store's update semantics.
        let result = sqlx::query(
            "UPDATE documents SET fields = fields || $3 WHERE collection = $1 AND id = $2",
        )
        .bind(collection.as_ref())
        .bind(id)
        .bind(Value::Object(fields))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(GatewayError::MissingDocument {
                collection,
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), GatewayError> {
        sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection.as_ref())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct PgAccounts {
    pool: PgPool,
}

impl PgAccounts {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl IdentityService for PgAccounts {
    fn connect(&self) -> Arc<dyn IdentityProvider> {
        Arc::new(PgIdentity {
            pool: self.pool.clone(),
            session: SessionChannel::new(),
        })
    }
}

pub struct PgIdentity {
    pool: PgPool,
    session: SessionChannel,
}

#[async_trait]
impl IdentityProvider for PgIdentity {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        let row = sqlx::query_as::<_, (Uuid, String)>(
            "SELECT uid, password_hash FROM accounts WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(GatewayError::from)?;

        let Some((uid, password_hash)) = row else {
            tracing::warn!("Sign-in rejected: no account for {}", email);
            return Err(AuthError::InvalidCredentials);
        };
        if !verify_password(&password_hash, password)? {
            tracing::warn!("Sign-in rejected: wrong password for {}", email);
            return Err(AuthError::InvalidCredentials);
        }

        let user = AuthUser {
            uid: uid.simple().to_string(),
            email: email.to_string(),
        };
        self.session.publish(Some(user.clone()));
        Ok(user)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        Credentials::new(email, password).check_new_account()?;

        let uid = Uuid::new_v4();
        let password_hash = hash_password(password)?;
        let inserted = sqlx::query(
            "INSERT INTO accounts (uid, email, password_hash) VALUES ($1, $2, $3)",
        )
        .bind(uid)
        .bind(email)
        .bind(password_hash)
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => {}
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                return Err(AuthError::EmailAlreadyInUse);
            }
            Err(e) => return Err(GatewayError::from(e).into()),
        }

        let user = AuthUser {
            uid: uid.simple().to_string(),
            email: email.to_string(),
        };
        tracing::info!("Created account {}", email);
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
