// src/session.rs
//! Signed-in/out state and the admin flag derived from the allow-list.

use crate::gateway::{ADMINS_DOCUMENT, Collection, DocumentStore, GatewayError};
use crate::models::{AdminAllowList, AuthUser};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    SignedOut,
    SignedIn(AuthUser),
}

/// What rendering needs to know about the viewer. Passed by value/reference
/// to every render call; there is no global copy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    user: Option<AuthUser>,
    is_admin: bool,
}

impl SessionContext {
    pub fn signed_out() -> Self {
        Self::default()
    }

    /// `is_admin` only sticks when someone is signed in.
    pub fn new(user: Option<AuthUser>, is_admin: bool) -> Self {
        let is_admin = is_admin && user.is_some();
        Self { user, is_admin }
    }

    pub fn user(&self) -> Option<&AuthUser> {
        self.user.as_ref()
    }

    pub fn is_signed_in(&self) -> bool {
        self.user.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.is_admin
    }
}

/// Reads `meta/admins`; a missing document means nobody is an admin.
pub async fn fetch_admins(store: &dyn DocumentStore) -> Result<AdminAllowList, GatewayError> {
    match store.get(Collection::Meta, ADMINS_DOCUMENT).await? {
        Some(doc) => doc.decode(),
        None => {
            tracing::debug!("No admin allow-list document, treating as empty");
            Ok(AdminAllowList::default())
        }
    }
}

pub fn is_admin_email(admins: &AdminAllowList, user: Option<&AuthUser>) -> bool {
    user.is_some_and(|u| admins.contains(&u.email))
}

#[derive(Debug, Default)]
pub struct SessionGate {
    context: SessionContext,
}

impl SessionGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        match self.context.user() {
            Some(user) => SessionState::SignedIn(user.clone()),
            None => SessionState::SignedOut,
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// Applies a session-change notification.
    ///
    /// The new identity takes effect immediately without admin rights; the
    /// flag is granted only after a fresh allow-list read succeeds.
    pub async fn transition(
        &mut self,
        user: Option<AuthUser>,
        store: &dyn DocumentStore,
    ) -> Result<&SessionContext, GatewayError> {
        self.context = SessionContext::new(user.clone(), false);

        let admins = fetch_admins(store).await?;
        let is_admin = is_admin_email(&admins, user.as_ref());
        self.context = SessionContext::new(user, is_admin);

        match self.context.user() {
            Some(u) => tracing::info!("Session: signed in as {} (admin: {})", u.email, is_admin),
            None => tracing::info!("Session: signed out"),
        }
        Ok(&self.context)
    }
}
