// src/auth.rs
use argon2::Argon2;
use argon2::password_hash::{
    PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng,
};
use thiserror::Error;

use crate::gateway::GatewayError;

/// Rejections from the identity provider. Shown as-is in the auth dialog.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid email or password.")]
    InvalidCredentials,

    #[error("This email is already registered.")]
    EmailAlreadyInUse,

    #[error("{0}")]
    WeakPassword(String),

    #[error("{0}")]
    InvalidEmail(String),

    #[error("Could not process the password.")]
    PasswordHashing,

    #[error("Authentication service error: {0}")]
    Gateway(#[from] GatewayError),
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| {
            tracing::error!("Password hashing failed: {}", e);
            AuthError::PasswordHashing
        })?
        .to_string();

    Ok(password_hash)
}

pub fn verify_password(hashed_password: &str, password: &str) -> Result<bool, AuthError> {
    let parsed_hash = PasswordHash::new(hashed_password).map_err(|e| {
        tracing::error!("Stored password hash is unreadable: {}", e);
        AuthError::PasswordHashing
    })?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert_ne!(hash, "correct horse");
        assert!(verify_password(&hash, "correct horse").unwrap());
        assert!(!verify_password(&hash, "battery staple").unwrap());
    }

    #[test]
    fn garbage_hash_is_an_error() {
        assert!(matches!(
            verify_password("not-a-phc-string", "x"),
            Err(AuthError::PasswordHashing)
        ));
    }
}
