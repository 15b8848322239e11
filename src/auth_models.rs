// src/auth_models.rs
use serde::Deserialize;
use strum::Display;
use validator::Validate;

use crate::auth::AuthError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum AuthMode {
    Login,
    Register,
}

impl AuthMode {
    pub fn hint(&self) -> &'static str {
        match self {
            AuthMode::Login => "Need an account? Click Register on the top bar.",
            AuthMode::Register => "Already have an account? Click Login on the top bar.",
        }
    }
}

/// Body of the auth dialog submit.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthPayload {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Validate)]
pub struct Credentials {
    #[validate(email(message = "The email address is badly formatted."))]
    pub email: String,

    #[validate(length(min = 6, message = "Password should be at least 6 characters."))]
    pub password: String,
}

impl Credentials {
    pub fn new(email: &str, password: &str) -> Self {
        Self {
            email: email.trim().to_string(),
            password: password.to_string(),
        }
    }

    /// Local checks run before an account is created.
    pub fn check_new_account(&self) -> Result<(), AuthError> {
        let Err(errors) = self.validate() else {
            return Ok(());
        };
        let field_errors = errors.field_errors();
        let message_for = |field: &str| {
            field_errors
                .get(field)
                .and_then(|errs| errs.first())
                .and_then(|e| e.message.as_ref())
                .map(|m| m.to_string())
        };

        if let Some(message) = message_for("email") {
            return Err(AuthError::InvalidEmail(message));
        }
        Err(AuthError::WeakPassword(
            message_for("password").unwrap_or_else(|| "Password is too weak.".to_string()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_reasonable_credentials() {
        assert!(
            Credentials::new(" ann@example.com ", "secret1")
                .check_new_account()
                .is_ok()
        );
    }

    #[test]
    fn email_problems_win_over_password_problems() {
        let err = Credentials::new("ann", "1").check_new_account().unwrap_err();
        assert!(matches!(err, AuthError::InvalidEmail(_)));
        assert_eq!(err.to_string(), "The email address is badly formatted.");
    }

    #[test]
    fn short_password_is_weak() {
        let err = Credentials::new("ann@example.com", "12345")
            .check_new_account()
            .unwrap_err();
        assert_eq!(err.to_string(), "Password should be at least 6 characters.");
    }

    #[test]
    fn mode_titles() {
        assert_eq!(AuthMode::Login.to_string(), "Login");
        assert_eq!(AuthMode::Register.to_string(), "Register");
    }
}
