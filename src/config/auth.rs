//! Credential configuration for the headless listener

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::ValidationError;
use crate::domain::foundation::{Credential, UserId};

/// Bearer token the listener connects with
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuthConfig {
    /// Bearer token (JWT). Never logged.
    pub token: Option<SecretString>,

    /// Subject override; read from the token's `sub` claim when absent
    pub subject: Option<String>,
}

impl AuthConfig {
    /// Build the credential
    pub fn credential(&self) -> Result<Credential, ValidationError> {
        let token = self
            .token
            .as_ref()
            .map(|t| t.expose_secret().to_string())
            .filter(|t| !t.trim().is_empty())
            .ok_or(ValidationError::MissingRequired("AUTH__TOKEN"))?;

        let credential = match &self.subject {
            Some(subject) => UserId::new(subject.clone())
                .and_then(|subject| Credential::new(token, subject)),
            None => Credential::from_bearer(token),
        };
        credential.map_err(|e| ValidationError::InvalidToken(e.to_string()))
    }

    /// Validate authentication configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.credential().map(|_| ())
    }
}
