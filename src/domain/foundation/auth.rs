//! Credential handed to the notification client by the host application.
//!
//! The client never mints or refreshes tokens. It receives an opaque bearer
//! token from the authenticated API client and attaches it to the transport
//! handshake. The subject is needed to scope per-user channels; when the
//! caller does not supply it, it is read from the token's `sub` claim
//! without verifying the signature (the server verifies on handshake).

use std::fmt;

use jsonwebtoken::{decode, DecodingKey, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use super::{UserId, ValidationError};

/// Bearer token plus the identity it authenticates.
#[derive(Clone)]
pub struct Credential {
    token: SecretString,
    subject: UserId,
    fingerprint: CredentialFingerprint,
}

impl Credential {
    /// Creates a credential with an explicit subject.
    pub fn new(token: impl Into<String>, subject: UserId) -> Result<Self, ValidationError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(ValidationError::empty_field("token"));
        }
        let fingerprint = CredentialFingerprint::of(&token, &subject);
        Ok(Self {
            token: SecretString::new(token),
            subject,
            fingerprint,
        })
    }

    /// Creates a credential from a JWT, taking the subject from its `sub` claim.
    pub fn from_bearer(token: impl Into<String>) -> Result<Self, ValidationError> {
        let token = token.into();
        let subject = subject_claim(&token)?;
        Self::new(token, subject)
    }

    /// The authenticated subject used to scope channels.
    pub fn subject(&self) -> &UserId {
        &self.subject
    }

    /// Stable, non-reversible identity of the token and its subject.
    ///
    /// Equal fingerprints mean equal credentials.
    pub fn fingerprint(&self) -> &CredentialFingerprint {
        &self.fingerprint
    }

    /// Raw token for transport headers. Never log this.
    pub fn expose_token(&self) -> &str {
        self.token.expose_secret()
    }

    /// `Authorization` header value.
    pub fn bearer_header(&self) -> String {
        format!("Bearer {}", self.token.expose_secret())
    }
}

impl PartialEq for Credential {
    fn eq(&self, other: &Self) -> bool {
        self.fingerprint == other.fingerprint
    }
}

impl Eq for Credential {}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("subject", &self.subject)
            .field("fingerprint", &self.fingerprint)
            .finish_non_exhaustive()
    }
}

/// SHA-256 over subject and token, hex encoded.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CredentialFingerprint(String);

impl CredentialFingerprint {
    fn of(token: &str, subject: &UserId) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(subject.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(token.as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Full hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CredentialFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CredentialFingerprint({})", self)
    }
}

impl fmt::Display for CredentialFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.0[..12])
    }
}

#[derive(Debug, Deserialize)]
struct SubjectClaims {
    sub: String,
}

fn subject_claim(token: &str) -> Result<UserId, ValidationError> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data = decode::<SubjectClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map_err(|e| ValidationError::invalid_format("token", e.to_string()))?;
    UserId::new(data.claims.sub)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;

    #[derive(Serialize)]
    struct Claims<'a> {
        sub: &'a str,
        exp: u64,
    }

    fn jwt_for(sub: &str) -> String {
        encode(
            &Header::default(),
            &Claims { sub, exp: 1 },
            &EncodingKey::from_secret(b"server-side-secret"),
        )
        .unwrap()
    }

    #[test]
    fn from_bearer_reads_subject_claim() {
        let credential = Credential::from_bearer(jwt_for("analyst-7")).unwrap();
        assert_eq!(credential.subject().as_str(), "analyst-7");
    }

    #[test]
    fn from_bearer_rejects_opaque_token() {
        assert!(Credential::from_bearer("not-a-jwt").is_err());
    }

    #[test]
    fn new_rejects_blank_token() {
        let subject = UserId::new("u1").unwrap();
        assert!(Credential::new("  ", subject).is_err());
    }

    #[test]
    fn same_token_yields_equal_credentials() {
        let a = Credential::new("tok", UserId::new("u1").unwrap()).unwrap();
        let b = Credential::new("tok", UserId::new("u1").unwrap()).unwrap();
        let c = Credential::new("other", UserId::new("u1").unwrap()).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn same_token_for_other_subject_is_a_different_credential() {
        let a = Credential::new("tok", UserId::new("u1").unwrap()).unwrap();
        let b = Credential::new("tok", UserId::new("u2").unwrap()).unwrap();
        assert_ne!(a, b);
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn debug_output_hides_token() {
        let credential = Credential::new("super-secret-token", UserId::new("u1").unwrap()).unwrap();
        let debug = format!("{:?}", credential);
        assert!(!debug.contains("super-secret-token"));
        assert!(debug.contains("u1"));
    }

    #[test]
    fn bearer_header_prefixes_token() {
        let credential = Credential::new("abc", UserId::new("u1").unwrap()).unwrap();
        assert_eq!(credential.bearer_header(), "Bearer abc");
    }
}
