//! JWT verification for authenticated endpoints.
//!
//! Token issuance lives outside this system; requests arrive with a
//! bearer token whose subject is the local user id.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::domain::foundation::UserId;

/// Claims this system reads from an access token.
#[derive(Debug, Clone, Deserialize)]
pub struct Claims {
    /// Subject: the local user id.
    pub sub: String,

    /// Expiry (Unix seconds); validated by the library.
    #[allow(dead_code)]
    pub exp: usize,
}

/// Errors from token verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Missing or malformed Authorization header.
    MissingToken,
    /// Signature/expiry validation failed.
    InvalidToken,
    /// Subject is not a valid user id.
    InvalidSubject,
}

/// Verifies bearer tokens against the configured HMAC secret.
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    /// Creates a verifier for HS256 tokens signed with `secret`.
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Verifies a bearer token and extracts the user id.
    pub fn verify(&self, token: &str) -> Result<UserId, AuthError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|_| AuthError::InvalidToken)?;

        data.claims
            .sub
            .parse::<UserId>()
            .map_err(|_| AuthError::InvalidSubject)
    }

    /// Extracts and verifies the token from an Authorization header value.
    pub fn verify_header(&self, header: Option<&str>) -> Result<UserId, AuthError> {
        let token = header
            .and_then(|h| h.strip_prefix("Bearer "))
            .ok_or(AuthError::MissingToken)?;
        self.verify(token)
    }
}
