//! Authentication configuration

use serde::Deserialize;

use super::error::ValidationError;

/// Authentication configuration (JWT verification)
///
/// Token issuance is handled by the external auth service; this system
/// only verifies inbound bearer tokens.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret shared with the token issuer
    #[serde(default)]
    pub jwt_secret: String,
}

impl AuthConfig {
    /// Validate authentication configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.jwt_secret.is_empty() {
            return Err(ValidationError::MissingRequired("JWT_SECRET"));
        }
        if self.jwt_secret.len() < 32 {
            return Err(ValidationError::JwtSecretTooShort);
        }
        Ok(())
    }
}
