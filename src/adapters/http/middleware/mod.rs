//! HTTP middleware.

mod auth;

pub use auth::{AuthError, Claims, JwtVerifier};
