//! User repository port.
//!
//! Persistence contract for the identity record. Customer binding is the
//! only writer of `gateway_customer_id`.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, UserId};
use crate::domain::user::User;

/// Repository port for User persistence.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Persist a new user.
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` if the email is already taken
    /// - `DatabaseError` on persistence failure
    async fn create(&self, user: &User) -> Result<(), DomainError>;

    /// Find a user by ID. Returns `None` if not found.
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, DomainError>;

    /// Find a user by email. Returns `None` if not found.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DomainError>;

    /// Find the user bound to a gateway customer ID.
    ///
    /// Used by the webhook path to resolve the owning user.
    async fn find_by_gateway_customer_id(
        &self,
        customer_id: &str,
    ) -> Result<Option<User>, DomainError>;

    /// Persist a (re)binding of the user to a gateway customer.
    ///
    /// Exactly one write per rebinding event; the caller only invokes this
    /// after the gateway customer was fully created.
    async fn set_gateway_customer_id(
        &self,
        user_id: &UserId,
        customer_id: &str,
    ) -> Result<(), DomainError>;
}
