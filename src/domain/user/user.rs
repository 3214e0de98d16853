//! User aggregate - identity record.

use crate::domain::foundation::{Timestamp, UserId};

/// A registered user.
///
/// Created at registration; `gateway_customer_id` is written only by
/// customer binding, exactly once per (re)binding event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub country: Option<String>,
    pub city: Option<String>,
    pub zip_code: Option<String>,
    pub address: Option<String>,
    pub is_approved: bool,
    pub is_admin: bool,
    /// Gateway customer ID once bound; None until first payment interaction.
    pub gateway_customer_id: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl User {
    /// Creates a new unapproved, non-admin user.
    pub fn new(
        email: impl Into<String>,
        password_hash: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        let now = Timestamp::now();
        Self {
            id: UserId::new(),
            email: email.into(),
            password_hash: password_hash.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            country: None,
            city: None,
            zip_code: None,
            address: None,
            is_approved: false,
            is_admin: false,
            gateway_customer_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Display name sent to the gateway when creating a customer.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// Binds (or rebinds) this user to a gateway customer.
    pub fn bind_customer(&mut self, customer_id: impl Into<String>) {
        self.gateway_customer_id = Some(customer_id.into());
        self.updated_at = Timestamp::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_user_is_unbound() {
        let user = User::new("a@example.com", "hash", "Ada", "Lovelace");
        assert!(user.gateway_customer_id.is_none());
        assert!(!user.is_approved);
        assert!(!user.is_admin);
    }

    #[test]
    fn display_name_joins_first_and_last() {
        let user = User::new("a@example.com", "hash", "Ada", "Lovelace");
        assert_eq!(user.display_name(), "Ada Lovelace");
    }

    #[test]
    fn bind_customer_overwrites_stale_id() {
        let mut user = User::new("a@example.com", "hash", "Ada", "Lovelace");
        user.bind_customer("cus_old");
        user.bind_customer("cus_new");
        assert_eq!(user.gateway_customer_id.as_deref(), Some("cus_new"));
    }
}
