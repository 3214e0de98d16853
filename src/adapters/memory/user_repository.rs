//! In-memory implementation of UserRepository.
//!
//! Backs tests and local development; state lives behind a single mutex.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, ErrorCode, UserId};
use crate::domain::user::User;
use crate::ports::UserRepository;

/// In-memory UserRepository.
#[derive(Default)]
pub struct InMemoryUserRepository {
    users: Mutex<HashMap<UserId, User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a user, bypassing uniqueness checks.
    pub fn insert(&self, user: User) {
        self.users.lock().unwrap().insert(user.id, user);
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: &User) -> Result<(), DomainError> {
        let mut users = self.users.lock().unwrap();
        if users.values().any(|u| u.email == user.email) {
            return Err(DomainError::validation("email", "Email already registered"));
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, DomainError> {
        Ok(self.users.lock().unwrap().get(id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DomainError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_by_gateway_customer_id(
        &self,
        customer_id: &str,
    ) -> Result<Option<User>, DomainError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.gateway_customer_id.as_deref() == Some(customer_id))
            .cloned())
    }

    async fn set_gateway_customer_id(
        &self,
        user_id: &UserId,
        customer_id: &str,
    ) -> Result<(), DomainError> {
        let mut users = self.users.lock().unwrap();
        match users.get_mut(user_id) {
            Some(user) => {
                user.bind_customer(customer_id);
                Ok(())
            }
            None => Err(DomainError::new(ErrorCode::UserNotFound, "User not found")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(email: &str) -> User {
        User::new(email, "hash", "Test", "User")
    }

    #[tokio::test]
    async fn create_rejects_duplicate_email() {
        let repo = InMemoryUserRepository::new();
        repo.create(&user("a@example.com")).await.unwrap();

        let result = repo.create(&user("a@example.com")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn set_gateway_customer_id_binds_user() {
        let repo = InMemoryUserRepository::new();
        let u = user("a@example.com");
        let id = u.id;
        repo.create(&u).await.unwrap();

        repo.set_gateway_customer_id(&id, "cus_1").await.unwrap();

        let found = repo.find_by_gateway_customer_id("cus_1").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(id));
    }

    #[tokio::test]
    async fn set_gateway_customer_id_errors_for_missing_user() {
        let repo = InMemoryUserRepository::new();
        let result = repo.set_gateway_customer_id(&UserId::new(), "cus_1").await;
        assert!(result.is_err());
    }
}
