//! EnsureCustomerHandler - Idempotent customer binding.
//!
//! Ensures each local user has exactly one live gateway customer record,
//! creating one lazily on first payment interaction and self-healing when
//! the stored ID no longer resolves.

use std::sync::Arc;

use crate::domain::billing::BillingError;
use crate::domain::foundation::UserId;
use crate::ports::{BillingGateway, CreateCustomerRequest, UserRepository};

/// Handler for binding a user to a gateway customer.
pub struct EnsureCustomerHandler {
    users: Arc<dyn UserRepository>,
    gateway: Arc<dyn BillingGateway>,
}

impl EnsureCustomerHandler {
    pub fn new(users: Arc<dyn UserRepository>, gateway: Arc<dyn BillingGateway>) -> Self {
        Self { users, gateway }
    }

    /// Returns the gateway customer ID for the user, creating and
    /// persisting one only when the stored ID is absent or stale.
    ///
    /// The user record is written exactly once per rebinding event and
    /// never written when gateway creation fails.
    pub async fn handle(&self, user_id: &UserId) -> Result<String, BillingError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(BillingError::not_found("User"))?;

        if let Some(customer_id) = &user.gateway_customer_id {
            if self.gateway.retrieve_customer(customer_id).await?.is_some() {
                return Ok(customer_id.clone());
            }
            tracing::warn!(
                user_id = %user_id,
                stale_customer_id = %customer_id,
                "Stored gateway customer no longer resolves; rebinding"
            );
        }

        let customer = self
            .gateway
            .create_customer(CreateCustomerRequest {
                user_id: user.id,
                email: user.email.clone(),
                name: Some(user.display_name()),
            })
            .await?;

        self.users
            .set_gateway_customer_id(user_id, &customer.id)
            .await?;

        tracing::info!(
            user_id = %user_id,
            customer_id = %customer.id,
            "Bound user to gateway customer"
        );

        Ok(customer.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryUserRepository;
    use crate::adapters::stripe::MockBillingGateway;
    use crate::domain::user::User;
    use crate::ports::GatewayError;

    fn setup() -> (Arc<InMemoryUserRepository>, Arc<MockBillingGateway>, UserId) {
        let users = Arc::new(InMemoryUserRepository::new());
        let gateway = Arc::new(MockBillingGateway::new());
        let user = User::new("voter@example.com", "hash", "Vera", "Voter");
        let user_id = user.id;
        users.insert(user);
        (users, gateway, user_id)
    }

    #[tokio::test]
    async fn first_call_creates_and_binds_customer() {
        let (users, gateway, user_id) = setup();
        let handler = EnsureCustomerHandler::new(users.clone(), gateway.clone());

        let customer_id = handler.handle(&user_id).await.unwrap();

        assert_eq!(gateway.calls("create_customer"), 1);
        let stored = users.find_by_id(&user_id).await.unwrap().unwrap();
        assert_eq!(stored.gateway_customer_id, Some(customer_id));
    }

    #[tokio::test]
    async fn second_call_is_idempotent() {
        let (users, gateway, user_id) = setup();
        let handler = EnsureCustomerHandler::new(users, gateway.clone());

        let first = handler.handle(&user_id).await.unwrap();
        let second = handler.handle(&user_id).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(gateway.calls("create_customer"), 1);
    }

    #[tokio::test]
    async fn stale_binding_self_heals() {
        let (users, gateway, user_id) = setup();
        let handler = EnsureCustomerHandler::new(users.clone(), gateway.clone());

        let first = handler.handle(&user_id).await.unwrap();
        gateway.delete_customer(&first);

        let second = handler.handle(&user_id).await.unwrap();

        assert_ne!(first, second);
        assert_eq!(gateway.calls("create_customer"), 2);
        let stored = users.find_by_id(&user_id).await.unwrap().unwrap();
        assert_eq!(stored.gateway_customer_id, Some(second));
    }

    #[tokio::test]
    async fn gateway_failure_leaves_user_unbound() {
        let (users, gateway, user_id) = setup();
        gateway.fail_method("create_customer", GatewayError::provider("down"));
        let handler = EnsureCustomerHandler::new(users.clone(), gateway);

        let result = handler.handle(&user_id).await;

        assert!(matches!(result, Err(BillingError::Gateway { .. })));
        let stored = users.find_by_id(&user_id).await.unwrap().unwrap();
        assert!(stored.gateway_customer_id.is_none());
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let (users, gateway, _) = setup();
        let handler = EnsureCustomerHandler::new(users, gateway);

        let result = handler.handle(&UserId::new()).await;
        assert!(matches!(
            result,
            Err(BillingError::NotFound { resource: "User" })
        ));
    }
}
