//! CreateSubscriptionHandler - Subscription creation and initial
//! reconciliation.
//!
//! Requires a prior payment-intent run to have left a payment method on
//! file; creates the subscription in allow-incomplete mode and persists
//! the mapped status through the same reconciliation path webhooks use.

use std::sync::Arc;

use crate::domain::billing::{BillingError, BillingStatus, SubscriptionOutcome};
use crate::domain::foundation::{UserId, ValidationError};
use crate::ports::{
    BillingGateway, CreateSubscriptionRequest, PaymentRepository, UserRepository,
};

use super::EnsureCustomerHandler;

/// Command to create a subscription for a user.
#[derive(Debug, Clone)]
pub struct CreateSubscriptionCommand {
    pub user_id: UserId,
    pub price_id: String,
}

/// Handler for subscription creation.
pub struct CreateSubscriptionHandler {
    users: Arc<dyn UserRepository>,
    payments: Arc<dyn PaymentRepository>,
    gateway: Arc<dyn BillingGateway>,
}

impl CreateSubscriptionHandler {
    pub fn new(
        users: Arc<dyn UserRepository>,
        payments: Arc<dyn PaymentRepository>,
        gateway: Arc<dyn BillingGateway>,
    ) -> Self {
        Self {
            users,
            payments,
            gateway,
        }
    }

    pub async fn handle(
        &self,
        cmd: CreateSubscriptionCommand,
    ) -> Result<SubscriptionOutcome, BillingError> {
        if cmd.price_id.is_empty() {
            return Err(ValidationError::empty_field("price_id").into());
        }

        // 1. Precondition: a payment method must already be on file.
        //    Checked before any gateway call.
        let mut record = self
            .payments
            .find_active_for_user(&cmd.user_id)
            .await?
            .ok_or(BillingError::MissingPaymentMethod)?;
        let payment_method_id = record
            .payment_method_id
            .clone()
            .filter(|pm| !pm.is_empty())
            .ok_or(BillingError::MissingPaymentMethod)?;

        // 2. Bind the user to a gateway customer (idempotent).
        let customer_id =
            EnsureCustomerHandler::new(self.users.clone(), self.gateway.clone())
                .handle(&cmd.user_id)
                .await?;

        // 3. Create in allow-incomplete mode: the call returns even when
        //    the first invoice still needs action.
        let subscription = self
            .gateway
            .create_subscription(CreateSubscriptionRequest {
                customer_id,
                price_id: cmd.price_id,
                default_payment_method_id: payment_method_id,
            })
            .await?;

        // 4. Persist linkage and the mapped status through the same
        //    observation path webhooks use.
        let observation = subscription.observation();
        record.link_subscription(&subscription.id);
        record.apply_observation(&observation);
        self.payments.update(&record).await?;

        tracing::info!(
            user_id = %cmd.user_id,
            subscription_id = %subscription.id,
            status = %record.status,
            "Subscription created"
        );

        Ok(match record.status {
            BillingStatus::Succeeded => SubscriptionOutcome::Active {
                subscription_id: subscription.id,
            },
            BillingStatus::RequiresAction => SubscriptionOutcome::RequiresAction {
                subscription_id: subscription.id,
                client_secret: observation.client_secret,
                redirect_url: observation.redirect_url,
            },
            status => SubscriptionOutcome::Incomplete {
                subscription_id: subscription.id,
                status,
            },
        })
    }
}
