//! PauseSubscriptionHandler - Sets the gateway pause-collection attribute.

use std::sync::Arc;

use crate::domain::billing::{BillingError, BillingStatus};
use crate::domain::foundation::UserId;
use crate::ports::{BillingGateway, GatewayErrorCode, PaymentRepository};

use super::ReconcileSubscriptionHandler;

/// Command to pause collection on a subscription.
#[derive(Debug, Clone)]
pub struct PauseSubscriptionCommand {
    pub user_id: UserId,
    pub subscription_id: String,
}

/// Handler for pausing a subscription.
pub struct PauseSubscriptionHandler {
    payments: Arc<dyn PaymentRepository>,
    gateway: Arc<dyn BillingGateway>,
}

impl PauseSubscriptionHandler {
    pub fn new(payments: Arc<dyn PaymentRepository>, gateway: Arc<dyn BillingGateway>) -> Self {
        Self { payments, gateway }
    }

    pub async fn handle(
        &self,
        cmd: PauseSubscriptionCommand,
    ) -> Result<BillingStatus, BillingError> {
        let record = self
            .payments
            .find_by_subscription_id(&cmd.subscription_id)
            .await?
            .ok_or(BillingError::not_found("Subscription"))?;

        if record.user_id != cmd.user_id {
            return Err(BillingError::Unauthorized);
        }

        let subscription = self
            .gateway
            .pause_subscription(&cmd.subscription_id)
            .await
            .map_err(|e| match e.code {
                GatewayErrorCode::NotFound => BillingError::not_found("Subscription"),
                _ => e.into(),
            })?;

        let outcome = ReconcileSubscriptionHandler::new(
            self.payments.clone(),
            self.gateway.clone(),
        )
        .apply(&subscription.observation())
        .await?;

        tracing::info!(
            user_id = %cmd.user_id,
            subscription_id = %cmd.subscription_id,
            status = %outcome.status(),
            "Subscription collection paused"
        );

        Ok(outcome.status())
    }
}
