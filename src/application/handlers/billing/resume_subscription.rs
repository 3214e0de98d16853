//! ResumeSubscriptionHandler - Clears the gateway pause-collection
//! attribute and re-derives local status.

use std::sync::Arc;

use crate::domain::billing::{BillingError, BillingStatus};
use crate::domain::foundation::UserId;
use crate::ports::{BillingGateway, GatewayErrorCode, PaymentRepository};

use super::ReconcileSubscriptionHandler;

/// Command to resume collection on a paused subscription.
#[derive(Debug, Clone)]
pub struct ResumeSubscriptionCommand {
    pub user_id: UserId,
    pub subscription_id: String,
}

/// Handler for resuming a subscription.
pub struct ResumeSubscriptionHandler {
    payments: Arc<dyn PaymentRepository>,
    gateway: Arc<dyn BillingGateway>,
}

impl ResumeSubscriptionHandler {
    pub fn new(payments: Arc<dyn PaymentRepository>, gateway: Arc<dyn BillingGateway>) -> Self {
        Self { payments, gateway }
    }

    pub async fn handle(
        &self,
        cmd: ResumeSubscriptionCommand,
    ) -> Result<BillingStatus, BillingError> {
        let record = self
            .payments
            .find_by_subscription_id(&cmd.subscription_id)
            .await?
            .ok_or(BillingError::not_found("Subscription"))?;

        if record.user_id != cmd.user_id {
            return Err(BillingError::Unauthorized);
        }

        self.gateway
            .resume_subscription(&cmd.subscription_id)
            .await
            .map_err(|e| match e.code {
                GatewayErrorCode::NotFound => BillingError::not_found("Subscription"),
                _ => e.into(),
            })?;

        // Status after resuming is whatever the gateway now reports, not
        // assumed active: re-derive through reconcile.
        let outcome = ReconcileSubscriptionHandler::new(
            self.payments.clone(),
            self.gateway.clone(),
        )
        .handle(&cmd.subscription_id)
        .await?;

        tracing::info!(
            user_id = %cmd.user_id,
            subscription_id = %cmd.subscription_id,
            status = %outcome.status(),
            "Subscription collection resumed"
        );

        Ok(outcome.status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryPaymentRepository;
    use crate::adapters::stripe::MockBillingGateway;
    use crate::domain::billing::PaymentRecord;
    use crate::ports::CreateSubscriptionRequest;

    async fn paused_fixture() -> (
        Arc<InMemoryPaymentRepository>,
        Arc<MockBillingGateway>,
        UserId,
        String,
    ) {
        let payments = Arc::new(InMemoryPaymentRepository::new());
        let gateway = Arc::new(MockBillingGateway::new());
        let user_id = UserId::new();

        let subscription = gateway
            .create_subscription(CreateSubscriptionRequest {
                customer_id: "cus_1".to_string(),
                price_id: "price_monthly".to_string(),
                default_payment_method_id: "pm_card".to_string(),
            })
            .await
            .unwrap();
        let paused = gateway.pause_subscription(&subscription.id).await.unwrap();

        let mut record = PaymentRecord::for_intent(
            user_id,
            "pi_1",
            Some("pm_card".to_string()),
            "cus_1",
            1999,
            "usd",
        );
        record.link_subscription(&paused.id);
        record.apply_observation(&paused.observation());
        payments.insert(record);

        (payments, gateway, user_id, paused.id)
    }

    #[tokio::test]
    async fn resume_re_derives_status_from_gateway() {
        let (payments, gateway, user_id, subscription_id) = paused_fixture().await;
        let handler = ResumeSubscriptionHandler::new(payments.clone(), gateway);

        let status = handler
            .handle(ResumeSubscriptionCommand {
                user_id,
                subscription_id: subscription_id.clone(),
            })
            .await
            .unwrap();

        assert_eq!(status, BillingStatus::Succeeded);
        let stored = payments
            .find_by_subscription_id(&subscription_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, BillingStatus::Succeeded);
    }

    #[tokio::test]
    async fn missing_record_is_not_found_signal() {
        let (payments, gateway, user_id, _) = paused_fixture().await;
        let handler = ResumeSubscriptionHandler::new(payments, gateway.clone());

        let result = handler
            .handle(ResumeSubscriptionCommand {
                user_id,
                subscription_id: "sub_ghost".to_string(),
            })
            .await;

        assert!(matches!(result, Err(BillingError::NotFound { .. })));
        assert_eq!(gateway.calls("resume_subscription"), 0);
    }

    #[tokio::test]
    async fn foreign_subscription_is_unauthorized() {
        let (payments, gateway, _, subscription_id) = paused_fixture().await;
        let handler = ResumeSubscriptionHandler::new(payments, gateway);

        let result = handler
            .handle(ResumeSubscriptionCommand {
                user_id: UserId::new(),
                subscription_id,
            })
            .await;

        assert!(matches!(result, Err(BillingError::Unauthorized)));
    }
}
