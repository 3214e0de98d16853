//! ReconcileSubscriptionHandler - Converges local status with the gateway.
//!
//! Invoked synchronously after creation/pause/resume and asynchronously
//! from webhook pushes. All paths funnel into the same event-time
//! compare-and-set, so they converge regardless of arrival order.

use std::sync::Arc;

use crate::domain::billing::{BillingError, BillingStatus, SubscriptionObservation};
use crate::domain::foundation::ErrorCode;
use crate::ports::{BillingGateway, PaymentRepository};

/// Result of applying one reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The observation superseded the stored state.
    Applied(BillingStatus),

    /// The observation was stale or the gateway unreadable; the stored
    /// status was retained.
    Retained(BillingStatus),
}

impl ReconcileOutcome {
    /// The local status after the pass.
    pub fn status(&self) -> BillingStatus {
        match self {
            ReconcileOutcome::Applied(status) | ReconcileOutcome::Retained(status) => *status,
        }
    }
}

/// Handler for subscription reconciliation.
pub struct ReconcileSubscriptionHandler {
    payments: Arc<dyn PaymentRepository>,
    gateway: Arc<dyn BillingGateway>,
}

impl ReconcileSubscriptionHandler {
    pub fn new(payments: Arc<dyn PaymentRepository>, gateway: Arc<dyn BillingGateway>) -> Self {
        Self { payments, gateway }
    }

    /// Re-reads the subscription from the gateway and applies the result.
    ///
    /// Gateway read failures never regress a known-good status: they are
    /// logged and the stored status is returned unchanged.
    pub async fn handle(&self, subscription_id: &str) -> Result<ReconcileOutcome, BillingError> {
        let record = self
            .payments
            .find_by_subscription_id(subscription_id)
            .await?
            .ok_or(BillingError::not_found("Subscription"))?;

        let observation = match self.gateway.retrieve_subscription(subscription_id).await {
            Ok(Some(subscription)) => subscription.observation(),
            Ok(None) => {
                tracing::warn!(
                    subscription_id,
                    "Subscription missing at gateway; retaining local status"
                );
                return Ok(ReconcileOutcome::Retained(record.status));
            }
            Err(err) => {
                tracing::warn!(
                    subscription_id,
                    error = %err,
                    "Gateway read failed during reconciliation; retaining local status"
                );
                return Ok(ReconcileOutcome::Retained(record.status));
            }
        };

        self.apply(&observation).await
    }

    /// Applies an observation through the event-time compare-and-set.
    ///
    /// Used directly by the webhook path, which already carries the
    /// observed state and must not issue a redundant gateway read.
    pub async fn apply(
        &self,
        observation: &SubscriptionObservation,
    ) -> Result<ReconcileOutcome, BillingError> {
        let status = observation.local_status();
        let applied = self
            .payments
            .apply_status_if_newer(
                &observation.subscription_id,
                status,
                observation.client_secret.as_deref(),
                observation.observed_at,
            )
            .await
            .map_err(|err| {
                if err.code == ErrorCode::PaymentNotFound {
                    BillingError::not_found("Subscription")
                } else {
                    err.into()
                }
            })?;

        if applied {
            tracing::info!(
                subscription_id = %observation.subscription_id,
                status = %status,
                event_time = %observation.observed_at,
                "Reconciled subscription status"
            );
            Ok(ReconcileOutcome::Applied(status))
        } else {
            let stored = self
                .payments
                .find_by_subscription_id(&observation.subscription_id)
                .await?
                .map(|r| r.status)
                .unwrap_or(status);
            tracing::debug!(
                subscription_id = %observation.subscription_id,
                discarded_status = %status,
                "Discarded stale reconciliation event"
            );
            Ok(ReconcileOutcome::Retained(stored))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryPaymentRepository;
    use crate::adapters::stripe::MockBillingGateway;
    use crate::domain::billing::{GatewaySubscriptionStatus, PaymentRecord};
    use crate::domain::foundation::{Timestamp, UserId};
    use crate::ports::{GatewayError, SubscriptionResult};

    fn linked_record() -> PaymentRecord {
        let mut record = PaymentRecord::for_intent(
            UserId::new(),
            "pi_1",
            Some("pm_card".to_string()),
            "cus_1",
            1999,
            "usd",
        );
        record.link_subscription("sub_1");
        record
    }

    fn subscription(status: GatewaySubscriptionStatus, at: i64) -> SubscriptionResult {
        SubscriptionResult {
            id: "sub_1".to_string(),
            customer_id: "cus_1".to_string(),
            status,
            pause_collection: false,
            latest_invoice_id: None,
            latest_intent_status: None,
            client_secret: None,
            redirect_url: None,
            event_time: Timestamp::from_unix_secs(at),
        }
    }

    fn observation(status: GatewaySubscriptionStatus, at: i64) -> SubscriptionObservation {
        subscription(status, at).observation()
    }

    #[tokio::test]
    async fn handle_reads_gateway_and_applies() {
        let payments = Arc::new(InMemoryPaymentRepository::new());
        let gateway = Arc::new(MockBillingGateway::new());
        payments.insert(linked_record());
        gateway.insert_subscription(subscription(GatewaySubscriptionStatus::Active, 10));

        let handler = ReconcileSubscriptionHandler::new(payments.clone(), gateway);
        let outcome = handler.handle("sub_1").await.unwrap();

        assert_eq!(outcome, ReconcileOutcome::Applied(BillingStatus::Succeeded));
        let stored = payments.find_by_subscription_id("sub_1").await.unwrap().unwrap();
        assert_eq!(stored.status, BillingStatus::Succeeded);
    }

    #[tokio::test]
    async fn gateway_failure_retains_previous_status() {
        let payments = Arc::new(InMemoryPaymentRepository::new());
        let gateway = Arc::new(MockBillingGateway::new());
        let mut record = linked_record();
        record.apply_observation(&observation(GatewaySubscriptionStatus::Active, 5));
        payments.insert(record);
        gateway.fail_method("retrieve_subscription", GatewayError::network("reset"));

        let handler = ReconcileSubscriptionHandler::new(payments.clone(), gateway);
        let outcome = handler.handle("sub_1").await.unwrap();

        assert_eq!(outcome, ReconcileOutcome::Retained(BillingStatus::Succeeded));
    }

    #[tokio::test]
    async fn missing_local_record_is_not_found() {
        let payments = Arc::new(InMemoryPaymentRepository::new());
        let gateway = Arc::new(MockBillingGateway::new());

        let handler = ReconcileSubscriptionHandler::new(payments, gateway);
        let result = handler.handle("sub_ghost").await;

        assert!(matches!(result, Err(BillingError::NotFound { .. })));
    }

    #[tokio::test]
    async fn out_of_order_events_converge_to_newest() {
        let payments = Arc::new(InMemoryPaymentRepository::new());
        let gateway = Arc::new(MockBillingGateway::new());
        payments.insert(linked_record());

        let handler = ReconcileSubscriptionHandler::new(payments.clone(), gateway);

        // Newer event first.
        let newer = handler
            .apply(&observation(GatewaySubscriptionStatus::Active, 2))
            .await
            .unwrap();
        assert_eq!(newer, ReconcileOutcome::Applied(BillingStatus::Succeeded));

        // Older event arrives late and is discarded.
        let older = handler
            .apply(&observation(GatewaySubscriptionStatus::Incomplete, 1))
            .await
            .unwrap();
        assert_eq!(older, ReconcileOutcome::Retained(BillingStatus::Succeeded));

        let stored = payments.find_by_subscription_id("sub_1").await.unwrap().unwrap();
        assert_eq!(stored.status, BillingStatus::Succeeded);
        assert_eq!(stored.last_event_at, Some(Timestamp::from_unix_secs(2)));
    }

    #[tokio::test]
    async fn duplicate_event_is_retained_not_reapplied() {
        let payments = Arc::new(InMemoryPaymentRepository::new());
        let gateway = Arc::new(MockBillingGateway::new());
        payments.insert(linked_record());

        let handler = ReconcileSubscriptionHandler::new(payments, gateway);
        let event = observation(GatewaySubscriptionStatus::Active, 3);

        assert_eq!(
            handler.apply(&event).await.unwrap(),
            ReconcileOutcome::Applied(BillingStatus::Succeeded)
        );
        assert_eq!(
            handler.apply(&event).await.unwrap(),
            ReconcileOutcome::Retained(BillingStatus::Succeeded)
        );
    }

    #[tokio::test]
    async fn apply_for_unknown_subscription_is_not_found() {
        let payments = Arc::new(InMemoryPaymentRepository::new());
        let gateway = Arc::new(MockBillingGateway::new());

        let handler = ReconcileSubscriptionHandler::new(payments, gateway);
        let result = handler
            .apply(&observation(GatewaySubscriptionStatus::Active, 1))
            .await;

        assert!(matches!(result, Err(BillingError::NotFound { .. })));
    }
}
