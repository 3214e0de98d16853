//! HandleGatewayWebhookHandler - Asynchronous status-push entry point.
//!
//! Verifies the signature, resolves the local record (by subscription ID,
//! falling back to the customer binding), and feeds the carried
//! observation into the same reconciliation path the synchronous flows
//! use. Unknown events are acknowledged and ignored.

use std::sync::Arc;

use crate::domain::billing::{
    BillingError, BillingStatus, GatewayIntentStatus, SubscriptionObservation,
};
use crate::ports::{
    BillingGateway, GatewayErrorCode, PaymentRepository, UserRepository, WebhookEventData,
};

use super::ReconcileSubscriptionHandler;

/// Result of processing one webhook delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The event updated (or deliberately retained) local state.
    Processed(BillingStatus),

    /// The event did not apply to any local record or is of an
    /// unhandled type; acknowledged so the gateway stops redelivering.
    Ignored,
}

/// Handler for inbound gateway webhooks.
pub struct HandleGatewayWebhookHandler {
    users: Arc<dyn UserRepository>,
    payments: Arc<dyn PaymentRepository>,
    gateway: Arc<dyn BillingGateway>,
}

impl HandleGatewayWebhookHandler {
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
        payload: &[u8],
        signature: &str,
    ) -> Result<WebhookOutcome, BillingError> {
        let event = self
            .gateway
            .verify_webhook(payload, signature)
            .await
            .map_err(|e| match e.code {
                GatewayErrorCode::InvalidWebhook => {
                    BillingError::validation("signature", e.message)
                }
                _ => e.into(),
            })?;

        tracing::debug!(
            event_id = %event.id,
            event_type = ?event.event_type,
            "Webhook received"
        );

        match event.data {
            WebhookEventData::Subscription {
                customer_id,
                observation,
            } => self.reconcile_subscription(&customer_id, observation).await,
            WebhookEventData::Intent {
                intent_id, status, ..
            } => self.apply_intent_push(&intent_id, status).await,
            WebhookEventData::Raw { .. } => {
                tracing::debug!(event_id = %event.id, "Ignoring unhandled webhook event");
                Ok(WebhookOutcome::Ignored)
            }
        }
    }

    async fn reconcile_subscription(
        &self,
        customer_id: &str,
        observation: SubscriptionObservation,
    ) -> Result<WebhookOutcome, BillingError> {
        // The record may predate subscription linkage when the creation
        // webhook beats the synchronous flow's persistence; link through
        // the customer binding in that case.
        if self
            .payments
            .find_by_subscription_id(&observation.subscription_id)
            .await?
            .is_none()
        {
            match self.link_via_customer(customer_id, &observation.subscription_id).await? {
                Some(()) => {}
                None => {
                    tracing::warn!(
                        subscription_id = %observation.subscription_id,
                        customer_id,
                        "Webhook for unknown subscription and customer; ignoring"
                    );
                    return Ok(WebhookOutcome::Ignored);
                }
            }
        }

        let outcome = ReconcileSubscriptionHandler::new(
            self.payments.clone(),
            self.gateway.clone(),
        )
        .apply(&observation)
        .await?;

        Ok(WebhookOutcome::Processed(outcome.status()))
    }

    async fn link_via_customer(
        &self,
        customer_id: &str,
        subscription_id: &str,
    ) -> Result<Option<()>, BillingError> {
        let Some(user) = self
            .users
            .find_by_gateway_customer_id(customer_id)
            .await?
        else {
            return Ok(None);
        };

        let Some(mut record) = self.payments.find_active_for_user(&user.id).await? else {
            return Ok(None);
        };

        if record.subscription_id.is_none() {
            record.link_subscription(subscription_id);
            self.payments.update(&record).await?;
            tracing::info!(
                user_id = %user.id,
                subscription_id,
                "Linked subscription from webhook before synchronous flow persisted it"
            );
            Ok(Some(()))
        } else {
            // The user's active record funds a different subscription.
            Ok(None)
        }
    }

    async fn apply_intent_push(
        &self,
        intent_id: &str,
        status: GatewayIntentStatus,
    ) -> Result<WebhookOutcome, BillingError> {
        let Some(mut record) = self.payments.find_by_intent_id(intent_id).await? else {
            tracing::warn!(intent_id, "Webhook for unknown payment intent; ignoring");
            return Ok(WebhookOutcome::Ignored);
        };

        // Intent pushes only matter before the record reaches a settled
        // or subscription-driven state.
        if record.status == BillingStatus::Succeeded || record.last_event_at.is_some() {
            return Ok(WebhookOutcome::Processed(record.status));
        }

        record.record_intent_status(status, None);
        self.payments.update(&record).await?;

        tracing::info!(
            intent_id,
            status = %record.status,
            "Applied intent status push"
        );

        Ok(WebhookOutcome::Processed(record.status))
    }
}
