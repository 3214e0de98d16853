//! ConfirmPaymentHandler - Payment intent lifecycle, confirmation side.
//!
//! Serves both the explicit confirm endpoint and the redirect callback
//! after out-of-band authentication. Re-confirming a settled intent is a
//! no-op returning the cached terminal outcome.

use std::sync::Arc;

use crate::domain::billing::{BillingError, BillingStatus, GatewayIntentStatus, IntentOutcome};
use crate::ports::{BillingGateway, PaymentRepository};

use super::create_payment_intent::outcome_from_intent;

/// Command to confirm (or re-check) a payment intent.
#[derive(Debug, Clone)]
pub struct ConfirmPaymentCommand {
    pub payment_intent_id: String,
    /// Supplied when the client wants to confirm with a specific method;
    /// absent on redirect callbacks, where we only re-read status.
    pub payment_method_id: Option<String>,
    pub return_url: Option<String>,
}

/// Handler for intent confirmation and the redirect callback.
pub struct ConfirmPaymentHandler {
    payments: Arc<dyn PaymentRepository>,
    gateway: Arc<dyn BillingGateway>,
}

impl ConfirmPaymentHandler {
    pub fn new(payments: Arc<dyn PaymentRepository>, gateway: Arc<dyn BillingGateway>) -> Self {
        Self { payments, gateway }
    }

    pub async fn handle(&self, cmd: ConfirmPaymentCommand) -> Result<IntentOutcome, BillingError> {
        let mut record = self
            .payments
            .find_by_intent_id(&cmd.payment_intent_id)
            .await?
            .ok_or(BillingError::not_found("Payment"))?;

        // Already settled: return the cached outcome without touching the
        // gateway. This is what makes repeated confirms charge-safe.
        if record.status == BillingStatus::Succeeded {
            return Ok(IntentOutcome::Succeeded {
                intent_id: record.payment_intent_id,
            });
        }

        // Read-confirm: re-query status first rather than blindly
        // re-submitting the confirmation.
        let intent = self
            .gateway
            .retrieve_payment_intent(&cmd.payment_intent_id)
            .await?
            .ok_or(BillingError::not_found("Payment"))?;

        let intent = match intent.status {
            // Terminal or action-pending at the gateway: take it as is.
            GatewayIntentStatus::Succeeded
            | GatewayIntentStatus::RequiresAction
            | GatewayIntentStatus::Canceled => intent,
            // Still confirmable and the caller supplied a method (or the
            // intent already has one): issue the confirm.
            _ => {
                self.gateway
                    .confirm_payment_intent(
                        &cmd.payment_intent_id,
                        cmd.payment_method_id.as_deref(),
                        cmd.return_url.as_deref(),
                    )
                    .await?
            }
        };

        let outcome = outcome_from_intent(&intent)?;
        record.record_outcome(&outcome);
        self.payments.update(&record).await?;

        tracing::info!(
            intent_id = %cmd.payment_intent_id,
            status = %record.status,
            "Payment intent confirmation reconciled"
        );

        Ok(outcome)
    }
}
