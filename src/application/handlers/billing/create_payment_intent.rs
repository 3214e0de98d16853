//! CreateAndConfirmIntentHandler - Payment intent lifecycle, creation side.
//!
//! Attaches the payment method, makes it the customer default, creates the
//! intent with explicit confirmation, and persists the outcome before
//! returning, so a crash after the gateway call cannot lose the intent.

use std::sync::Arc;

use crate::domain::billing::{BillingError, GatewayIntentStatus, IntentOutcome, PaymentRecord};
use crate::domain::foundation::{UserId, ValidationError};
use crate::ports::{
    BillingGateway, CreateIntentRequest, GatewayErrorCode, IntentResult, PaymentRepository,
    UserRepository,
};

use super::EnsureCustomerHandler;

/// Command to create and confirm a one-time payment intent.
#[derive(Debug, Clone)]
pub struct CreateIntentCommand {
    pub user_id: UserId,
    pub payment_method_id: String,
    pub amount_cents: i64,
    pub currency: String,
    /// Where the gateway should send the cardholder back after
    /// out-of-band authentication.
    pub return_url: Option<String>,
}

/// Handler for the create-and-confirm intent flow.
pub struct CreateAndConfirmIntentHandler {
    users: Arc<dyn UserRepository>,
    payments: Arc<dyn PaymentRepository>,
    gateway: Arc<dyn BillingGateway>,
}

impl CreateAndConfirmIntentHandler {
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

    pub async fn handle(&self, cmd: CreateIntentCommand) -> Result<IntentOutcome, BillingError> {
        validate(&cmd)?;

        // 1. Bind the user to a gateway customer (idempotent).
        let customer_id =
            EnsureCustomerHandler::new(self.users.clone(), self.gateway.clone())
                .handle(&cmd.user_id)
                .await?;

        // 2. Attach the payment method. Attachment failures are terminal,
        //    never retried.
        self.gateway
            .attach_payment_method(&cmd.payment_method_id, &customer_id)
            .await
            .map_err(|e| match e.code {
                GatewayErrorCode::NetworkError | GatewayErrorCode::Timeout => e.into(),
                _ => BillingError::invalid_payment_method(e.message),
            })?;

        // 3. Make it the default for future invoices.
        self.gateway
            .set_default_payment_method(&customer_id, &cmd.payment_method_id)
            .await?;

        // 4. Create the intent with explicit confirmation.
        let intent = self
            .gateway
            .create_payment_intent(CreateIntentRequest {
                customer_id: customer_id.clone(),
                payment_method_id: cmd.payment_method_id.clone(),
                amount_cents: cmd.amount_cents,
                currency: cmd.currency.clone(),
                return_url: cmd.return_url.clone(),
            })
            .await?;

        let outcome = outcome_from_intent(&intent)?;

        // 5. Persist the outcome before returning.
        let mut record = PaymentRecord::for_intent(
            cmd.user_id,
            intent.id.clone(),
            Some(cmd.payment_method_id),
            customer_id,
            cmd.amount_cents,
            cmd.currency,
        );
        record.record_outcome(&outcome);
        self.payments.upsert_active(&record).await?;

        tracing::info!(
            user_id = %cmd.user_id,
            intent_id = %intent.id,
            status = %record.status,
            "Payment intent created"
        );

        Ok(outcome)
    }
}

fn validate(cmd: &CreateIntentCommand) -> Result<(), BillingError> {
    if cmd.payment_method_id.is_empty() {
        return Err(ValidationError::empty_field("payment_method").into());
    }
    if cmd.amount_cents < 1 {
        return Err(ValidationError::below_minimum("amount", 1, cmd.amount_cents).into());
    }
    if cmd.currency.len() != 3 || !cmd.currency.bytes().all(|b| b.is_ascii_lowercase()) {
        return Err(ValidationError::invalid_format(
            "currency",
            "expected a lowercase ISO code like 'usd'",
        )
        .into());
    }
    Ok(())
}

/// Maps a confirmed intent into the discriminated outcome.
///
/// Statuses the synchronous confirm flow cannot settle (declines, stale
/// confirmation states) collapse into `Failed` with the gateway's reason.
pub(crate) fn outcome_from_intent(intent: &IntentResult) -> Result<IntentOutcome, BillingError> {
    match intent.status {
        GatewayIntentStatus::Succeeded => Ok(IntentOutcome::Succeeded {
            intent_id: intent.id.clone(),
        }),
        GatewayIntentStatus::RequiresAction => {
            let client_secret = intent.client_secret.clone().ok_or_else(|| {
                BillingError::gateway("Intent requires action but carried no client secret")
            })?;
            Ok(IntentOutcome::RequiresAction {
                intent_id: intent.id.clone(),
                client_secret,
                redirect_url: intent.redirect_url.clone(),
            })
        }
        _ => Ok(IntentOutcome::Failed {
            intent_id: intent.id.clone(),
            reason: intent
                .decline_reason
                .clone()
                .unwrap_or_else(|| "payment did not complete".to_string()),
        }),
    }
}
