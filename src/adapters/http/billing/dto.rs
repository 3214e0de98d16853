//! HTTP DTOs for the billing endpoints.
//!
//! Every response uses the uniform envelope
//! `{status: bool, message: string, data?: object, error?: string}`.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::domain::billing::{BillingStatus, IntentOutcome, SubscriptionOutcome};

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Request to create and confirm a payment intent.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePaymentIntentRequest {
    /// Gateway payment method ID to charge.
    pub payment_method: String,
    /// Amount in the currency's minor unit.
    pub amount: i64,
    /// ISO currency code; defaults to the configured currency.
    #[serde(default)]
    pub currency: Option<String>,
}

/// Request to create a subscription.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscribeRequest {
    /// Gateway price ID; defaults to the configured subscription price.
    #[serde(default)]
    pub price_id: Option<String>,
}

/// Request to re-reconcile a subscription after out-of-band confirmation.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmSubscriptionRequest {
    pub subscription_id: String,
}

/// Request to pause or resume collection.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionActionRequest {
    pub subscription_id: String,
}

/// Query parameters of the redirect callback endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfirmationQuery {
    pub payment_intent: String,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response Envelope
// ════════════════════════════════════════════════════════════════════════════════

/// The uniform response envelope.
#[derive(Debug, Clone, Serialize)]
pub struct ApiEnvelope {
    /// Whether the request succeeded.
    pub status: bool,

    /// Human-readable summary.
    pub message: String,

    /// Operation payload, when any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    /// Machine-readable error code, on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiEnvelope {
    /// Successful response with payload.
    pub fn ok(message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            status: true,
            message: message.into(),
            data: Some(data),
            error: None,
        }
    }

    /// Successful response without payload.
    pub fn ok_empty(message: impl Into<String>) -> Self {
        Self {
            status: true,
            message: message.into(),
            data: None,
            error: None,
        }
    }

    /// Failed response.
    pub fn failure(message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            status: false,
            message: message.into(),
            data: None,
            error: Some(error.into()),
        }
    }

    /// Suspended response for requires-action outcomes; still carries
    /// `status: true` because the flow is on track, just paused.
    pub fn action_required(message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            status: true,
            message: message.into(),
            data: Some(data),
            error: None,
        }
    }
}

/// Payload for an intent outcome.
pub fn intent_outcome_data(outcome: &IntentOutcome) -> serde_json::Value {
    match outcome {
        IntentOutcome::Succeeded { intent_id } => json!({
            "payment_intent_id": intent_id,
            "status": BillingStatus::Succeeded,
        }),
        IntentOutcome::RequiresAction {
            intent_id,
            client_secret,
            redirect_url,
        } => json!({
            "payment_intent_id": intent_id,
            "status": BillingStatus::RequiresAction,
            "client_secret": client_secret,
            "redirect_url": redirect_url,
        }),
        IntentOutcome::Failed { intent_id, reason } => json!({
            "payment_intent_id": intent_id,
            "status": BillingStatus::Failed,
            "reason": reason,
        }),
    }
}

/// Payload for a subscription outcome.
pub fn subscription_outcome_data(outcome: &SubscriptionOutcome) -> serde_json::Value {
    match outcome {
        SubscriptionOutcome::Active { subscription_id } => json!({
            "subscription_id": subscription_id,
            "status": BillingStatus::Succeeded,
        }),
        SubscriptionOutcome::RequiresAction {
            subscription_id,
            client_secret,
            redirect_url,
        } => json!({
            "subscription_id": subscription_id,
            "status": BillingStatus::RequiresAction,
            "client_secret": client_secret,
            "redirect_url": redirect_url,
        }),
        SubscriptionOutcome::Incomplete {
            subscription_id,
            status,
        } => json!({
            "subscription_id": subscription_id,
            "status": status,
        }),
    }
}
