//! Billing gateway port for external payment processing.
//!
//! Defines the contract for the payment gateway integration (e.g. Stripe).
//! Implementations handle the HTTP round-trips; the core only ever sees
//! the typed result structs defined here.
//!
//! # Design
//!
//! - **Gateway agnostic**: the trait works with any processor exposing
//!   customer / payment-method / intent / subscription primitives
//! - **Typed boundary**: every operation returns an explicit result
//!   struct populated by the adapter; no untyped JSON crosses the port
//! - **No automatic retry**: financial mutations are never retried by
//!   implementations; callers decide deliberately

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::billing::{
    BillingError, GatewayIntentStatus, GatewaySubscriptionStatus, SubscriptionObservation,
};
use crate::domain::foundation::{Timestamp, UserId};

/// Port for the external billing gateway.
///
/// Every call is a blocking network round-trip: potentially slow, always
/// fallible. Implementations apply a request-level timeout.
#[async_trait]
pub trait BillingGateway: Send + Sync {
    /// Create a customer in the payment system.
    async fn create_customer(
        &self,
        request: CreateCustomerRequest,
    ) -> Result<CustomerResult, GatewayError>;

    /// Retrieve a customer by gateway ID.
    ///
    /// Returns `None` when the ID does not resolve (missing or deleted).
    async fn retrieve_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<CustomerResult>, GatewayError>;

    /// Attach a payment method to a customer. Idempotent at the gateway.
    async fn attach_payment_method(
        &self,
        payment_method_id: &str,
        customer_id: &str,
    ) -> Result<(), GatewayError>;

    /// Set the customer's default payment method for invoices.
    async fn set_default_payment_method(
        &self,
        customer_id: &str,
        payment_method_id: &str,
    ) -> Result<(), GatewayError>;

    /// Create a payment intent with explicit confirmation.
    async fn create_payment_intent(
        &self,
        request: CreateIntentRequest,
    ) -> Result<IntentResult, GatewayError>;

    /// Retrieve a payment intent by gateway ID.
    async fn retrieve_payment_intent(
        &self,
        intent_id: &str,
    ) -> Result<Option<IntentResult>, GatewayError>;

    /// Confirm a previously created payment intent.
    async fn confirm_payment_intent(
        &self,
        intent_id: &str,
        payment_method_id: Option<&str>,
        return_url: Option<&str>,
    ) -> Result<IntentResult, GatewayError>;

    /// Create a subscription in allow-incomplete mode.
    async fn create_subscription(
        &self,
        request: CreateSubscriptionRequest,
    ) -> Result<SubscriptionResult, GatewayError>;

    /// Retrieve a subscription by gateway ID.
    async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<SubscriptionResult>, GatewayError>;

    /// Set the pause-collection attribute on a subscription.
    async fn pause_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<SubscriptionResult, GatewayError>;

    /// Clear the pause-collection attribute on a subscription.
    async fn resume_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<SubscriptionResult, GatewayError>;

    /// Retrieve an invoice by gateway ID.
    async fn retrieve_invoice(
        &self,
        invoice_id: &str,
    ) -> Result<Option<InvoiceResult>, GatewayError>;

    /// Verify a webhook signature and parse the event.
    async fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<WebhookEvent, GatewayError>;
}

/// Request to create a customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCustomerRequest {
    /// Internal user ID (stored as gateway metadata).
    pub user_id: UserId,

    /// Customer email address.
    pub email: String,

    /// Display name (optional).
    pub name: Option<String>,
}

/// Customer in the payment system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerResult {
    /// Gateway customer ID.
    pub id: String,

    /// Customer email.
    pub email: Option<String>,

    /// Customer name.
    pub name: Option<String>,

    /// When the customer was created (gateway timestamp, Unix seconds).
    pub created_at: i64,
}

/// Request to create-and-confirm a payment intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateIntentRequest {
    /// Gateway customer ID.
    pub customer_id: String,

    /// Payment method to charge.
    pub payment_method_id: String,

    /// Amount in the currency's minor unit.
    pub amount_cents: i64,

    /// ISO currency code, lowercase.
    pub currency: String,

    /// Return URL for out-of-band authentication redirects.
    pub return_url: Option<String>,
}

/// Payment intent state after a gateway round-trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentResult {
    /// Gateway intent ID.
    pub id: String,

    /// Current intent status.
    pub status: GatewayIntentStatus,

    /// Client secret, present while the intent is open.
    pub client_secret: Option<String>,

    /// Redirect URL when authentication is required.
    pub redirect_url: Option<String>,

    /// Decline reason for failed charges.
    pub decline_reason: Option<String>,

    /// Amount in minor units.
    pub amount_cents: i64,

    /// ISO currency code.
    pub currency: String,
}

/// Request to create a subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSubscriptionRequest {
    /// Gateway customer ID.
    pub customer_id: String,

    /// Gateway price ID for the recurring plan.
    pub price_id: String,

    /// Payment method to invoice against.
    pub default_payment_method_id: String,
}

/// Subscription state after a gateway round-trip.
///
/// Carries everything the reconciliation mapping needs, including the
/// first invoice's intent when the gateway expanded it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionResult {
    /// Gateway subscription ID.
    pub id: String,

    /// Gateway customer ID.
    pub customer_id: String,

    /// The subscription's own status.
    pub status: GatewaySubscriptionStatus,

    /// Whether a pause-collection attribute is present.
    pub pause_collection: bool,

    /// First/latest invoice ID, when present.
    pub latest_invoice_id: Option<String>,

    /// Status of the latest invoice's payment intent, when expanded.
    pub latest_intent_status: Option<GatewayIntentStatus>,

    /// Client secret of that intent, when further action is needed.
    pub client_secret: Option<String>,

    /// Redirect URL for out-of-band authentication, when provided.
    pub redirect_url: Option<String>,

    /// Gateway-side event/update time. Ordering key for reconciliation.
    pub event_time: Timestamp,
}

impl SubscriptionResult {
    /// Converts this result into a reconciliation observation.
    pub fn observation(&self) -> SubscriptionObservation {
        SubscriptionObservation {
            subscription_id: self.id.clone(),
            status: self.status,
            pause_collection: self.pause_collection,
            latest_intent_status: self.latest_intent_status,
            client_secret: self.client_secret.clone(),
            redirect_url: self.redirect_url.clone(),
            observed_at: self.event_time,
        }
    }
}

/// Invoice state after a gateway round-trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceResult {
    /// Gateway invoice ID.
    pub id: String,

    /// Gateway customer ID.
    pub customer_id: String,

    /// Subscription the invoice belongs to, when any.
    pub subscription_id: Option<String>,

    /// Payment intent collecting the invoice, when any.
    pub payment_intent_id: Option<String>,

    /// Amount due in minor units.
    pub amount_due_cents: i64,

    /// ISO currency code.
    pub currency: String,
}

/// Webhook event from the billing gateway, signature-verified and typed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Event ID from the gateway.
    pub id: String,

    /// Event type.
    pub event_type: WebhookEventType,

    /// Event payload.
    pub data: WebhookEventData,

    /// When the event occurred at the gateway.
    pub created_at: Timestamp,
}

/// Webhook event types this system reacts to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEventType {
    SubscriptionCreated,
    SubscriptionUpdated,
    SubscriptionDeleted,
    IntentSucceeded,
    IntentFailed,
    Unknown(String),
}

/// Webhook event payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WebhookEventData {
    /// A subscription status push.
    Subscription {
        customer_id: String,
        observation: SubscriptionObservation,
    },

    /// A payment intent status push.
    Intent {
        intent_id: String,
        status: GatewayIntentStatus,
        customer_id: Option<String>,
    },

    /// Unhandled event payload, kept for the audit log.
    Raw { json: String },
}

/// Errors from gateway operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayError {
    /// Error code for categorization.
    pub code: GatewayErrorCode,

    /// Human-readable message.
    pub message: String,

    /// Provider's error code (if available).
    pub provider_code: Option<String>,

    /// Whether the operation can be retried.
    pub retryable: bool,
}

impl GatewayError {
    /// Create a new gateway error.
    pub fn new(code: GatewayErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider_code: None,
            retryable: code.is_retryable(),
        }
    }

    /// Attach the provider's own error code.
    pub fn with_provider_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::NetworkError, message)
    }

    /// Create a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::Timeout, message)
    }

    /// Create a not found error.
    pub fn not_found(resource: &str) -> Self {
        Self::new(GatewayErrorCode::NotFound, format!("{} not found", resource))
    }

    /// Create an invalid webhook error.
    pub fn invalid_webhook(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::InvalidWebhook, message)
    }

    /// Create a provider-side API error.
    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::ProviderError, message)
    }
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for GatewayError {}

impl From<GatewayError> for BillingError {
    fn from(err: GatewayError) -> Self {
        BillingError::Gateway {
            provider_code: err.provider_code,
            message: err.message,
            retryable: err.retryable,
        }
    }
}

/// Gateway error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayErrorCode {
    /// Network connectivity issue.
    NetworkError,

    /// Request timed out; state at the gateway is unknown.
    Timeout,

    /// API authentication failed.
    AuthenticationError,

    /// Card was declined.
    CardDeclined,

    /// Payment method invalid or unattachable.
    InvalidPaymentMethod,

    /// Resource not found.
    NotFound,

    /// Rate limit exceeded.
    RateLimitExceeded,

    /// Invalid webhook signature.
    InvalidWebhook,

    /// Provider API error.
    ProviderError,

    /// Unknown error.
    Unknown,
}

impl GatewayErrorCode {
    /// Check if this error type is typically retryable.
    ///
    /// Timeouts are deliberately NOT retryable for financial mutations:
    /// the charge may have gone through. Callers re-query instead.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayErrorCode::NetworkError | GatewayErrorCode::RateLimitExceeded
        )
    }
}

impl std::fmt::Display for GatewayErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            GatewayErrorCode::NetworkError => "network_error",
            GatewayErrorCode::Timeout => "timeout",
            GatewayErrorCode::AuthenticationError => "authentication_error",
            GatewayErrorCode::CardDeclined => "card_declined",
            GatewayErrorCode::InvalidPaymentMethod => "invalid_payment_method",
            GatewayErrorCode::NotFound => "not_found",
            GatewayErrorCode::RateLimitExceeded => "rate_limit_exceeded",
            GatewayErrorCode::InvalidWebhook => "invalid_webhook",
            GatewayErrorCode::ProviderError => "provider_error",
            GatewayErrorCode::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Trait object safety test
    #[test]
    fn billing_gateway_is_object_safe() {
        fn _accepts_dyn(_gateway: &dyn BillingGateway) {}
    }

    #[test]
    fn gateway_error_retryable() {
        assert!(GatewayErrorCode::NetworkError.is_retryable());
        assert!(GatewayErrorCode::RateLimitExceeded.is_retryable());

        assert!(!GatewayErrorCode::Timeout.is_retryable());
        assert!(!GatewayErrorCode::CardDeclined.is_retryable());
        assert!(!GatewayErrorCode::NotFound.is_retryable());
    }

    #[test]
    fn gateway_error_display() {
        let err = GatewayError::new(GatewayErrorCode::CardDeclined, "Your card was declined");
        assert!(err.to_string().contains("card_declined"));
        assert!(err.to_string().contains("Your card was declined"));
    }

    #[test]
    fn gateway_error_converts_to_billing_error() {
        let err = GatewayError::provider("boom").with_provider_code("api_error");
        let billing: BillingError = err.into();
        assert!(matches!(
            billing,
            BillingError::Gateway { ref provider_code, .. }
                if provider_code.as_deref() == Some("api_error")
        ));
    }

    #[test]
    fn subscription_result_observation_carries_event_time() {
        let result = SubscriptionResult {
            id: "sub_1".to_string(),
            customer_id: "cus_1".to_string(),
            status: GatewaySubscriptionStatus::Active,
            pause_collection: false,
            latest_invoice_id: None,
            latest_intent_status: None,
            client_secret: None,
            redirect_url: None,
            event_time: Timestamp::from_unix_secs(42),
        };

        let obs = result.observation();
        assert_eq!(obs.subscription_id, "sub_1");
        assert_eq!(obs.observed_at, Timestamp::from_unix_secs(42));
    }
}
