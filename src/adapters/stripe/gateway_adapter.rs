//! Stripe billing gateway adapter.
//!
//! Implements the `BillingGateway` trait against the Stripe HTTP API.
//! Handles customer binding primitives, payment intents, subscriptions,
//! and webhook verification.
//!
//! # Security
//!
//! - HMAC-SHA256 signature verification with constant-time comparison
//! - Timestamp validation (5-minute window) for replay attack prevention
//! - Secrets handled via `secrecy::SecretString`
//!
//! # Reliability
//!
//! - Every request carries a timeout; timeouts are NOT retried for
//!   mutating calls (the charge may have gone through)
//! - Non-2xx responses are mapped to `GatewayError` with the provider's
//!   error code preserved

use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::domain::billing::{GatewayIntentStatus, GatewaySubscriptionStatus};
use crate::domain::foundation::Timestamp;
use crate::ports::{
    BillingGateway, CreateCustomerRequest, CreateIntentRequest, CreateSubscriptionRequest,
    CustomerResult, GatewayError, GatewayErrorCode, IntentResult, InvoiceResult,
    SubscriptionResult, WebhookEvent, WebhookEventData, WebhookEventType,
};

use super::webhook_types::{
    hex_encode, SignatureHeader, StripeCustomer, StripeInvoice, StripePaymentIntent,
    StripeSubscription, StripeWebhookEvent,
};

type HmacSha256 = Hmac<Sha256>;

/// Maximum age for webhook events (5 minutes).
const MAX_TIMESTAMP_AGE_SECS: i64 = 300;

/// Clock skew tolerance for future timestamps (60 seconds).
const MAX_FUTURE_TOLERANCE_SECS: i64 = 60;

/// Default per-request timeout.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeGatewayConfig {
    /// Stripe secret API key (sk_live_... or sk_test_...).
    api_key: SecretString,

    /// Webhook signing secret (whsec_...).
    webhook_secret: SecretString,

    /// Base URL for the Stripe API (default: https://api.stripe.com).
    api_base_url: String,

    /// Per-request timeout.
    request_timeout: Duration,

    /// Whether to require livemode events in production.
    require_livemode: bool,
}

impl StripeGatewayConfig {
    /// Create a new Stripe configuration.
    pub fn new(api_key: impl Into<String>, webhook_secret: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            webhook_secret: SecretString::new(webhook_secret.into()),
            api_base_url: "https://api.stripe.com".to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            require_livemode: false,
        }
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Set the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Require livemode events in production.
    pub fn with_require_livemode(mut self, require: bool) -> Self {
        self.require_livemode = require;
        self
    }
}

/// Stripe billing gateway adapter.
pub struct StripeGatewayAdapter {
    config: StripeGatewayConfig,
    http_client: reqwest::Client,
}

impl StripeGatewayAdapter {
    /// Create a new Stripe adapter with the given configuration.
    pub fn new(config: StripeGatewayConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Option<T>, GatewayError> {
        let url = format!("{}{}", self.config.api_base_url, path);
        let response = self
            .http_client
            .get(&url)
            .timeout(self.config.request_timeout)
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .send()
            .await
            .map_err(transport_error)?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        response
            .json::<T>()
            .await
            .map(Some)
            .map_err(|e| GatewayError::provider(format!("Failed to parse Stripe response: {}", e)))
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, GatewayError> {
        let url = format!("{}{}", self.config.api_base_url, path);
        let response = self
            .http_client
            .post(&url)
            .timeout(self.config.request_timeout)
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .form(params)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        response
            .json::<T>()
            .await
            .map_err(|e| GatewayError::provider(format!("Failed to parse Stripe response: {}", e)))
    }

    /// Verify webhook signature using HMAC-SHA256.
    ///
    /// Uses constant-time comparison and bounds the event timestamp to
    /// reject replays and manipulated clocks.
    fn verify_signature(
        &self,
        payload: &[u8],
        header: &SignatureHeader,
    ) -> Result<(), GatewayError> {
        let now = chrono::Utc::now().timestamp();
        let age = now - header.timestamp;

        if age > MAX_TIMESTAMP_AGE_SECS {
            tracing::warn!(
                event_timestamp = header.timestamp,
                current_time = now,
                age_secs = age,
                "Webhook event too old - possible replay attack"
            );
            return Err(GatewayError::invalid_webhook(format!(
                "Event too old ({} seconds)",
                age
            )));
        }

        if age < -MAX_FUTURE_TOLERANCE_SECS {
            tracing::warn!(
                event_timestamp = header.timestamp,
                current_time = now,
                "Webhook event from future - clock skew or manipulation"
            );
            return Err(GatewayError::invalid_webhook("Event timestamp in future"));
        }

        let signed_payload = format!(
            "{}.{}",
            header.timestamp,
            String::from_utf8_lossy(payload)
        );

        let mut mac = HmacSha256::new_from_slice(
            self.config.webhook_secret.expose_secret().as_bytes(),
        )
        .expect("HMAC can take key of any size");

        mac.update(signed_payload.as_bytes());
        let expected = mac.finalize().into_bytes();

        let expected_bytes: &[u8] = expected.as_slice();
        let provided_bytes: &[u8] = &header.v1_signature;

        if expected_bytes.ct_eq(provided_bytes).unwrap_u8() != 1 {
            tracing::warn!(
                expected_signature = hex_encode(expected_bytes),
                "Invalid webhook signature"
            );
            return Err(GatewayError::invalid_webhook("Invalid signature"));
        }

        Ok(())
    }

    /// Parse a Stripe event and convert to the typed port event.
    fn parse_event(&self, payload: &[u8]) -> Result<WebhookEvent, GatewayError> {
        let stripe_event: StripeWebhookEvent = serde_json::from_slice(payload).map_err(|e| {
            tracing::warn!(error = %e, "Failed to parse webhook payload");
            GatewayError::invalid_webhook(format!("Invalid JSON: {}", e))
        })?;

        if self.config.require_livemode && !stripe_event.livemode {
            tracing::warn!(
                event_id = %stripe_event.id,
                "Rejected test mode event in production"
            );
            return Err(GatewayError::invalid_webhook(
                "Test mode events not allowed in production",
            ));
        }

        let event_time = Timestamp::from_unix_secs(stripe_event.created);

        let (event_type, data) = match stripe_event.event_type.as_str() {
            s if s.starts_with("customer.subscription.") => {
                let subscription: StripeSubscription =
                    serde_json::from_value(stripe_event.data.object.clone()).map_err(|e| {
                        GatewayError::invalid_webhook(format!("Invalid subscription: {}", e))
                    })?;

                let event_type = match s {
                    "customer.subscription.created" => WebhookEventType::SubscriptionCreated,
                    "customer.subscription.deleted" => WebhookEventType::SubscriptionDeleted,
                    _ => WebhookEventType::SubscriptionUpdated,
                };

                let result = subscription_result(subscription, event_time);
                let data = WebhookEventData::Subscription {
                    customer_id: result.customer_id.clone(),
                    observation: result.observation(),
                };
                (event_type, data)
            }

            "payment_intent.succeeded" | "payment_intent.payment_failed" => {
                let intent: StripePaymentIntent =
                    serde_json::from_value(stripe_event.data.object.clone()).map_err(|e| {
                        GatewayError::invalid_webhook(format!("Invalid payment intent: {}", e))
                    })?;

                let event_type = if stripe_event.event_type == "payment_intent.succeeded" {
                    WebhookEventType::IntentSucceeded
                } else {
                    WebhookEventType::IntentFailed
                };

                let data = WebhookEventData::Intent {
                    intent_id: intent.id.clone(),
                    status: GatewayIntentStatus::from_wire(&intent.status),
                    customer_id: intent.customer.clone(),
                };
                (event_type, data)
            }

            other => (
                WebhookEventType::Unknown(other.to_string()),
                WebhookEventData::Raw {
                    json: serde_json::to_string(&stripe_event.data.object).unwrap_or_default(),
                },
            ),
        };

        Ok(WebhookEvent {
            id: stripe_event.id,
            event_type,
            data,
            created_at: event_time,
        })
    }
}

/// Maps a reqwest transport failure.
fn transport_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::timeout(e.to_string())
    } else {
        GatewayError::network(e.to_string())
    }
}

/// Maps a non-2xx Stripe response, preserving the provider error code.
async fn api_error(response: reqwest::Response) -> GatewayError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    tracing::error!(status = %status, error = %body, "Stripe API call failed");

    let parsed: Option<super::webhook_types::StripeApiErrorEnvelope> =
        serde_json::from_str(&body).ok();
    let (error_type, provider_code, message) = match parsed {
        Some(envelope) => (
            envelope.error.error_type,
            envelope.error.decline_code.or(envelope.error.code),
            envelope
                .error
                .message
                .unwrap_or_else(|| format!("Stripe API error (HTTP {})", status)),
        ),
        None => (None, None, format!("Stripe API error (HTTP {})", status)),
    };

    let code = match status.as_u16() {
        401 => GatewayErrorCode::AuthenticationError,
        402 => GatewayErrorCode::CardDeclined,
        404 => GatewayErrorCode::NotFound,
        429 => GatewayErrorCode::RateLimitExceeded,
        _ if error_type.as_deref() == Some("card_error") => GatewayErrorCode::CardDeclined,
        _ => GatewayErrorCode::ProviderError,
    };

    let mut err = GatewayError::new(code, message);
    if let Some(provider_code) = provider_code {
        err = err.with_provider_code(provider_code);
    }
    err
}

/// Converts a wire intent into the typed port result.
fn intent_result(intent: StripePaymentIntent) -> IntentResult {
    let redirect_url = intent
        .next_action
        .as_ref()
        .and_then(|a| a.redirect_to_url.as_ref())
        .and_then(|r| r.url.clone());
    let decline_reason = intent.last_payment_error.as_ref().and_then(|e| {
        e.decline_code
            .clone()
            .or_else(|| e.code.clone())
            .or_else(|| e.message.clone())
    });

    IntentResult {
        id: intent.id,
        status: GatewayIntentStatus::from_wire(&intent.status),
        client_secret: intent.client_secret,
        redirect_url,
        decline_reason,
        amount_cents: intent.amount,
        currency: intent.currency,
    }
}

/// Converts a wire subscription into the typed port result.
///
/// `event_time` is the gateway's event timestamp for webhook payloads and
/// the read time for synchronous retrieves; either way it is the ordering
/// key reconciliation uses.
fn subscription_result(
    subscription: StripeSubscription,
    event_time: Timestamp,
) -> SubscriptionResult {
    let invoice = subscription
        .latest_invoice
        .as_ref()
        .and_then(|i| i.object());
    let intent = invoice
        .and_then(|i| i.payment_intent.as_ref())
        .and_then(|p| p.object());

    SubscriptionResult {
        id: subscription.id.clone(),
        customer_id: subscription.customer.clone(),
        status: GatewaySubscriptionStatus::from_wire(&subscription.status),
        pause_collection: subscription.pause_collection.is_some(),
        latest_invoice_id: invoice.map(|i| i.id.clone()),
        latest_intent_status: intent.map(|i| GatewayIntentStatus::from_wire(&i.status)),
        client_secret: intent.and_then(|i| i.client_secret.clone()),
        redirect_url: intent
            .and_then(|i| i.next_action.as_ref())
            .and_then(|a| a.redirect_to_url.as_ref())
            .and_then(|r| r.url.clone()),
        event_time,
    }
}

/// Converts a wire invoice into the typed port result.
fn invoice_result(invoice: StripeInvoice) -> InvoiceResult {
    let payment_intent_id = invoice.payment_intent.as_ref().map(|p| match p {
        super::webhook_types::StripeExpandable::Id(id) => id.clone(),
        super::webhook_types::StripeExpandable::Object(intent) => intent.id.clone(),
    });

    InvoiceResult {
        id: invoice.id,
        customer_id: invoice.customer,
        subscription_id: invoice.subscription,
        payment_intent_id,
        amount_due_cents: invoice.amount_due,
        currency: invoice.currency,
    }
}

#[async_trait]
impl BillingGateway for StripeGatewayAdapter {
    async fn create_customer(
        &self,
        request: CreateCustomerRequest,
    ) -> Result<CustomerResult, GatewayError> {
        let mut params = vec![
            ("email", request.email.clone()),
            ("metadata[user_id]", request.user_id.to_string()),
        ];
        if let Some(name) = &request.name {
            params.push(("name", name.clone()));
        }

        let customer: StripeCustomer = self.post_form("/v1/customers", &params).await?;

        Ok(CustomerResult {
            id: customer.id,
            email: customer.email.or(Some(request.email)),
            name: customer.name.or(request.name),
            created_at: customer.created,
        })
    }

    async fn retrieve_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<CustomerResult>, GatewayError> {
        let customer: Option<StripeCustomer> = self
            .get_json(&format!("/v1/customers/{}", customer_id))
            .await?;

        Ok(customer.filter(|c| !c.deleted).map(|c| CustomerResult {
            id: c.id,
            email: c.email,
            name: c.name,
            created_at: c.created,
        }))
    }

    async fn attach_payment_method(
        &self,
        payment_method_id: &str,
        customer_id: &str,
    ) -> Result<(), GatewayError> {
        let _: serde_json::Value = self
            .post_form(
                &format!("/v1/payment_methods/{}/attach", payment_method_id),
                &[("customer", customer_id.to_string())],
            )
            .await?;
        Ok(())
    }

    async fn set_default_payment_method(
        &self,
        customer_id: &str,
        payment_method_id: &str,
    ) -> Result<(), GatewayError> {
        let _: serde_json::Value = self
            .post_form(
                &format!("/v1/customers/{}", customer_id),
                &[(
                    "invoice_settings[default_payment_method]",
                    payment_method_id.to_string(),
                )],
            )
            .await?;
        Ok(())
    }

    async fn create_payment_intent(
        &self,
        request: CreateIntentRequest,
    ) -> Result<IntentResult, GatewayError> {
        let mut params = vec![
            ("amount", request.amount_cents.to_string()),
            ("currency", request.currency.clone()),
            ("customer", request.customer_id.clone()),
            ("payment_method", request.payment_method_id.clone()),
            ("confirm", "true".to_string()),
            ("automatic_payment_methods[enabled]", "true".to_string()),
            (
                "automatic_payment_methods[allow_redirects]",
                "always".to_string(),
            ),
        ];
        if let Some(return_url) = &request.return_url {
            params.push(("return_url", return_url.clone()));
        }

        let intent: StripePaymentIntent = self.post_form("/v1/payment_intents", &params).await?;
        Ok(intent_result(intent))
    }

    async fn retrieve_payment_intent(
        &self,
        intent_id: &str,
    ) -> Result<Option<IntentResult>, GatewayError> {
        let intent: Option<StripePaymentIntent> = self
            .get_json(&format!("/v1/payment_intents/{}", intent_id))
            .await?;
        Ok(intent.map(intent_result))
    }

    async fn confirm_payment_intent(
        &self,
        intent_id: &str,
        payment_method_id: Option<&str>,
        return_url: Option<&str>,
    ) -> Result<IntentResult, GatewayError> {
        let mut params = Vec::new();
        if let Some(payment_method_id) = payment_method_id {
            params.push(("payment_method", payment_method_id.to_string()));
        }
        if let Some(return_url) = return_url {
            params.push(("return_url", return_url.to_string()));
        }

        let intent: StripePaymentIntent = self
            .post_form(&format!("/v1/payment_intents/{}/confirm", intent_id), &params)
            .await?;
        Ok(intent_result(intent))
    }

    async fn create_subscription(
        &self,
        request: CreateSubscriptionRequest,
    ) -> Result<SubscriptionResult, GatewayError> {
        let params = vec![
            ("customer", request.customer_id.clone()),
            ("items[0][price]", request.price_id.clone()),
            (
                "default_payment_method",
                request.default_payment_method_id.clone(),
            ),
            // Allow-incomplete mode: return instead of throwing when the
            // first invoice's payment needs further action.
            ("payment_behavior", "default_incomplete".to_string()),
            ("expand[]", "latest_invoice.payment_intent".to_string()),
        ];

        let subscription: StripeSubscription =
            self.post_form("/v1/subscriptions", &params).await?;
        Ok(subscription_result(subscription, Timestamp::now()))
    }

    async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<SubscriptionResult>, GatewayError> {
        let subscription: Option<StripeSubscription> = self
            .get_json(&format!(
                "/v1/subscriptions/{}?expand[]=latest_invoice.payment_intent",
                subscription_id
            ))
            .await?;
        Ok(subscription.map(|s| subscription_result(s, Timestamp::now())))
    }

    async fn pause_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<SubscriptionResult, GatewayError> {
        let subscription: StripeSubscription = self
            .post_form(
                &format!("/v1/subscriptions/{}", subscription_id),
                &[("pause_collection[behavior]", "void".to_string())],
            )
            .await?;
        Ok(subscription_result(subscription, Timestamp::now()))
    }

    async fn resume_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<SubscriptionResult, GatewayError> {
        // An empty value clears the attribute.
        let subscription: StripeSubscription = self
            .post_form(
                &format!("/v1/subscriptions/{}", subscription_id),
                &[("pause_collection", String::new())],
            )
            .await?;
        Ok(subscription_result(subscription, Timestamp::now()))
    }

    async fn retrieve_invoice(
        &self,
        invoice_id: &str,
    ) -> Result<Option<InvoiceResult>, GatewayError> {
        let invoice: Option<StripeInvoice> = self
            .get_json(&format!("/v1/invoices/{}", invoice_id))
            .await?;
        Ok(invoice.map(invoice_result))
    }

    async fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<WebhookEvent, GatewayError> {
        let header = SignatureHeader::parse(signature).map_err(|e| {
            tracing::warn!(error = %e, "Failed to parse Stripe-Signature header");
            GatewayError::invalid_webhook(e.to_string())
        })?;

        self.verify_signature(payload, &header)?;

        let event = self.parse_event(payload)?;

        tracing::info!(
            event_id = %event.id,
            event_type = ?event.event_type,
            "Webhook signature verified"
        );

        Ok(event)
    }
}
