//! Mock billing gateway for testing.
//!
//! Provides a configurable in-memory implementation of `BillingGateway`
//! for unit and integration tests. Supports:
//! - Pre-configured responses
//! - Error injection (global or per method)
//! - Call tracking
//! - Webhook event simulation

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::domain::billing::{GatewayIntentStatus, GatewaySubscriptionStatus};
use crate::domain::foundation::Timestamp;
use crate::ports::{
    BillingGateway, CreateCustomerRequest, CreateIntentRequest, CreateSubscriptionRequest,
    CustomerResult, GatewayError, IntentResult, InvoiceResult, SubscriptionResult, WebhookEvent,
};

/// Mock billing gateway for testing.
///
/// # Example
///
/// ```ignore
/// let mock = MockBillingGateway::new();
/// mock.fail_method("attach_payment_method", GatewayError::provider("no such pm"));
///
/// let result = mock.attach_payment_method("pm_1", "cus_1").await;
/// assert!(result.is_err());
/// assert_eq!(mock.calls("attach_payment_method"), 1);
/// ```
#[derive(Default)]
pub struct MockBillingGateway {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    /// Customers by gateway ID.
    customers: HashMap<String, CustomerResult>,

    /// Intents by gateway ID.
    intents: HashMap<String, IntentResult>,

    /// Subscriptions by gateway ID.
    subscriptions: HashMap<String, SubscriptionResult>,

    /// Invoices by gateway ID.
    invoices: HashMap<String, InvoiceResult>,

    /// Attachments recorded as (payment_method_id, customer_id).
    attachments: Vec<(String, String)>,

    /// Default payment methods by customer ID.
    default_payment_methods: HashMap<String, String>,

    /// Status the next created intent reports.
    next_intent_status: Option<GatewayIntentStatus>,

    /// Status the next created subscription reports.
    next_subscription_status: Option<GatewaySubscriptionStatus>,

    /// Intent status carried on the next created subscription's first
    /// invoice.
    next_subscription_intent_status: Option<GatewayIntentStatus>,

    /// Event to return from webhook verification.
    next_webhook_event: Option<WebhookEvent>,

    /// Errors keyed by method name, returned once per configuration.
    method_errors: HashMap<String, GatewayError>,

    /// Method call log for assertions.
    call_log: Vec<String>,

    /// Monotonic counters for generated IDs and event times.
    customer_seq: u64,
    intent_seq: u64,
    subscription_seq: u64,
    clock: i64,
}

impl MockState {
    fn check_error(&mut self, method: &str) -> Result<(), GatewayError> {
        self.call_log.push(method.to_string());
        match self.method_errors.get(method) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn tick(&mut self) -> Timestamp {
        self.clock += 1;
        Timestamp::from_unix_secs(1_700_000_000 + self.clock)
    }
}

impl MockBillingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the named method fail with the given error on every call.
    pub fn fail_method(&self, method: &str, error: GatewayError) {
        self.inner
            .lock()
            .unwrap()
            .method_errors
            .insert(method.to_string(), error);
    }

    /// Seed a customer.
    pub fn insert_customer(&self, customer: CustomerResult) {
        let mut state = self.inner.lock().unwrap();
        state.customers.insert(customer.id.clone(), customer);
    }

    /// Remove a customer, simulating gateway-side deletion.
    pub fn delete_customer(&self, customer_id: &str) {
        self.inner.lock().unwrap().customers.remove(customer_id);
    }

    /// Seed a subscription.
    pub fn insert_subscription(&self, subscription: SubscriptionResult) {
        let mut state = self.inner.lock().unwrap();
        state
            .subscriptions
            .insert(subscription.id.clone(), subscription);
    }

    /// Seed an intent.
    pub fn insert_intent(&self, intent: IntentResult) {
        let mut state = self.inner.lock().unwrap();
        state.intents.insert(intent.id.clone(), intent);
    }

    /// Status the next created intent reports.
    pub fn set_next_intent_status(&self, status: GatewayIntentStatus) {
        self.inner.lock().unwrap().next_intent_status = Some(status);
    }

    /// Status the next created subscription reports.
    pub fn set_next_subscription_status(&self, status: GatewaySubscriptionStatus) {
        self.inner.lock().unwrap().next_subscription_status = Some(status);
    }

    /// First-invoice intent status for the next created subscription.
    pub fn set_next_subscription_intent_status(&self, status: GatewayIntentStatus) {
        self.inner.lock().unwrap().next_subscription_intent_status = Some(status);
    }

    /// Event to return from `verify_webhook`.
    pub fn set_next_webhook_event(&self, event: WebhookEvent) {
        self.inner.lock().unwrap().next_webhook_event = Some(event);
    }

    /// Number of calls made to the named method.
    pub fn calls(&self, method: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .call_log
            .iter()
            .filter(|m| m.as_str() == method)
            .count()
    }

    /// Recorded (payment_method_id, customer_id) attachments.
    pub fn attachments(&self) -> Vec<(String, String)> {
        self.inner.lock().unwrap().attachments.clone()
    }

    /// Default payment method recorded for a customer.
    pub fn default_payment_method(&self, customer_id: &str) -> Option<String> {
        self.inner
            .lock()
            .unwrap()
            .default_payment_methods
            .get(customer_id)
            .cloned()
    }
}

#[async_trait]
impl BillingGateway for MockBillingGateway {
    async fn create_customer(
        &self,
        request: CreateCustomerRequest,
    ) -> Result<CustomerResult, GatewayError> {
        let mut state = self.inner.lock().unwrap();
        state.check_error("create_customer")?;

        state.customer_seq += 1;
        let customer = CustomerResult {
            id: format!("cus_mock_{}", state.customer_seq),
            email: Some(request.email),
            name: request.name,
            created_at: state.tick().as_unix_secs(),
        };
        state.customers.insert(customer.id.clone(), customer.clone());
        Ok(customer)
    }

    async fn retrieve_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<CustomerResult>, GatewayError> {
        let mut state = self.inner.lock().unwrap();
        state.check_error("retrieve_customer")?;
        Ok(state.customers.get(customer_id).cloned())
    }

    async fn attach_payment_method(
        &self,
        payment_method_id: &str,
        customer_id: &str,
    ) -> Result<(), GatewayError> {
        let mut state = self.inner.lock().unwrap();
        state.check_error("attach_payment_method")?;
        state
            .attachments
            .push((payment_method_id.to_string(), customer_id.to_string()));
        Ok(())
    }

    async fn set_default_payment_method(
        &self,
        customer_id: &str,
        payment_method_id: &str,
    ) -> Result<(), GatewayError> {
        let mut state = self.inner.lock().unwrap();
        state.check_error("set_default_payment_method")?;
        state
            .default_payment_methods
            .insert(customer_id.to_string(), payment_method_id.to_string());
        Ok(())
    }

    async fn create_payment_intent(
        &self,
        request: CreateIntentRequest,
    ) -> Result<IntentResult, GatewayError> {
        let mut state = self.inner.lock().unwrap();
        state.check_error("create_payment_intent")?;

        state.intent_seq += 1;
        let status = state
            .next_intent_status
            .take()
            .unwrap_or(GatewayIntentStatus::Succeeded);
        let id = format!("pi_mock_{}", state.intent_seq);
        let intent = IntentResult {
            client_secret: Some(format!("{}_secret", id)),
            redirect_url: match status {
                GatewayIntentStatus::RequiresAction => request.return_url.clone(),
                _ => None,
            },
            decline_reason: match status {
                GatewayIntentStatus::RequiresPaymentMethod | GatewayIntentStatus::Canceled => {
                    Some("card_declined".to_string())
                }
                _ => None,
            },
            id,
            status,
            amount_cents: request.amount_cents,
            currency: request.currency,
        };
        state.intents.insert(intent.id.clone(), intent.clone());
        Ok(intent)
    }

    async fn retrieve_payment_intent(
        &self,
        intent_id: &str,
    ) -> Result<Option<IntentResult>, GatewayError> {
        let mut state = self.inner.lock().unwrap();
        state.check_error("retrieve_payment_intent")?;
        Ok(state.intents.get(intent_id).cloned())
    }

    async fn confirm_payment_intent(
        &self,
        intent_id: &str,
        _payment_method_id: Option<&str>,
        _return_url: Option<&str>,
    ) -> Result<IntentResult, GatewayError> {
        let mut state = self.inner.lock().unwrap();
        state.check_error("confirm_payment_intent")?;

        let next_status = state
            .next_intent_status
            .take()
            .unwrap_or(GatewayIntentStatus::Succeeded);
        match state.intents.get_mut(intent_id) {
            Some(intent) => {
                intent.status = next_status;
                Ok(intent.clone())
            }
            None => Err(GatewayError::not_found("PaymentIntent")),
        }
    }

    async fn create_subscription(
        &self,
        request: CreateSubscriptionRequest,
    ) -> Result<SubscriptionResult, GatewayError> {
        let mut state = self.inner.lock().unwrap();
        state.check_error("create_subscription")?;

        state.subscription_seq += 1;
        let status = state
            .next_subscription_status
            .take()
            .unwrap_or(GatewaySubscriptionStatus::Active);
        let intent_status = state.next_subscription_intent_status.take();
        let id = format!("sub_mock_{}", state.subscription_seq);
        let event_time = state.tick();
        let subscription = SubscriptionResult {
            customer_id: request.customer_id,
            status,
            pause_collection: false,
            latest_invoice_id: Some(format!("in_mock_{}", state.subscription_seq)),
            client_secret: match intent_status {
                Some(GatewayIntentStatus::RequiresAction) => Some(format!("{}_secret", id)),
                _ => None,
            },
            latest_intent_status: intent_status,
            redirect_url: None,
            event_time,
            id,
        };
        state
            .subscriptions
            .insert(subscription.id.clone(), subscription.clone());
        Ok(subscription)
    }

    async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<SubscriptionResult>, GatewayError> {
        let mut state = self.inner.lock().unwrap();
        state.check_error("retrieve_subscription")?;
        Ok(state.subscriptions.get(subscription_id).cloned())
    }

    async fn pause_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<SubscriptionResult, GatewayError> {
        let mut state = self.inner.lock().unwrap();
        state.check_error("pause_subscription")?;

        let event_time = state.tick();
        match state.subscriptions.get_mut(subscription_id) {
            Some(subscription) => {
                subscription.pause_collection = true;
                subscription.event_time = event_time;
                Ok(subscription.clone())
            }
            None => Err(GatewayError::not_found("Subscription")),
        }
    }

    async fn resume_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<SubscriptionResult, GatewayError> {
        let mut state = self.inner.lock().unwrap();
        state.check_error("resume_subscription")?;

        let event_time = state.tick();
        match state.subscriptions.get_mut(subscription_id) {
            Some(subscription) => {
                subscription.pause_collection = false;
                subscription.event_time = event_time;
                Ok(subscription.clone())
            }
            None => Err(GatewayError::not_found("Subscription")),
        }
    }

    async fn retrieve_invoice(
        &self,
        invoice_id: &str,
    ) -> Result<Option<InvoiceResult>, GatewayError> {
        let mut state = self.inner.lock().unwrap();
        state.check_error("retrieve_invoice")?;
        Ok(state.invoices.get(invoice_id).cloned())
    }

    async fn verify_webhook(
        &self,
        _payload: &[u8],
        _signature: &str,
    ) -> Result<WebhookEvent, GatewayError> {
        let mut state = self.inner.lock().unwrap();
        state.check_error("verify_webhook")?;
        state
            .next_webhook_event
            .take()
            .ok_or_else(|| GatewayError::invalid_webhook("No webhook event configured"))
    }
}
