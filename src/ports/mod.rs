//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Billing Ports
//!
//! - `BillingGateway` - external payment processor operations
//!
//! ## Persistence Ports
//!
//! - `UserRepository` - identity records
//! - `PaymentRepository` - local payment/subscription mirrors

mod billing_gateway;
mod payment_repository;
mod user_repository;

pub use billing_gateway::{
    BillingGateway, CreateCustomerRequest, CreateIntentRequest, CreateSubscriptionRequest,
    CustomerResult, GatewayError, GatewayErrorCode, IntentResult, InvoiceResult,
    SubscriptionResult, WebhookEvent, WebhookEventData, WebhookEventType,
};
pub use payment_repository::PaymentRepository;
pub use user_repository::UserRepository;
