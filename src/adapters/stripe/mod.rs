//! Stripe adapter module.
//!
//! Implements the `BillingGateway` port against the Stripe API, plus a
//! configurable mock for tests and local development.

mod gateway_adapter;
mod mock_gateway;
mod webhook_types;

pub use gateway_adapter::{StripeGatewayAdapter, StripeGatewayConfig};
pub use mock_gateway::MockBillingGateway;
