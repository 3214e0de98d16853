//! HTTP adapter for the billing API.

mod dto;
mod handlers;
mod routes;

pub use dto::ApiEnvelope;
pub use handlers::{AuthenticatedUser, BillingApiError, BillingAppState};
pub use routes::{billing_router, billing_routes, webhook_routes};
