//! Axum router configuration for billing endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{
    confirm_subscription, create_payment_intent, pause_subscription, payment_confirmation,
    resume_subscription, stripe_webhook, subscribe, voting_eligibility, BillingAppState,
};

/// Create the billing API router.
///
/// # Routes
///
/// ## User Endpoints (bearer-token authenticated)
/// - `POST /create-payment-intent` - create and confirm a one-time charge
/// - `POST /subscribe` - create a subscription
/// - `POST /confirm-subscription` - re-reconcile after out-of-band auth
/// - `POST /pause-subscription` - pause collection
/// - `POST /resume-subscription` - resume collection
/// - `GET /voting-eligibility` - check the voting gate
///
/// ## Public Endpoints
/// - `GET /payment-confirmation` - gateway redirect callback
pub fn billing_routes() -> Router<BillingAppState> {
    Router::new()
        .route("/create-payment-intent", post(create_payment_intent))
        .route("/subscribe", post(subscribe))
        .route("/confirm-subscription", post(confirm_subscription))
        .route("/pause-subscription", post(pause_subscription))
        .route("/resume-subscription", post(resume_subscription))
        .route("/payment-confirmation", get(payment_confirmation))
        .route("/voting-eligibility", get(voting_eligibility))
}

/// Create the webhook router.
///
/// Separate from the user routes because webhooks carry no bearer token;
/// they are verified via signature instead.
///
/// # Routes
/// - `POST /stripe` - gateway status pushes
pub fn webhook_routes() -> Router<BillingAppState> {
    Router::new().route("/stripe", post(stripe_webhook))
}

/// Create the complete billing module router, for mounting at `/api`.
pub fn billing_router() -> Router<BillingAppState> {
    Router::new()
        .merge(billing_routes())
        .nest("/webhooks", webhook_routes())
}
