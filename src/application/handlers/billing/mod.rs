//! Billing command and query handlers.
//!
//! One handler per operation, each wiring ports together behind a small
//! command struct. The reconciliation handler is shared by the
//! synchronous flows and the webhook path.

mod check_voting_eligibility;
mod confirm_payment;
mod create_payment_intent;
mod create_subscription;
mod ensure_customer;
mod handle_gateway_webhook;
mod pause_subscription;
mod reconcile_subscription;
mod resume_subscription;

pub use check_voting_eligibility::{CheckVotingEligibilityHandler, VotingEligibility};
pub use confirm_payment::{ConfirmPaymentCommand, ConfirmPaymentHandler};
pub use create_payment_intent::{CreateAndConfirmIntentHandler, CreateIntentCommand};
pub use create_subscription::{CreateSubscriptionCommand, CreateSubscriptionHandler};
pub use ensure_customer::EnsureCustomerHandler;
pub use handle_gateway_webhook::{HandleGatewayWebhookHandler, WebhookOutcome};
pub use pause_subscription::{PauseSubscriptionCommand, PauseSubscriptionHandler};
pub use reconcile_subscription::{ReconcileOutcome, ReconcileSubscriptionHandler};
pub use resume_subscription::{ResumeSubscriptionCommand, ResumeSubscriptionHandler};
