//! HTTP handlers for billing endpoints.
//!
//! These handlers connect axum routes to the application layer. Requires-
//! action outcomes come back as HTTP 402 with the client secret in the
//! envelope; everything else follows the error table in the domain.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::application::handlers::billing::{
    CheckVotingEligibilityHandler, ConfirmPaymentCommand, ConfirmPaymentHandler,
    CreateAndConfirmIntentHandler, CreateIntentCommand, CreateSubscriptionCommand,
    CreateSubscriptionHandler, HandleGatewayWebhookHandler, PauseSubscriptionCommand,
    PauseSubscriptionHandler, ReconcileSubscriptionHandler, ResumeSubscriptionCommand,
    ResumeSubscriptionHandler, WebhookOutcome,
};
use crate::config::PaymentConfig;
use crate::domain::billing::{BillingError, IntentOutcome, SubscriptionOutcome};
use crate::domain::foundation::UserId;
use crate::ports::{BillingGateway, PaymentRepository, UserRepository};

use super::super::middleware::JwtVerifier;
use super::dto::{
    intent_outcome_data, subscription_outcome_data, ApiEnvelope, ConfirmSubscriptionRequest,
    CreatePaymentIntentRequest, PaymentConfirmationQuery, SubscribeRequest,
    SubscriptionActionRequest,
};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared application state for billing routes.
///
/// Cloned per request; dependencies are Arc-wrapped ports.
#[derive(Clone)]
pub struct BillingAppState {
    pub users: Arc<dyn UserRepository>,
    pub payments: Arc<dyn PaymentRepository>,
    pub gateway: Arc<dyn BillingGateway>,
    pub jwt: Arc<JwtVerifier>,
    pub payment_config: Arc<PaymentConfig>,
}

impl BillingAppState {
    pub fn create_intent_handler(&self) -> CreateAndConfirmIntentHandler {
        CreateAndConfirmIntentHandler::new(
            self.users.clone(),
            self.payments.clone(),
            self.gateway.clone(),
        )
    }

    pub fn confirm_payment_handler(&self) -> ConfirmPaymentHandler {
        ConfirmPaymentHandler::new(self.payments.clone(), self.gateway.clone())
    }

    pub fn create_subscription_handler(&self) -> CreateSubscriptionHandler {
        CreateSubscriptionHandler::new(
            self.users.clone(),
            self.payments.clone(),
            self.gateway.clone(),
        )
    }

    pub fn reconcile_handler(&self) -> ReconcileSubscriptionHandler {
        ReconcileSubscriptionHandler::new(self.payments.clone(), self.gateway.clone())
    }

    pub fn pause_handler(&self) -> PauseSubscriptionHandler {
        PauseSubscriptionHandler::new(self.payments.clone(), self.gateway.clone())
    }

    pub fn resume_handler(&self) -> ResumeSubscriptionHandler {
        ResumeSubscriptionHandler::new(self.payments.clone(), self.gateway.clone())
    }

    pub fn webhook_handler(&self) -> HandleGatewayWebhookHandler {
        HandleGatewayWebhookHandler::new(
            self.users.clone(),
            self.payments.clone(),
            self.gateway.clone(),
        )
    }

    pub fn eligibility_handler(&self) -> CheckVotingEligibilityHandler {
        CheckVotingEligibilityHandler::new(self.payments.clone())
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Authentication Extractor
// ════════════════════════════════════════════════════════════════════════════════

/// Authenticated user context extracted from the bearer token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
}

/// Rejection for failed authentication.
pub struct AuthenticationRequired;

impl IntoResponse for AuthenticationRequired {
    fn into_response(self) -> Response {
        let envelope = ApiEnvelope::failure("Authentication is required", "UNAUTHORIZED");
        (StatusCode::UNAUTHORIZED, Json(envelope)).into_response()
    }
}

#[axum::async_trait]
impl axum::extract::FromRequestParts<BillingAppState> for AuthenticatedUser {
    type Rejection = AuthenticationRequired;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &BillingAppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());

        let user_id = state
            .jwt
            .verify_header(header)
            .map_err(|_| AuthenticationRequired)?;

        Ok(AuthenticatedUser { user_id })
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Mapping
// ════════════════════════════════════════════════════════════════════════════════

/// BillingError wrapper with an IntoResponse impl.
pub struct BillingApiError(BillingError);

impl From<BillingError> for BillingApiError {
    fn from(err: BillingError) -> Self {
        Self(err)
    }
}

impl IntoResponse for BillingApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            BillingError::Validation { .. } => StatusCode::BAD_REQUEST,
            BillingError::Unauthorized => StatusCode::UNAUTHORIZED,
            BillingError::MissingPaymentMethod => StatusCode::BAD_REQUEST,
            BillingError::InvalidPaymentMethod { .. } => StatusCode::PAYMENT_REQUIRED,
            BillingError::NotFound { .. } => StatusCode::NOT_FOUND,
            BillingError::Gateway { .. } => StatusCode::BAD_GATEWAY,
            BillingError::Infrastructure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Gateway details are logged, not leaked: the envelope carries
        // the stable code and a safe message only.
        let message = match &self.0 {
            BillingError::Infrastructure(detail) => {
                tracing::error!(error = %detail, "Internal error at API boundary");
                "Internal server error".to_string()
            }
            BillingError::Gateway { message, .. } => {
                tracing::error!(error = %message, "Gateway error at API boundary");
                "Payment provider error".to_string()
            }
            other => other.to_string(),
        };

        let envelope = ApiEnvelope::failure(message, self.0.code());
        (status, Json(envelope)).into_response()
    }
}

/// Renders an intent outcome: 200 for settled, 402 while action pends.
fn intent_response(outcome: IntentOutcome) -> Response {
    let data = intent_outcome_data(&outcome);
    match outcome {
        IntentOutcome::Succeeded { .. } => (
            StatusCode::OK,
            Json(ApiEnvelope::ok("Payment completed", data)),
        )
            .into_response(),
        IntentOutcome::RequiresAction { .. } => (
            StatusCode::PAYMENT_REQUIRED,
            Json(ApiEnvelope::action_required(
                "Additional authentication required",
                data,
            )),
        )
            .into_response(),
        IntentOutcome::Failed { .. } => (
            StatusCode::OK,
            Json(ApiEnvelope::ok("Payment did not complete", data)),
        )
            .into_response(),
    }
}

/// Renders a subscription outcome: 200 when created, 402 while action pends.
fn subscription_response(outcome: SubscriptionOutcome) -> Response {
    let data = subscription_outcome_data(&outcome);
    match outcome {
        SubscriptionOutcome::RequiresAction { .. } => (
            StatusCode::PAYMENT_REQUIRED,
            Json(ApiEnvelope::action_required(
                "Additional authentication required",
                data,
            )),
        )
            .into_response(),
        _ => (
            StatusCode::OK,
            Json(ApiEnvelope::ok("Subscription created", data)),
        )
            .into_response(),
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Route Handlers
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/create-payment-intent
pub async fn create_payment_intent(
    State(state): State<BillingAppState>,
    user: AuthenticatedUser,
    Json(request): Json<CreatePaymentIntentRequest>,
) -> Result<Response, BillingApiError> {
    let handler = state.create_intent_handler();
    let cmd = CreateIntentCommand {
        user_id: user.user_id,
        payment_method_id: request.payment_method,
        amount_cents: request.amount,
        currency: request
            .currency
            .unwrap_or_else(|| state.payment_config.currency.clone()),
        return_url: state.payment_config.confirmation_return_url.clone(),
    };

    let outcome = handler.handle(cmd).await?;
    Ok(intent_response(outcome))
}

/// POST /api/subscribe
pub async fn subscribe(
    State(state): State<BillingAppState>,
    user: AuthenticatedUser,
    Json(request): Json<SubscribeRequest>,
) -> Result<Response, BillingApiError> {
    let price_id = request
        .price_id
        .or_else(|| state.payment_config.subscription_price_id.clone())
        .ok_or_else(|| {
            BillingError::validation("price_id", "No price supplied and no default configured")
        })?;

    let handler = state.create_subscription_handler();
    let outcome = handler
        .handle(CreateSubscriptionCommand {
            user_id: user.user_id,
            price_id,
        })
        .await?;

    Ok(subscription_response(outcome))
}

/// POST /api/confirm-subscription
pub async fn confirm_subscription(
    State(state): State<BillingAppState>,
    user: AuthenticatedUser,
    Json(request): Json<ConfirmSubscriptionRequest>,
) -> Result<Response, BillingApiError> {
    // Ownership check before reconciling on the caller's behalf.
    let record = state
        .payments
        .find_by_subscription_id(&request.subscription_id)
        .await
        .map_err(BillingError::from)?
        .ok_or(BillingError::not_found("Subscription"))?;
    if record.user_id != user.user_id {
        return Err(BillingError::Unauthorized.into());
    }

    let outcome = state
        .reconcile_handler()
        .handle(&request.subscription_id)
        .await?;

    let envelope = ApiEnvelope::ok(
        "Subscription status reconciled",
        serde_json::json!({
            "subscription_id": request.subscription_id,
            "status": outcome.status(),
        }),
    );
    Ok((StatusCode::OK, Json(envelope)).into_response())
}

/// POST /api/pause-subscription
pub async fn pause_subscription(
    State(state): State<BillingAppState>,
    user: AuthenticatedUser,
    Json(request): Json<SubscriptionActionRequest>,
) -> Result<Response, BillingApiError> {
    let status = state
        .pause_handler()
        .handle(PauseSubscriptionCommand {
            user_id: user.user_id,
            subscription_id: request.subscription_id.clone(),
        })
        .await?;

    let envelope = ApiEnvelope::ok(
        "Subscription paused",
        serde_json::json!({
            "subscription_id": request.subscription_id,
            "status": status,
        }),
    );
    Ok((StatusCode::OK, Json(envelope)).into_response())
}

/// POST /api/resume-subscription
pub async fn resume_subscription(
    State(state): State<BillingAppState>,
    user: AuthenticatedUser,
    Json(request): Json<SubscriptionActionRequest>,
) -> Result<Response, BillingApiError> {
    let status = state
        .resume_handler()
        .handle(ResumeSubscriptionCommand {
            user_id: user.user_id,
            subscription_id: request.subscription_id.clone(),
        })
        .await?;

    let envelope = ApiEnvelope::ok(
        "Subscription resumed",
        serde_json::json!({
            "subscription_id": request.subscription_id,
            "status": status,
        }),
    );
    Ok((StatusCode::OK, Json(envelope)).into_response())
}

/// GET /api/payment-confirmation?payment_intent=pi_...
///
/// Redirect callback after out-of-band authentication. Unauthenticated:
/// the cardholder arrives from the gateway, not from our client.
pub async fn payment_confirmation(
    State(state): State<BillingAppState>,
    Query(query): Query<PaymentConfirmationQuery>,
) -> Result<Response, BillingApiError> {
    let outcome = state
        .confirm_payment_handler()
        .handle(ConfirmPaymentCommand {
            payment_intent_id: query.payment_intent,
            payment_method_id: None,
            return_url: None,
        })
        .await?;

    Ok(intent_response(outcome))
}

/// GET /api/voting-eligibility
pub async fn voting_eligibility(
    State(state): State<BillingAppState>,
    user: AuthenticatedUser,
) -> Result<Response, BillingApiError> {
    let result = state.eligibility_handler().handle(&user.user_id).await?;

    let envelope = ApiEnvelope::ok(
        "Voting eligibility checked",
        serde_json::json!({ "eligible": result.eligible }),
    );
    Ok((StatusCode::OK, Json(envelope)).into_response())
}

/// POST /api/webhooks/stripe
///
/// No bearer auth; authenticity comes from the signature header.
pub async fn stripe_webhook(
    State(state): State<BillingAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, BillingApiError> {
    let signature = headers
        .get("Stripe-Signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            BillingError::validation("signature", "Missing Stripe-Signature header")
        })?;

    let outcome = state.webhook_handler().handle(&body, signature).await?;

    let envelope = match outcome {
        WebhookOutcome::Processed(status) => ApiEnvelope::ok(
            "Event processed",
            serde_json::json!({ "status": status }),
        ),
        WebhookOutcome::Ignored => ApiEnvelope::ok_empty("Event ignored"),
    };
    Ok((StatusCode::OK, Json(envelope)).into_response())
}
