//! Integration tests for the billing lifecycle.
//!
//! Drives the full flow through the application handlers with the mock
//! gateway and in-memory repositories:
//! bind customer -> intent requires action -> out-of-band success ->
//! subscription active -> late webhook moves status again.

use std::sync::Arc;

use crowdvote::adapters::http::billing::{billing_router, BillingAppState};
use crowdvote::adapters::http::middleware::JwtVerifier;
use crowdvote::adapters::memory::{InMemoryPaymentRepository, InMemoryUserRepository};
use crowdvote::adapters::stripe::MockBillingGateway;
use crowdvote::application::handlers::billing::{
    ConfirmPaymentCommand, ConfirmPaymentHandler, CreateAndConfirmIntentHandler,
    CreateIntentCommand, CreateSubscriptionCommand, CreateSubscriptionHandler,
    EnsureCustomerHandler, HandleGatewayWebhookHandler, WebhookOutcome,
};
use crowdvote::config::PaymentConfig;
use crowdvote::domain::billing::{
    BillingStatus, GatewayIntentStatus, GatewaySubscriptionStatus, IntentOutcome,
    SubscriptionObservation, SubscriptionOutcome,
};
use crowdvote::domain::foundation::{Timestamp, UserId};
use crowdvote::domain::user::User;
use crowdvote::ports::{
    BillingGateway, PaymentRepository, UserRepository, WebhookEvent, WebhookEventData,
    WebhookEventType,
};

// =============================================================================
// Test Infrastructure
// =============================================================================

struct TestApp {
    users: Arc<InMemoryUserRepository>,
    payments: Arc<InMemoryPaymentRepository>,
    gateway: Arc<MockBillingGateway>,
    user_id: UserId,
}

fn test_app() -> TestApp {
    let users = Arc::new(InMemoryUserRepository::new());
    let payments = Arc::new(InMemoryPaymentRepository::new());
    let gateway = Arc::new(MockBillingGateway::new());

    let user = User::new("voter@example.com", "argon2-hash", "Vera", "Voter");
    let user_id = user.id;
    users.insert(user);

    TestApp {
        users,
        payments,
        gateway,
        user_id,
    }
}

fn subscription_event(subscription_id: &str, status: GatewaySubscriptionStatus, at: i64) -> WebhookEvent {
    WebhookEvent {
        id: format!("evt_{}", at),
        event_type: WebhookEventType::SubscriptionUpdated,
        data: WebhookEventData::Subscription {
            customer_id: "cus_mock_1".to_string(),
            observation: SubscriptionObservation {
                subscription_id: subscription_id.to_string(),
                status,
                pause_collection: false,
                latest_intent_status: None,
                client_secret: None,
                redirect_url: None,
                observed_at: Timestamp::from_unix_secs(at),
            },
        },
        created_at: Timestamp::from_unix_secs(at),
    }
}

// =============================================================================
// End-to-End Lifecycle
// =============================================================================

#[tokio::test]
async fn full_billing_lifecycle_converges() {
    let app = test_app();

    // 1. First payment interaction binds the user to a gateway customer.
    let ensure = EnsureCustomerHandler::new(app.users.clone(), app.gateway.clone());
    let customer_id = ensure.handle(&app.user_id).await.unwrap();
    assert!(customer_id.starts_with("cus_"));

    let bound = app.users.find_by_id(&app.user_id).await.unwrap().unwrap();
    assert_eq!(bound.gateway_customer_id.as_deref(), Some(customer_id.as_str()));

    // 2. Create-and-confirm hits a strong-authentication wall.
    app.gateway
        .set_next_intent_status(GatewayIntentStatus::RequiresAction);
    let create_intent = CreateAndConfirmIntentHandler::new(
        app.users.clone(),
        app.payments.clone(),
        app.gateway.clone(),
    );
    let outcome = create_intent
        .handle(CreateIntentCommand {
            user_id: app.user_id,
            payment_method_id: "pm_card".to_string(),
            amount_cents: 1000,
            currency: "usd".to_string(),
            return_url: Some("https://app.example.com/payment-confirmation".to_string()),
        })
        .await
        .unwrap();

    let IntentOutcome::RequiresAction { intent_id, .. } = outcome else {
        panic!("expected RequiresAction, got {:?}", outcome);
    };
    let record = app
        .payments
        .find_active_for_user(&app.user_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, BillingStatus::RequiresAction);

    // Binding stayed idempotent: one creation for the whole flow so far.
    assert_eq!(app.gateway.calls("create_customer"), 1);

    // 3. The cardholder completes authentication out of band; the
    //    redirect callback re-reads the intent.
    app.gateway
        .set_next_intent_status(GatewayIntentStatus::Succeeded);
    let confirmed = app
        .gateway
        .confirm_payment_intent(&intent_id, None, None)
        .await
        .unwrap();
    assert_eq!(confirmed.status, GatewayIntentStatus::Succeeded);

    let confirm = ConfirmPaymentHandler::new(app.payments.clone(), app.gateway.clone());
    let outcome = confirm
        .handle(ConfirmPaymentCommand {
            payment_intent_id: intent_id.clone(),
            payment_method_id: None,
            return_url: None,
        })
        .await
        .unwrap();
    assert!(matches!(outcome, IntentOutcome::Succeeded { .. }));

    let record = app
        .payments
        .find_active_for_user(&app.user_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, BillingStatus::Succeeded);

    // Re-confirming is a cached no-op.
    let confirms_before = app.gateway.calls("confirm_payment_intent");
    let again = confirm
        .handle(ConfirmPaymentCommand {
            payment_intent_id: intent_id,
            payment_method_id: None,
            return_url: None,
        })
        .await
        .unwrap();
    assert!(matches!(again, IntentOutcome::Succeeded { .. }));
    assert_eq!(app.gateway.calls("confirm_payment_intent"), confirms_before);

    // 4. Subscription creation succeeds against the attached method.
    let create_subscription = CreateSubscriptionHandler::new(
        app.users.clone(),
        app.payments.clone(),
        app.gateway.clone(),
    );
    let outcome = create_subscription
        .handle(CreateSubscriptionCommand {
            user_id: app.user_id,
            price_id: "price_monthly".to_string(),
        })
        .await
        .unwrap();

    let SubscriptionOutcome::Active { subscription_id } = outcome else {
        panic!("expected Active, got {:?}", outcome);
    };
    let record = app
        .payments
        .find_by_subscription_id(&subscription_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, BillingStatus::Succeeded);

    // 5. A later webhook reports past_due; local status follows.
    let event_at = record.last_event_at.unwrap().as_unix_secs() + 60;
    app.gateway.set_next_webhook_event(subscription_event(
        &subscription_id,
        GatewaySubscriptionStatus::PastDue,
        event_at,
    ));
    let webhook = HandleGatewayWebhookHandler::new(
        app.users.clone(),
        app.payments.clone(),
        app.gateway.clone(),
    );
    let outcome = webhook.handle(b"{}", "sig").await.unwrap();
    assert_eq!(outcome, WebhookOutcome::Processed(BillingStatus::Incomplete));

    // 6. An older event replayed afterwards cannot regress the status.
    app.gateway.set_next_webhook_event(subscription_event(
        &subscription_id,
        GatewaySubscriptionStatus::Active,
        event_at - 30,
    ));
    let outcome = webhook.handle(b"{}", "sig").await.unwrap();
    assert_eq!(outcome, WebhookOutcome::Processed(BillingStatus::Incomplete));

    let record = app
        .payments
        .find_by_subscription_id(&subscription_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, BillingStatus::Incomplete);
}

// =============================================================================
// HTTP Surface
// =============================================================================

mod http_surface {
    use super::*;

    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;
    use tower::ServiceExt;

    const JWT_SECRET: &str = "integration-test-secret-0123456789ab";

    #[derive(Serialize)]
    struct Claims {
        sub: String,
        exp: usize,
    }

    fn bearer_for(user_id: &UserId) -> String {
        let claims = Claims {
            sub: user_id.to_string(),
            exp: (chrono::Utc::now().timestamp() + 3600) as usize,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
        )
        .unwrap();
        format!("Bearer {}", token)
    }

    fn router(app: &TestApp) -> axum::Router {
        let state = BillingAppState {
            users: app.users.clone(),
            payments: app.payments.clone(),
            gateway: app.gateway.clone(),
            jwt: Arc::new(JwtVerifier::new(JWT_SECRET)),
            payment_config: Arc::new(PaymentConfig {
                subscription_price_id: Some("price_monthly".to_string()),
                ..Default::default()
            }),
        };
        axum::Router::new()
            .nest("/api", billing_router())
            .with_state(state)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1 << 20)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn create_payment_intent_returns_envelope() {
        let app = test_app();
        let router = router(&app);

        let request = Request::builder()
            .method("POST")
            .uri("/api/create-payment-intent")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, bearer_for(&app.user_id))
            .body(Body::from(
                r#"{"payment_method": "pm_card", "amount": 1000}"#,
            ))
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["status"], true);
        assert_eq!(json["data"]["status"], "succeeded");
        assert!(json["data"]["payment_intent_id"]
            .as_str()
            .unwrap()
            .starts_with("pi_"));
    }

    #[tokio::test]
    async fn requires_action_maps_to_http_402() {
        let app = test_app();
        app.gateway
            .set_next_intent_status(GatewayIntentStatus::RequiresAction);
        let router = router(&app);

        let request = Request::builder()
            .method("POST")
            .uri("/api/create-payment-intent")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, bearer_for(&app.user_id))
            .body(Body::from(
                r#"{"payment_method": "pm_card", "amount": 1000}"#,
            ))
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);

        let json = body_json(response).await;
        assert!(json["data"]["client_secret"].is_string());
    }

    #[tokio::test]
    async fn missing_bearer_token_is_rejected() {
        let app = test_app();
        let router = router(&app);

        let request = Request::builder()
            .method("POST")
            .uri("/api/subscribe")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let json = body_json(response).await;
        assert_eq!(json["status"], false);
        assert_eq!(json["error"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn subscribe_without_payment_method_is_bad_request() {
        let app = test_app();
        let router = router(&app);

        let request = Request::builder()
            .method("POST")
            .uri("/api/subscribe")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, bearer_for(&app.user_id))
            .body(Body::from("{}"))
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = body_json(response).await;
        assert_eq!(json["error"], "MISSING_PAYMENT_METHOD");
    }

    #[tokio::test]
    async fn webhook_without_signature_header_is_bad_request() {
        let app = test_app();
        let router = router(&app);

        let request = Request::builder()
            .method("POST")
            .uri("/api/webhooks/stripe")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn voting_eligibility_follows_billing_status() {
        let app = test_app();
        let router = router(&app);

        // Charge first so the record settles.
        let request = Request::builder()
            .method("POST")
            .uri("/api/create-payment-intent")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, bearer_for(&app.user_id))
            .body(Body::from(
                r#"{"payment_method": "pm_card", "amount": 1000}"#,
            ))
            .unwrap();
        router.clone().oneshot(request).await.unwrap();

        let request = Request::builder()
            .method("GET")
            .uri("/api/voting-eligibility")
            .header(header::AUTHORIZATION, bearer_for(&app.user_id))
            .body(Body::empty())
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["data"]["eligible"], true);
    }
}
