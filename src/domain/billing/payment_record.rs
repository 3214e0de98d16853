//! PaymentRecord aggregate - local mirror of one payment attempt.
//!
//! The gateway owns the billing truth; a PaymentRecord is a cache that is
//! reconciled against it, never a source of truth for money movement.

use crate::domain::foundation::{PaymentId, Timestamp, UserId};

use super::reconciliation::{GatewayIntentStatus, SubscriptionObservation};
use super::{supersedes, BillingStatus, IntentOutcome};

/// Local record of one payment attempt and, once created, the
/// subscription it funds.
///
/// One active record per user in the single-subscription product model;
/// the repository serializes create-or-update per user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRecord {
    pub id: PaymentId,
    pub user_id: UserId,
    pub payment_intent_id: String,
    pub payment_method_id: Option<String>,
    pub gateway_customer_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub subscription_id: Option<String>,
    pub status: BillingStatus,
    /// Gateway event time of the last applied reconciliation.
    pub last_event_at: Option<Timestamp>,
    /// Client secret of the intent while further action is pending.
    pub client_secret: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl PaymentRecord {
    /// Creates a record for a freshly created payment intent.
    pub fn for_intent(
        user_id: UserId,
        payment_intent_id: impl Into<String>,
        payment_method_id: Option<String>,
        gateway_customer_id: impl Into<String>,
        amount_cents: i64,
        currency: impl Into<String>,
    ) -> Self {
        let now = Timestamp::now();
        Self {
            id: PaymentId::new(),
            user_id,
            payment_intent_id: payment_intent_id.into(),
            payment_method_id,
            gateway_customer_id: gateway_customer_id.into(),
            amount_cents,
            currency: currency.into(),
            subscription_id: None,
            status: BillingStatus::Pending,
            last_event_at: None,
            client_secret: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Records the outcome of an intent create/confirm round-trip.
    pub fn record_intent_status(
        &mut self,
        status: GatewayIntentStatus,
        client_secret: Option<String>,
    ) {
        self.status = status.local_status();
        self.client_secret = if self.status == BillingStatus::RequiresAction {
            client_secret
        } else {
            None
        };
        self.updated_at = Timestamp::now();
    }

    /// Records the outcome of the create-and-confirm flow.
    pub fn record_outcome(&mut self, outcome: &IntentOutcome) {
        self.status = outcome.billing_status();
        self.client_secret = match outcome {
            IntentOutcome::RequiresAction { client_secret, .. } => Some(client_secret.clone()),
            _ => None,
        };
        self.updated_at = Timestamp::now();
    }

    /// Links the record to the subscription it funds.
    pub fn link_subscription(&mut self, subscription_id: impl Into<String>) {
        self.subscription_id = Some(subscription_id.into());
        self.updated_at = Timestamp::now();
    }

    /// Applies a reconciliation observation under the last-write-wins rule.
    ///
    /// Returns true when the observation superseded the stored state.
    /// Stale and duplicate observations leave the record untouched.
    pub fn apply_observation(&mut self, observation: &SubscriptionObservation) -> bool {
        if !supersedes(observation.observed_at, self.last_event_at) {
            return false;
        }
        self.status = observation.local_status();
        self.client_secret = observation.client_secret.clone();
        self.last_event_at = Some(observation.observed_at);
        self.updated_at = Timestamp::now();
        true
    }

    /// Whether this record currently makes its owner eligible to vote.
    pub fn grants_voting(&self) -> bool {
        self.status.grants_voting()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::GatewaySubscriptionStatus;

    fn record() -> PaymentRecord {
        PaymentRecord::for_intent(
            UserId::new(),
            "pi_test",
            Some("pm_test".to_string()),
            "cus_test",
            1000,
            "usd",
        )
    }

    fn obs(status: GatewaySubscriptionStatus, at: i64) -> SubscriptionObservation {
        SubscriptionObservation {
            subscription_id: "sub_test".to_string(),
            status,
            pause_collection: false,
            latest_intent_status: None,
            client_secret: None,
            redirect_url: None,
            observed_at: Timestamp::from_unix_secs(at),
        }
    }

    #[test]
    fn new_record_starts_pending() {
        let r = record();
        assert_eq!(r.status, BillingStatus::Pending);
        assert!(r.subscription_id.is_none());
        assert!(r.last_event_at.is_none());
    }

    #[test]
    fn intent_success_clears_client_secret() {
        let mut r = record();
        r.record_intent_status(
            GatewayIntentStatus::RequiresAction,
            Some("pi_test_secret".to_string()),
        );
        assert_eq!(r.status, BillingStatus::RequiresAction);
        assert_eq!(r.client_secret.as_deref(), Some("pi_test_secret"));

        r.record_intent_status(GatewayIntentStatus::Succeeded, None);
        assert_eq!(r.status, BillingStatus::Succeeded);
        assert!(r.client_secret.is_none());
    }

    #[test]
    fn observation_updates_status_and_event_time() {
        let mut r = record();
        let applied = r.apply_observation(&obs(GatewaySubscriptionStatus::Active, 10));

        assert!(applied);
        assert_eq!(r.status, BillingStatus::Succeeded);
        assert_eq!(r.last_event_at, Some(Timestamp::from_unix_secs(10)));
    }

    #[test]
    fn stale_observation_is_discarded() {
        let mut r = record();
        assert!(r.apply_observation(&obs(GatewaySubscriptionStatus::Active, 10)));
        assert!(!r.apply_observation(&obs(GatewaySubscriptionStatus::PastDue, 5)));

        assert_eq!(r.status, BillingStatus::Succeeded);
        assert_eq!(r.last_event_at, Some(Timestamp::from_unix_secs(10)));
    }

    #[test]
    fn duplicate_observation_is_discarded() {
        let mut r = record();
        let event = obs(GatewaySubscriptionStatus::Active, 10);
        assert!(r.apply_observation(&event));
        assert!(!r.apply_observation(&event));
    }

    #[test]
    fn newer_observation_supersedes() {
        let mut r = record();
        assert!(r.apply_observation(&obs(GatewaySubscriptionStatus::Active, 10)));
        assert!(r.apply_observation(&obs(GatewaySubscriptionStatus::PastDue, 11)));
        assert_eq!(r.status, BillingStatus::Incomplete);
    }

    #[test]
    fn voting_follows_status() {
        let mut r = record();
        assert!(!r.grants_voting());
        r.record_intent_status(GatewayIntentStatus::Succeeded, None);
        assert!(r.grants_voting());
    }
}
