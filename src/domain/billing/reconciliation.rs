//! Subscription status reconciliation.
//!
//! The single consolidated mapping from the gateway's status vocabulary to
//! the local [`BillingStatus`], plus the merge rule that makes webhook and
//! synchronous updates converge regardless of arrival order.
//!
//! # Design
//!
//! - **One mapping**: every place that observes a gateway status goes
//!   through [`SubscriptionObservation::local_status`]. No caller derives
//!   status on its own.
//! - **Last-write-wins by event time**: an observation carries the
//!   gateway's event timestamp; [`supersedes`] decides whether it may
//!   replace the stored one. Arrival order is irrelevant.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::Timestamp;

use super::BillingStatus;

/// Subscription status vocabulary as reported by the gateway.
///
/// The vocabulary is treated as fixed; anything outside it parses to
/// `Unknown` and maps to the safe local default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewaySubscriptionStatus {
    Active,
    Incomplete,
    IncompleteExpired,
    PastDue,
    Canceled,
    Unpaid,
    Unknown,
}

impl GatewaySubscriptionStatus {
    /// Parses the wire form, mapping unrecognized values to `Unknown`.
    pub fn from_wire(s: &str) -> Self {
        match s {
            "active" => GatewaySubscriptionStatus::Active,
            "incomplete" => GatewaySubscriptionStatus::Incomplete,
            "incomplete_expired" => GatewaySubscriptionStatus::IncompleteExpired,
            "past_due" => GatewaySubscriptionStatus::PastDue,
            "canceled" => GatewaySubscriptionStatus::Canceled,
            "unpaid" => GatewaySubscriptionStatus::Unpaid,
            _ => GatewaySubscriptionStatus::Unknown,
        }
    }
}

/// Payment intent status vocabulary as reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayIntentStatus {
    Succeeded,
    RequiresAction,
    Processing,
    RequiresPaymentMethod,
    RequiresConfirmation,
    Canceled,
    Unknown,
}

impl GatewayIntentStatus {
    /// Parses the wire form, mapping unrecognized values to `Unknown`.
    pub fn from_wire(s: &str) -> Self {
        match s {
            "succeeded" => GatewayIntentStatus::Succeeded,
            "requires_action" => GatewayIntentStatus::RequiresAction,
            "processing" => GatewayIntentStatus::Processing,
            "requires_payment_method" => GatewayIntentStatus::RequiresPaymentMethod,
            "requires_confirmation" => GatewayIntentStatus::RequiresConfirmation,
            "canceled" => GatewayIntentStatus::Canceled,
            _ => GatewayIntentStatus::Unknown,
        }
    }

    /// Maps a one-time intent status to the local billing status.
    pub fn local_status(&self) -> BillingStatus {
        match self {
            GatewayIntentStatus::Succeeded => BillingStatus::Succeeded,
            GatewayIntentStatus::RequiresAction => BillingStatus::RequiresAction,
            GatewayIntentStatus::Processing | GatewayIntentStatus::RequiresConfirmation => {
                BillingStatus::Pending
            }
            GatewayIntentStatus::RequiresPaymentMethod | GatewayIntentStatus::Canceled => {
                BillingStatus::Failed
            }
            GatewayIntentStatus::Unknown => BillingStatus::Pending,
        }
    }
}

/// A point-in-time view of a subscription as reported by the gateway.
///
/// Built by the gateway adapter from a retrieve call or a webhook payload;
/// the rest of the system never sees raw gateway responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionObservation {
    /// External subscription ID.
    pub subscription_id: String,

    /// The subscription's own status.
    pub status: GatewaySubscriptionStatus,

    /// Whether a pause-collection attribute is present.
    pub pause_collection: bool,

    /// Status of the first invoice's payment intent, when expanded.
    pub latest_intent_status: Option<GatewayIntentStatus>,

    /// Client secret of the first invoice's intent, when further action
    /// is needed.
    pub client_secret: Option<String>,

    /// Redirect URL for out-of-band authentication, when provided.
    pub redirect_url: Option<String>,

    /// Gateway-side event time. The ordering key for reconciliation.
    pub observed_at: Timestamp,
}

impl SubscriptionObservation {
    /// Derives the local billing status for this observation.
    ///
    /// Precedence: a `requires_action` first-invoice intent wins over the
    /// subscription's own status; a pause-collection attribute wins over
    /// `active`; everything else follows the fixed table, with unknown
    /// statuses falling back to `Incomplete`.
    pub fn local_status(&self) -> BillingStatus {
        if self.latest_intent_status == Some(GatewayIntentStatus::RequiresAction) {
            return BillingStatus::RequiresAction;
        }

        match self.status {
            GatewaySubscriptionStatus::Active => {
                if self.pause_collection {
                    BillingStatus::Paused
                } else {
                    BillingStatus::Succeeded
                }
            }
            GatewaySubscriptionStatus::Incomplete
            | GatewaySubscriptionStatus::IncompleteExpired
            | GatewaySubscriptionStatus::PastDue => BillingStatus::Incomplete,
            GatewaySubscriptionStatus::Canceled | GatewaySubscriptionStatus::Unpaid => {
                BillingStatus::Canceled
            }
            GatewaySubscriptionStatus::Unknown => BillingStatus::Incomplete,
        }
    }
}

/// Last-write-wins merge rule keyed on gateway event time.
///
/// Returns true when an observation at `incoming` may replace state last
/// written at `stored`. Ties keep the stored value, so re-applying the
/// same event is a strict no-op.
pub fn supersedes(incoming: Timestamp, stored: Option<Timestamp>) -> bool {
    match stored {
        None => true,
        Some(stored) => incoming.is_after(&stored),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observation(
        status: GatewaySubscriptionStatus,
        pause_collection: bool,
        latest_intent_status: Option<GatewayIntentStatus>,
        observed_at: i64,
    ) -> SubscriptionObservation {
        SubscriptionObservation {
            subscription_id: "sub_test".to_string(),
            status,
            pause_collection,
            latest_intent_status,
            client_secret: None,
            redirect_url: None,
            observed_at: Timestamp::from_unix_secs(observed_at),
        }
    }

    // Mapping table

    #[test]
    fn active_maps_to_succeeded() {
        let obs = observation(GatewaySubscriptionStatus::Active, false, None, 1);
        assert_eq!(obs.local_status(), BillingStatus::Succeeded);
    }

    #[test]
    fn incomplete_variants_map_to_incomplete() {
        for status in [
            GatewaySubscriptionStatus::Incomplete,
            GatewaySubscriptionStatus::IncompleteExpired,
            GatewaySubscriptionStatus::PastDue,
        ] {
            let obs = observation(status, false, None, 1);
            assert_eq!(obs.local_status(), BillingStatus::Incomplete);
        }
    }

    #[test]
    fn canceled_and_unpaid_map_to_canceled() {
        for status in [
            GatewaySubscriptionStatus::Canceled,
            GatewaySubscriptionStatus::Unpaid,
        ] {
            let obs = observation(status, false, None, 1);
            assert_eq!(obs.local_status(), BillingStatus::Canceled);
        }
    }

    #[test]
    fn pause_collection_overrides_active() {
        let obs = observation(GatewaySubscriptionStatus::Active, true, None, 1);
        assert_eq!(obs.local_status(), BillingStatus::Paused);
    }

    #[test]
    fn pause_collection_does_not_override_canceled() {
        let obs = observation(GatewaySubscriptionStatus::Canceled, true, None, 1);
        assert_eq!(obs.local_status(), BillingStatus::Canceled);
    }

    #[test]
    fn requires_action_intent_overrides_subscription_status() {
        for status in [
            GatewaySubscriptionStatus::Active,
            GatewaySubscriptionStatus::Incomplete,
            GatewaySubscriptionStatus::PastDue,
        ] {
            let obs = observation(status, false, Some(GatewayIntentStatus::RequiresAction), 1);
            assert_eq!(obs.local_status(), BillingStatus::RequiresAction);
        }
    }

    #[test]
    fn unknown_status_maps_to_safe_default() {
        let obs = observation(GatewaySubscriptionStatus::Unknown, false, None, 1);
        assert_eq!(obs.local_status(), BillingStatus::Incomplete);
    }

    #[test]
    fn wire_parsing_is_total() {
        assert_eq!(
            GatewaySubscriptionStatus::from_wire("active"),
            GatewaySubscriptionStatus::Active
        );
        assert_eq!(
            GatewaySubscriptionStatus::from_wire("paused_by_martians"),
            GatewaySubscriptionStatus::Unknown
        );
        assert_eq!(
            GatewayIntentStatus::from_wire("requires_action"),
            GatewayIntentStatus::RequiresAction
        );
        assert_eq!(
            GatewayIntentStatus::from_wire("???"),
            GatewayIntentStatus::Unknown
        );
    }

    // Intent mapping

    #[test]
    fn intent_statuses_map_per_table() {
        assert_eq!(
            GatewayIntentStatus::Succeeded.local_status(),
            BillingStatus::Succeeded
        );
        assert_eq!(
            GatewayIntentStatus::RequiresAction.local_status(),
            BillingStatus::RequiresAction
        );
        assert_eq!(
            GatewayIntentStatus::Processing.local_status(),
            BillingStatus::Pending
        );
        assert_eq!(
            GatewayIntentStatus::RequiresPaymentMethod.local_status(),
            BillingStatus::Failed
        );
        assert_eq!(
            GatewayIntentStatus::Canceled.local_status(),
            BillingStatus::Failed
        );
        assert_eq!(
            GatewayIntentStatus::Unknown.local_status(),
            BillingStatus::Pending
        );
    }

    // Merge rule

    #[test]
    fn first_observation_always_applies() {
        assert!(supersedes(Timestamp::from_unix_secs(1), None));
    }

    #[test]
    fn newer_observation_supersedes_older() {
        let stored = Some(Timestamp::from_unix_secs(10));
        assert!(supersedes(Timestamp::from_unix_secs(11), stored));
        assert!(!supersedes(Timestamp::from_unix_secs(9), stored));
    }

    #[test]
    fn equal_timestamps_keep_stored_value() {
        let stored = Some(Timestamp::from_unix_secs(10));
        assert!(!supersedes(Timestamp::from_unix_secs(10), stored));
    }

    // Order-independence: applying any permutation of a set of observations
    // through the merge rule must converge to the newest one's status.

    fn apply_all(
        observations: &[SubscriptionObservation],
    ) -> (Option<BillingStatus>, Option<Timestamp>) {
        let mut status = None;
        let mut last_event_at = None;
        for obs in observations {
            if supersedes(obs.observed_at, last_event_at) {
                status = Some(obs.local_status());
                last_event_at = Some(obs.observed_at);
            }
        }
        (status, last_event_at)
    }

    #[test]
    fn out_of_order_events_converge() {
        let e1 = observation(GatewaySubscriptionStatus::Incomplete, false, None, 1);
        let e2 = observation(GatewaySubscriptionStatus::Active, false, None, 2);

        let (in_order, _) = apply_all(&[e1.clone(), e2.clone()]);
        let (reversed, _) = apply_all(&[e2, e1]);

        assert_eq!(in_order, Some(BillingStatus::Succeeded));
        assert_eq!(reversed, Some(BillingStatus::Succeeded));
    }

    #[test]
    fn duplicate_events_are_no_ops() {
        let e = observation(GatewaySubscriptionStatus::Active, false, None, 5);
        let (once, _) = apply_all(&[e.clone()]);
        let (twice, _) = apply_all(&[e.clone(), e]);
        assert_eq!(once, twice);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn arb_status() -> impl Strategy<Value = GatewaySubscriptionStatus> {
            prop_oneof![
                Just(GatewaySubscriptionStatus::Active),
                Just(GatewaySubscriptionStatus::Incomplete),
                Just(GatewaySubscriptionStatus::IncompleteExpired),
                Just(GatewaySubscriptionStatus::PastDue),
                Just(GatewaySubscriptionStatus::Canceled),
                Just(GatewaySubscriptionStatus::Unpaid),
                Just(GatewaySubscriptionStatus::Unknown),
            ]
        }

        fn arb_observation() -> impl Strategy<Value = SubscriptionObservation> {
            (arb_status(), any::<bool>(), 0i64..100_000).prop_map(|(status, paused, at)| {
                SubscriptionObservation {
                    subscription_id: "sub_prop".to_string(),
                    status,
                    pause_collection: paused,
                    latest_intent_status: None,
                    client_secret: None,
                    redirect_url: None,
                    observed_at: Timestamp::from_unix_secs(at),
                }
            })
        }

        proptest! {
            // Any permutation of distinct-timestamp events converges to the
            // status of the event with the greatest timestamp.
            #[test]
            fn permutations_converge(
                mut events in proptest::collection::vec(arb_observation(), 1..8),
                seed in any::<u64>(),
            ) {
                // Deduplicate timestamps so "newest" is well defined.
                events.sort_by_key(|e| e.observed_at);
                events.dedup_by_key(|e| e.observed_at);

                let newest = events
                    .iter()
                    .max_by_key(|e| e.observed_at)
                    .cloned()
                    .unwrap();

                // Cheap deterministic shuffle.
                let mut shuffled = events.clone();
                let len = shuffled.len();
                for i in 0..len {
                    let j = ((seed as usize).wrapping_mul(31).wrapping_add(i * 17)) % len;
                    shuffled.swap(i, j);
                }

                let (in_order, _) = apply_all(&events);
                let (out_of_order, _) = apply_all(&shuffled);

                prop_assert_eq!(in_order, Some(newest.local_status()));
                prop_assert_eq!(out_of_order, Some(newest.local_status()));
            }

            // Applying the same sequence twice changes nothing.
            #[test]
            fn reapplication_is_idempotent(
                events in proptest::collection::vec(arb_observation(), 1..8),
            ) {
                let (first, _) = apply_all(&events);
                let doubled: Vec<_> =
                    events.iter().chain(events.iter()).cloned().collect();
                let (second, _) = apply_all(&doubled);
                prop_assert_eq!(first, second);
            }
        }
    }
}
