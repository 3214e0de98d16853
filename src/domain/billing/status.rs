//! Billing status for local payment records.
//!
//! The local mirror of the external payment lifecycle. Only the payment
//! intent lifecycle and subscription reconciliation components write this
//! status; everything else reads it.

use serde::{Deserialize, Serialize};

/// Local billing status derived from gateway states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingStatus {
    /// Intent created, confirmation outcome not yet known.
    Pending,

    /// Cardholder must complete an additional authentication step.
    /// A valid suspended state, not a failure.
    RequiresAction,

    /// First payment incomplete or past due; access withheld until it clears.
    Incomplete,

    /// Charge completed / subscription current.
    Succeeded,

    /// Collection paused at the subscriber's request.
    Paused,

    /// Subscription canceled or written off as unpaid.
    Canceled,

    /// Charge declined or otherwise terminally failed.
    Failed,
}

impl BillingStatus {
    /// Returns true if this status makes the owning user eligible to vote.
    ///
    /// Voting eligibility is the one place outside billing that consumes
    /// this status.
    pub fn grants_voting(&self) -> bool {
        matches!(self, BillingStatus::Succeeded)
    }

    /// Returns true for states that no further gateway event can leave.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BillingStatus::Canceled | BillingStatus::Failed)
    }

    /// Stable string form used for persistence.
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingStatus::Pending => "pending",
            BillingStatus::RequiresAction => "requires_action",
            BillingStatus::Incomplete => "incomplete",
            BillingStatus::Succeeded => "succeeded",
            BillingStatus::Paused => "paused",
            BillingStatus::Canceled => "canceled",
            BillingStatus::Failed => "failed",
        }
    }

    /// Parses the persisted string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(BillingStatus::Pending),
            "requires_action" => Some(BillingStatus::RequiresAction),
            "incomplete" => Some(BillingStatus::Incomplete),
            "succeeded" => Some(BillingStatus::Succeeded),
            "paused" => Some(BillingStatus::Paused),
            "canceled" => Some(BillingStatus::Canceled),
            "failed" => Some(BillingStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for BillingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [BillingStatus; 7] = [
        BillingStatus::Pending,
        BillingStatus::RequiresAction,
        BillingStatus::Incomplete,
        BillingStatus::Succeeded,
        BillingStatus::Paused,
        BillingStatus::Canceled,
        BillingStatus::Failed,
    ];

    #[test]
    fn only_succeeded_grants_voting() {
        for status in ALL {
            assert_eq!(
                status.grants_voting(),
                status == BillingStatus::Succeeded,
                "voting eligibility wrong for {:?}",
                status
            );
        }
    }

    #[test]
    fn persistence_round_trip_is_total() {
        for status in ALL {
            assert_eq!(BillingStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn parse_rejects_unknown_value() {
        assert_eq!(BillingStatus::parse("trialing"), None);
    }

    #[test]
    fn terminal_states() {
        assert!(BillingStatus::Canceled.is_terminal());
        assert!(BillingStatus::Failed.is_terminal());
        assert!(!BillingStatus::Paused.is_terminal());
        assert!(!BillingStatus::Succeeded.is_terminal());
    }
}
