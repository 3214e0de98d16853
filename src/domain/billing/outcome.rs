//! Discriminated outcomes for payment and subscription operations.
//!
//! Callers pattern-match on these instead of catching exceptions; the
//! requires-action branch is an expected state, not an error.

use serde::{Deserialize, Serialize};

use super::BillingStatus;

/// Outcome of creating and confirming a one-time payment intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IntentOutcome {
    /// Charge completed.
    Succeeded { intent_id: String },

    /// Strong customer authentication needed. The flow pauses until an
    /// out-of-band confirmation arrives.
    RequiresAction {
        intent_id: String,
        client_secret: String,
        redirect_url: Option<String>,
    },

    /// Declined or otherwise terminal.
    Failed { intent_id: String, reason: String },
}

impl IntentOutcome {
    /// The intent this outcome refers to.
    pub fn intent_id(&self) -> &str {
        match self {
            IntentOutcome::Succeeded { intent_id }
            | IntentOutcome::RequiresAction { intent_id, .. }
            | IntentOutcome::Failed { intent_id, .. } => intent_id,
        }
    }

    /// The billing status this outcome persists as.
    pub fn billing_status(&self) -> BillingStatus {
        match self {
            IntentOutcome::Succeeded { .. } => BillingStatus::Succeeded,
            IntentOutcome::RequiresAction { .. } => BillingStatus::RequiresAction,
            IntentOutcome::Failed { .. } => BillingStatus::Failed,
        }
    }
}

/// Outcome of creating a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubscriptionOutcome {
    /// Subscription is current; first invoice settled.
    Active { subscription_id: String },

    /// First invoice's payment needs cardholder authentication.
    RequiresAction {
        subscription_id: String,
        client_secret: Option<String>,
        redirect_url: Option<String>,
    },

    /// Created but not yet funded (incomplete, paused, or already
    /// canceled at the gateway). Carries the mapped local status.
    Incomplete {
        subscription_id: String,
        status: BillingStatus,
    },
}

impl SubscriptionOutcome {
    /// The subscription this outcome refers to.
    pub fn subscription_id(&self) -> &str {
        match self {
            SubscriptionOutcome::Active { subscription_id }
            | SubscriptionOutcome::RequiresAction {
                subscription_id, ..
            }
            | SubscriptionOutcome::Incomplete {
                subscription_id, ..
            } => subscription_id,
        }
    }

    /// The billing status this outcome persists as.
    pub fn billing_status(&self) -> BillingStatus {
        match self {
            SubscriptionOutcome::Active { .. } => BillingStatus::Succeeded,
            SubscriptionOutcome::RequiresAction { .. } => BillingStatus::RequiresAction,
            SubscriptionOutcome::Incomplete { status, .. } => *status,
        }
    }
}
