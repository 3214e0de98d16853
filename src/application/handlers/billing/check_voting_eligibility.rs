//! CheckVotingEligibilityHandler - The one external consumer of billing
//! status: voting gates on a settled payment.

use std::sync::Arc;

use crate::domain::billing::BillingError;
use crate::domain::foundation::UserId;
use crate::ports::PaymentRepository;

/// Result of an eligibility check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VotingEligibility {
    pub eligible: bool,
}

/// Query handler for voting eligibility.
pub struct CheckVotingEligibilityHandler {
    payments: Arc<dyn PaymentRepository>,
}

impl CheckVotingEligibilityHandler {
    pub fn new(payments: Arc<dyn PaymentRepository>) -> Self {
        Self { payments }
    }

    pub async fn handle(&self, user_id: &UserId) -> Result<VotingEligibility, BillingError> {
        let eligible = self
            .payments
            .find_active_for_user(user_id)
            .await?
            .map(|record| record.grants_voting())
            .unwrap_or(false);

        Ok(VotingEligibility { eligible })
    }
}
