//! Payment repository port (write side).
//!
//! Persistence contract for PaymentRecord. All status writes flow through
//! this port; the reconcile path uses the compare-and-set operation so
//! concurrent webhook and user-initiated updates converge.

use async_trait::async_trait;

use crate::domain::billing::{BillingStatus, PaymentRecord};
use crate::domain::foundation::{DomainError, PaymentId, Timestamp, UserId};

/// Repository port for PaymentRecord persistence.
///
/// Implementations must ensure:
/// - Per-user serialization of `upsert_active` (advisory lock or
///   equivalent single-row transactional update)
/// - Atomic event-time compare-and-set in `apply_status_if_newer`
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Create or replace the user's active billing record.
    ///
    /// Two concurrent calls for the same user must not both create
    /// divergent active records.
    async fn upsert_active(&self, record: &PaymentRecord) -> Result<(), DomainError>;

    /// Update an existing record in place (same id).
    async fn update(&self, record: &PaymentRecord) -> Result<(), DomainError>;

    /// Find a record by its ID.
    async fn find_by_id(&self, id: &PaymentId) -> Result<Option<PaymentRecord>, DomainError>;

    /// Find the user's active billing record.
    async fn find_active_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<PaymentRecord>, DomainError>;

    /// Find a record by gateway payment intent ID.
    async fn find_by_intent_id(
        &self,
        intent_id: &str,
    ) -> Result<Option<PaymentRecord>, DomainError>;

    /// Find a record by gateway subscription ID.
    async fn find_by_subscription_id(
        &self,
        subscription_id: &str,
    ) -> Result<Option<PaymentRecord>, DomainError>;

    /// Apply a reconciled status if the event time is newer than the
    /// stored one (last-write-wins by external event time).
    ///
    /// Returns true when the update was applied, false when discarded as
    /// stale. Must be atomic with respect to concurrent callers.
    async fn apply_status_if_newer(
        &self,
        subscription_id: &str,
        status: BillingStatus,
        client_secret: Option<&str>,
        event_time: Timestamp,
    ) -> Result<bool, DomainError>;
}
