//! In-memory implementation of PaymentRepository.
//!
//! Backs tests and local development. A single mutex serializes all
//! operations, which trivially satisfies the per-user ordering and the
//! compare-and-set atomicity the port requires.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::billing::{supersedes, BillingStatus, PaymentRecord};
use crate::domain::foundation::{DomainError, ErrorCode, PaymentId, Timestamp, UserId};
use crate::ports::PaymentRepository;

/// In-memory PaymentRepository.
#[derive(Default)]
pub struct InMemoryPaymentRepository {
    records: Mutex<HashMap<PaymentId, PaymentRecord>>,
}

impl InMemoryPaymentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record.
    pub fn insert(&self, record: PaymentRecord) {
        self.records.lock().unwrap().insert(record.id, record);
    }

    /// Snapshot of all records, for assertions.
    pub fn all(&self) -> Vec<PaymentRecord> {
        self.records.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl PaymentRepository for InMemoryPaymentRepository {
    async fn upsert_active(&self, record: &PaymentRecord) -> Result<(), DomainError> {
        let mut records = self.records.lock().unwrap();
        // One active record per user: replace any existing record owned
        // by the same user.
        records.retain(|_, r| r.user_id != record.user_id || r.id == record.id);
        records.insert(record.id, record.clone());
        Ok(())
    }

    async fn update(&self, record: &PaymentRecord) -> Result<(), DomainError> {
        let mut records = self.records.lock().unwrap();
        if !records.contains_key(&record.id) {
            return Err(DomainError::new(
                ErrorCode::PaymentNotFound,
                "Payment record not found",
            ));
        }
        records.insert(record.id, record.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &PaymentId) -> Result<Option<PaymentRecord>, DomainError> {
        Ok(self.records.lock().unwrap().get(id).cloned())
    }

    async fn find_active_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<PaymentRecord>, DomainError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .find(|r| &r.user_id == user_id)
            .cloned())
    }

    async fn find_by_intent_id(
        &self,
        intent_id: &str,
    ) -> Result<Option<PaymentRecord>, DomainError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .find(|r| r.payment_intent_id == intent_id)
            .cloned())
    }

    async fn find_by_subscription_id(
        &self,
        subscription_id: &str,
    ) -> Result<Option<PaymentRecord>, DomainError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .find(|r| r.subscription_id.as_deref() == Some(subscription_id))
            .cloned())
    }

    async fn apply_status_if_newer(
        &self,
        subscription_id: &str,
        status: BillingStatus,
        client_secret: Option<&str>,
        event_time: Timestamp,
    ) -> Result<bool, DomainError> {
        let mut records = self.records.lock().unwrap();
        let record = records
            .values_mut()
            .find(|r| r.subscription_id.as_deref() == Some(subscription_id));

        match record {
            Some(record) => {
                if !supersedes(event_time, record.last_event_at) {
                    return Ok(false);
                }
                record.status = status;
                record.client_secret = client_secret.map(str::to_string);
                record.last_event_at = Some(event_time);
                record.updated_at = Timestamp::now();
                Ok(true)
            }
            None => Err(DomainError::new(
                ErrorCode::PaymentNotFound,
                "No payment record for subscription",
            )),
        }
    }
}
