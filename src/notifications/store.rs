use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use crate::{
    errors::StoreError,
    models::{failure::FailedNotification, status::FailureStatus},
};

#[async_trait]
pub trait FailureStore: Send + Sync {
    /// Inserts the record unless one with the same delivery id exists.
    /// Returns whether a new record was written; duplicates are not errors.
    async fn persist(&self, failure: FailedNotification) -> Result<bool, StoreError>;

    async fn list_by_status(
        &self,
        status: FailureStatus,
        limit: usize,
    ) -> Result<Vec<FailedNotification>, StoreError>;
}

#[derive(Debug, Default)]
pub struct InMemoryFailureStore {
    records: DashMap<Uuid, FailedNotification>,
}

impl InMemoryFailureStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, delivery_id: &Uuid) -> Option<FailedNotification> {
        self.records.get(delivery_id).map(|record| record.value().clone())
    }
}

#[async_trait]
impl FailureStore for InMemoryFailureStore {
    async fn persist(&self, failure: FailedNotification) -> Result<bool, StoreError> {
        let mut inserted = false;
        self.records.entry(failure.delivery_id).or_insert_with(|| {
            inserted = true;
            failure
        });
        Ok(inserted)
    }

    async fn list_by_status(
        &self,
        status: FailureStatus,
        limit: usize,
    ) -> Result<Vec<FailedNotification>, StoreError> {
        let mut records: Vec<FailedNotification> = self
            .records
            .iter()
            .filter(|record| record.status == status)
            .map(|record| record.value().clone())
            .collect();

        records.sort_by_key(|record| record.first_failed_at);
        records.truncate(limit);
        Ok(records)
    }
}
