use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{RecipientStore, StoreError};
use crate::domain::recipient::RecipientRecord;
use crate::domain::recipient_email::RecipientEmail;

/// [`RecipientStore`] kept in a map behind a lock. Nothing survives a restart,
/// so it is only meant for development and tests.
#[derive(Clone, Default)]
pub struct InMemoryRecipientStore {
    records: Arc<RwLock<HashMap<Uuid, RecipientRecord>>>,
}

impl InMemoryRecipientStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record currently stored, soft-deleted ones included.
    pub async fn snapshot(&self) -> Vec<RecipientRecord> {
        self.records.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl RecipientStore for InMemoryRecipientStore {
    async fn upsert(&self, record: &RecipientRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        let was_deleted = records.get(&record.id).is_some_and(|stored| stored.is_deleted);
        let mut record = record.clone();

        record.is_deleted |= was_deleted;
        records.insert(record.id, record);

        Ok(())
    }

    async fn enroll_or_extend(
        &self,
        candidate: &RecipientRecord,
    ) -> Result<RecipientRecord, StoreError> {
        // Held across lookup and insert
        let mut records = self.records.write().await;
        let existing = records
            .values_mut()
            .filter(|record| {
                record.email == candidate.email && record.is_active_at(candidate.created_on)
            })
            .max_by_key(|record| record.expiry_date);

        let record = match existing {
            Some(existing) => {
                existing.expiry_date = candidate.expiry_date;
                existing.clone()
            }
            None => {
                records.insert(candidate.id, candidate.clone());
                candidate.clone()
            }
        };

        Ok(record)
    }

    async fn find(&self, id: Uuid) -> Result<Option<RecipientRecord>, StoreError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn find_active_by_email(
        &self,
        email: &RecipientEmail,
        now: DateTime<Utc>,
    ) -> Result<Option<RecipientRecord>, StoreError> {
        let records = self.records.read().await;

        Ok(records
            .values()
            .filter(|record| &record.email == email && record.is_active_at(now))
            .max_by_key(|record| record.expiry_date)
            .cloned())
    }

    async fn list_active(&self, now: DateTime<Utc>) -> Result<Vec<RecipientRecord>, StoreError> {
        let records = self.records.read().await;

        Ok(records
            .values()
            .filter(|record| record.is_active_at(now))
            .cloned()
            .collect())
    }

    async fn soft_delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut records = self.records.write().await;
        let mut affected = 0;

        for record in records.values_mut() {
            if record.expiry_date < now && !record.is_deleted {
                record.is_deleted = true;
                affected += 1;
            }
        }

        Ok(affected)
    }

    async fn hard_delete_older_than(&self, threshold: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut records = self.records.write().await;
        let before = records.len();

        records.retain(|_, record| record.expiry_date >= threshold);

        Ok((before - records.len()) as u64)
    }
}
