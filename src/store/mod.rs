use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::recipient::RecipientRecord;
use crate::domain::recipient_email::RecipientEmail;

pub mod memory;
pub mod postgres;

pub use memory::InMemoryRecipientStore;
pub use postgres::PgRecipientStore;

/// Persistence for recipient records.
///
/// Every operation is parameterized and reports failures through
/// [`StoreError`]; callers decide whether a failure is fatal.
#[async_trait]
pub trait RecipientStore: Send + Sync {
    /// Inserts `record`, or replaces the stored fields when its id already
    /// exists. A soft-deleted record stays soft-deleted.
    async fn upsert(&self, record: &RecipientRecord) -> Result<(), StoreError>;

    /// Pushes the expiry of the active record of `candidate.email` out to
    /// `candidate.expiry_date`, or stores `candidate` when the address has no
    /// active record as of `candidate.created_on`. Lookup and write are atomic
    /// per address, so concurrent enrollments never leave two active records.
    async fn enroll_or_extend(
        &self,
        candidate: &RecipientRecord,
    ) -> Result<RecipientRecord, StoreError>;

    async fn find(&self, id: Uuid) -> Result<Option<RecipientRecord>, StoreError>;

    async fn find_active_by_email(
        &self,
        email: &RecipientEmail,
        now: DateTime<Utc>,
    ) -> Result<Option<RecipientRecord>, StoreError>;

    /// Records not soft-deleted whose expiry is after `now`.
    async fn list_active(&self, now: DateTime<Utc>) -> Result<Vec<RecipientRecord>, StoreError>;

    /// Flags every record with `expiry_date < now` as deleted. Returns how many
    /// records changed state.
    async fn soft_delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;

    /// Permanently removes every record with `expiry_date < threshold`.
    async fn hard_delete_older_than(&self, threshold: DateTime<Utc>) -> Result<u64, StoreError>;
}

#[derive(thiserror::Error)]
pub enum StoreError {
    #[error("Failed to execute a query against the recipients table.")]
    Database(#[from] sqlx::Error),
    #[error("Recipient {0} holds an invalid record: {1}")]
    InvalidRecord(Uuid, String),
}

impl std::fmt::Debug for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Database(err) => write!(f, "Caused by:\n\t({})\n\t({})", self, err),
            StoreError::InvalidRecord(..) => write!(f, "Caused by:\n\t({})", self),
        }
    }
}
