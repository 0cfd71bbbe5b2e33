use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use crate::domain::recipient::RecipientRecord;
use crate::domain::recipient_email::RecipientEmail;
use crate::store::{RecipientStore, StoreError};

/// Drives recipient records through their lifecycle:
///
/// ```text
/// active --(expiry passes)--> expired-pending --expire()--> soft-deleted --purge()--> purged
/// ```
///
/// The first transition is never written; it is recomputed from `expiry_date`
/// on every query. No transition moves backwards.
#[derive(Clone)]
pub struct RecipientLifecycle {
    store: Arc<dyn RecipientStore>,
}

impl RecipientLifecycle {
    pub fn new(store: Arc<dyn RecipientStore>) -> Self {
        Self { store }
    }

    /// Enrolls `email` for `window` starting at `now`. An address that already
    /// has an active record gets its expiry pushed forward instead of a second
    /// record, so it never receives two greetings in the same cycle. The store
    /// makes lookup and write atomic per address.
    #[tracing::instrument(
        name = "Enroll a recipient",
        skip(self, email),
        fields(recipient_email = %email)
    )]
    pub async fn enroll(
        &self,
        email: RecipientEmail,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<RecipientRecord, EnrollError> {
        let candidate = RecipientRecord::new(email, window, now)
            .ok_or(EnrollError::WindowOutOfRange(window))?;

        Ok(self.store.enroll_or_extend(&candidate).await?)
    }

    pub async fn active_recipients(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<RecipientRecord>, StoreError> {
        self.store.list_active(now).await
    }

    /// Soft-deletes every record whose expiry is before `now`.
    pub async fn expire(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let expired = self.store.soft_delete_expired(now).await?;

        tracing::info!(expired, "Expired recipients soft deleted");

        Ok(expired)
    }

    /// Permanently removes records that expired before `threshold`. Not part
    /// of the daily cycle.
    pub async fn purge(&self, threshold: DateTime<Utc>) -> Result<u64, StoreError> {
        let purged = self.store.hard_delete_older_than(threshold).await?;

        tracing::info!(purged, %threshold, "Expired recipients purged");

        Ok(purged)
    }
}

#[derive(thiserror::Error)]
pub enum EnrollError {
    #[error("An enrollment window of {0} ends past the supported date range.")]
    WindowOutOfRange(Duration),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl std::fmt::Debug for EnrollError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnrollError::WindowOutOfRange(_) => write!(f, "Caused by:\n\t({})", self),
            EnrollError::Store(err) => write!(f, "{:?}", err),
        }
    }
}
