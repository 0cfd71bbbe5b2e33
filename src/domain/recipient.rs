use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::domain::recipient_email::RecipientEmail;
use crate::domain::recipient_state::RecipientState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientRecord {
    pub id: Uuid,
    pub email: RecipientEmail,
    pub expiry_date: DateTime<Utc>,
    pub created_on: DateTime<Utc>,
    pub is_deleted: bool,
}

impl RecipientRecord {
    /// Fresh record for `email`, eligible for sends until `now + window`.
    /// `None` when that instant is out of the representable range.
    pub fn new(email: RecipientEmail, window: Duration, now: DateTime<Utc>) -> Option<Self> {
        Some(Self {
            id: Uuid::new_v4(),
            email,
            expiry_date: now.checked_add_signed(window)?,
            created_on: now,
            is_deleted: false,
        })
    }

    pub fn state_at(&self, now: DateTime<Utc>) -> RecipientState {
        if self.is_deleted {
            RecipientState::SoftDeleted
        } else if self.expiry_date > now {
            RecipientState::Active
        } else {
            RecipientState::ExpiredPending
        }
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.state_at(now).is_active()
    }
}
