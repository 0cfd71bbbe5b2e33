/// Lifecycle state of a recipient record. Never stored: it is derived from the
/// record's timestamps and flag every time it is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipientState {
    Active,
    ExpiredPending,
    SoftDeleted,
}

impl RecipientState {
    pub fn is_active(&self) -> bool {
        matches!(self, RecipientState::Active)
    }

    pub fn is_expired_pending(&self) -> bool {
        matches!(self, RecipientState::ExpiredPending)
    }

    pub fn is_soft_deleted(&self) -> bool {
        matches!(self, RecipientState::SoftDeleted)
    }
}
