use async_trait::async_trait;
use std::time;

use crate::domain::recipient_email::RecipientEmail;

/// Delivers one rendered message to one address.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(
        &self,
        recipient: &RecipientEmail,
        subject: &str,
        html_body: &str,
    ) -> Result<(), SendError>;
}

#[derive(thiserror::Error)]
pub enum SendError {
    #[error("Failed to reach the email provider.")]
    Request(#[from] reqwest::Error),
    #[error("The email was not sent after {0:?}.")]
    TimedOut(time::Duration),
    #[error("The email provider rejected the message: {0}")]
    Rejected(String),
}

impl std::fmt::Debug for SendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SendError::Request(err) => write!(f, "Caused by:\n\t({})\n\t({})", self, err),
            _ => write!(f, "Caused by:\n\t({})", self),
        }
    }
}
