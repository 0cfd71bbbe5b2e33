use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use std::time;

use crate::domain::recipient_email::RecipientEmail;
use crate::notification::{NotificationSender, SendError};

const REQUEST_TIMEOUT: time::Duration = time::Duration::from_secs(10);

/// HTTP client for a SendGrid-compatible `/mail/send` API.
pub struct EmailClient {
    http_client: Client,
    base_url: String,
    sender: RecipientEmail,
    api_key: Secret<String>,
}

#[derive(serde::Serialize)]
pub struct SendEmailBody<'a> {
    personalizations: Vec<MailPersonalization<'a>>,
    from: MailAddress<'a>,
    subject: &'a str,
    content: Vec<MailContent<'a>>,
}

#[derive(serde::Serialize)]
struct MailAddress<'a> {
    email: &'a str,
}

#[derive(serde::Serialize)]
struct MailPersonalization<'a> {
    to: Vec<MailAddress<'a>>,
}

#[derive(serde::Serialize)]
struct MailContent<'a> {
    #[serde(rename = "type")]
    content_type: &'a str,
    value: &'a str,
}

impl EmailClient {
    pub fn new(
        base_url: String,
        sender: RecipientEmail,
        api_key: Secret<String>,
        timeout: Option<time::Duration>,
    ) -> Result<EmailClient, reqwest::Error> {
        let http_client = Client::builder()
            .timeout(timeout.unwrap_or(REQUEST_TIMEOUT))
            .build()?;

        Ok(EmailClient {
            http_client,
            base_url,
            sender,
            api_key,
        })
    }

    #[tracing::instrument(
        name = "Send an email through the provider",
        skip(self, html_content),
        fields(recipient_email = %recipient)
    )]
    pub async fn send_email(
        &self,
        recipient: &RecipientEmail,
        subject: &str,
        html_content: &str,
    ) -> Result<(), reqwest::Error> {
        let url = format!("{}/mail/send", self.base_url);
        let body = SendEmailBody {
            from: MailAddress {
                email: self.sender.as_ref(),
            },
            personalizations: vec![MailPersonalization {
                to: vec![MailAddress {
                    email: recipient.as_ref(),
                }],
            }],
            subject,
            content: vec![MailContent {
                content_type: "text/html",
                value: html_content,
            }],
        };

        self.http_client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .json(&body)
            .send()
            .await?
            .error_for_status()?; // return an error when server response status code is 4xx or 5xx

        Ok(())
    }
}

#[async_trait]
impl NotificationSender for EmailClient {
    async fn send(
        &self,
        recipient: &RecipientEmail,
        subject: &str,
        html_body: &str,
    ) -> Result<(), SendError> {
        self.send_email(recipient, subject, html_body)
            .await
            .map_err(SendError::from)
    }
}
