use actix_web::{http::StatusCode, web, HttpResponse, ResponseError};
use rand::Rng;

use crate::{
    domain::{
        new_enrollment::{NewEnrollment, NewEnrollmentBody},
        recipient_email::RecipientEmail,
    },
    email_client::EmailClient,
    startup::ApplicationBaseUrl,
};

const ENROLLMENT_TOKEN_LENGTH: usize = 30;
// Unconfirmed links stop working after a day
const ENROLLMENT_TOKEN_TTL_SECONDS: u64 = 24 * 60 * 60;

#[tracing::instrument(
    name = "Requesting a daily greeting enrollment",
    skip(body, email_client, base_url, redis_client),
    fields(
        recipient_email = %body.email
    )
)]
pub async fn handle_request_enrollment(
    body: web::Json<NewEnrollmentBody>,
    email_client: web::Data<EmailClient>,
    base_url: web::Data<ApplicationBaseUrl>,
    redis_client: web::Data<redis::Client>,
) -> Result<HttpResponse, EnrollmentError> {
    let new_enrollment: NewEnrollment = body.try_into().map_err(EnrollmentError::Validation)?;
    let enrollment_token = generate_enrollment_token();

    store_enrollment_token(&redis_client, &enrollment_token, &new_enrollment.email).await?;

    if let Err(err) = send_confirmation_email(
        &email_client,
        &new_enrollment.email,
        base_url.0.as_str(),
        enrollment_token.as_str(),
    )
    .await
    {
        tracing::error!(
            "Failed to send an email to {}: {:?}",
            new_enrollment.email.as_ref(),
            err
        );
    }

    Ok(HttpResponse::Created().finish())
}

#[tracing::instrument(
    name = "Send a confirmation email to a new recipient",
    fields(
        base_url = %base_url
    ),
    skip(email_client, recipient, enrollment_token)
)]
async fn send_confirmation_email(
    email_client: &EmailClient,
    recipient: &RecipientEmail,
    base_url: &str,
    enrollment_token: &str,
) -> Result<(), reqwest::Error> {
    let confirmation_link = format!(
        "{}/enrollments/confirm?token={}",
        base_url, enrollment_token
    );
    let html_body = format!(
        r#"
            <html>
                <body>
                    Thank you for joining Daily Greeting. We're delighted to have you on board.
                    To start receiving a greeting every morning, please confirm through the link below:
                    <br>
                    <a href="{0}">{0}</a>
                </body>
            </html>
        "#,
        confirmation_link
    );

    email_client
        .send_email(
            recipient,
            "Rise & shine: your Daily Greeting link is inside!",
            html_body.as_str(),
        )
        .await
}

pub(crate) fn enrollment_token_key(enrollment_token: &str) -> String {
    format!("enrollment_token:{}:email", enrollment_token)
}

#[tracing::instrument(
    name = "Store an enrollment token in Redis",
    skip(redis_client, enrollment_token),
    fields(
        recipient_email = %recipient
    )
)]
async fn store_enrollment_token(
    redis_client: &redis::Client,
    enrollment_token: &str,
    recipient: &RecipientEmail,
) -> Result<(), redis::RedisError> {
    let mut redis_conn = redis_client.get_tokio_connection().await?;

    redis::cmd("SET")
        .arg(enrollment_token_key(enrollment_token))
        .arg(recipient.as_ref())
        .arg("EX")
        .arg(ENROLLMENT_TOKEN_TTL_SECONDS)
        .query_async(&mut redis_conn)
        .await
}

fn generate_enrollment_token() -> String {
    let mut rng = rand::thread_rng();

    std::iter::repeat_with(|| rng.sample(rand::distributions::Alphanumeric))
        .map(char::from)
        .take(ENROLLMENT_TOKEN_LENGTH)
        .collect()
}

#[derive(thiserror::Error)]
pub enum EnrollmentError {
    #[error("{0}")]
    Validation(String),
    #[error("Failed to store the enrollment token.")]
    TokenStore(#[from] redis::RedisError),
}

impl std::fmt::Debug for EnrollmentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Caused by:\n\t({})", self)
    }
}

impl ResponseError for EnrollmentError {
    fn status_code(&self) -> StatusCode {
        match self {
            EnrollmentError::Validation(_) => StatusCode::BAD_REQUEST,
            EnrollmentError::TokenStore(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
