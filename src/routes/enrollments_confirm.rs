use actix_web::{
    http::StatusCode,
    web::{self, Query},
    HttpResponse, ResponseError,
};
use chrono::Utc;
use serde::Deserialize;

use super::enrollments::enrollment_token_key;
use crate::{
    domain::recipient_email::RecipientEmail,
    lifecycle::{EnrollError, RecipientLifecycle},
    startup::EnrollmentWindow,
};

#[derive(Deserialize, Debug)]
pub struct Parameters {
    pub token: String,
}

#[tracing::instrument(
    name = "Confirm a daily greeting enrollment",
    skip(parameters, lifecycle, redis_client, window)
)]
pub async fn handle_confirm_enrollment(
    parameters: Query<Parameters>,
    lifecycle: web::Data<RecipientLifecycle>,
    redis_client: web::Data<redis::Client>,
    window: web::Data<EnrollmentWindow>,
) -> Result<HttpResponse, ConfirmEnrollmentError> {
    let email = consume_enrollment_token(&redis_client, &parameters.token)
        .await?
        .ok_or(ConfirmEnrollmentError::UnknownToken)?;
    let email = RecipientEmail::parse(email).map_err(ConfirmEnrollmentError::InvalidEmail)?;
    let record = lifecycle.enroll(email, window.0, Utc::now()).await?;

    tracing::info!(
        recipient_id = %record.id,
        expiry_date = %record.expiry_date,
        "Recipient enrolled"
    );

    Ok(HttpResponse::Ok().finish())
}

/// Looks the token up and deletes it in one step, so a link only works once.
#[tracing::instrument(name = "Consume an enrollment token from Redis", skip_all)]
async fn consume_enrollment_token(
    redis_client: &redis::Client,
    enrollment_token: &str,
) -> Result<Option<String>, redis::RedisError> {
    let mut redis_conn = redis_client.get_tokio_connection().await?;

    redis::cmd("GETDEL")
        .arg(enrollment_token_key(enrollment_token))
        .query_async(&mut redis_conn)
        .await
}

#[derive(thiserror::Error)]
pub enum ConfirmEnrollmentError {
    #[error("The enrollment token is unknown or was already used.")]
    UnknownToken,
    #[error("The enrolled email is not valid: {0}")]
    InvalidEmail(String),
    #[error("Failed to read the enrollment token.")]
    TokenStore(#[from] redis::RedisError),
    #[error("Failed to save the recipient.")]
    Enrollment(#[from] EnrollError),
}

impl std::fmt::Debug for ConfirmEnrollmentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Caused by:\n\t({})", self)
    }
}

impl ResponseError for ConfirmEnrollmentError {
    fn status_code(&self) -> StatusCode {
        match self {
            ConfirmEnrollmentError::UnknownToken => StatusCode::UNAUTHORIZED,
            ConfirmEnrollmentError::InvalidEmail(_)
            | ConfirmEnrollmentError::TokenStore(_)
            | ConfirmEnrollmentError::Enrollment(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
