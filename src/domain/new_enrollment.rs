use actix_web::web;
use serde::Deserialize;

use crate::domain::recipient_email::RecipientEmail;

pub struct NewEnrollment {
    pub email: RecipientEmail,
}

#[derive(Deserialize)]
pub struct NewEnrollmentBody {
    pub email: String,
}

impl TryFrom<web::Json<NewEnrollmentBody>> for NewEnrollment {
    type Error = String;

    fn try_from(body: web::Json<NewEnrollmentBody>) -> Result<Self, Self::Error> {
        let email = RecipientEmail::parse(body.email.clone())?;

        Ok(NewEnrollment { email })
    }
}
