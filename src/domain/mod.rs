pub mod daily_time;
pub mod new_enrollment;
pub mod recipient;
pub mod recipient_email;
pub mod recipient_state;
