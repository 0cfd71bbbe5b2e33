mod enrollments;
mod enrollments_confirm;
mod health_check;

pub use enrollments::*;
pub use enrollments_confirm::*;
pub use health_check::*;
