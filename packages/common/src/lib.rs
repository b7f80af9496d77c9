pub mod application_status;
pub mod form;
pub mod storage;

pub use application_status::ApplicationStatus;
pub use form::schema::ApplicationFormV2;
