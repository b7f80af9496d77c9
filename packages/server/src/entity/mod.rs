pub mod application;
pub mod application_attachment;
pub mod application_form_data;
pub mod application_option_item;
pub mod application_status_history;
pub mod notification_log;
pub mod scholarship;
pub mod student_profile;
