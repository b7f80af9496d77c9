pub mod jwt;
pub mod notify;
pub mod options;
pub mod rate_limit;
