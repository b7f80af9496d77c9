pub mod admin;
pub mod application;
pub mod attachment;
pub mod option_item;
pub mod public;
pub mod scholarship;
