pub mod core;
pub mod profiles;
pub mod records;
pub mod views;
