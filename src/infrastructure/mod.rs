pub mod config;
pub mod error;
pub mod presenter;
pub mod protocol;
pub mod surface;
pub mod worker;
