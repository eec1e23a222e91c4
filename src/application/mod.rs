pub mod bootstrap;
pub mod commands;
pub mod permission;
pub mod scheduler;
