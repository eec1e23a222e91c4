pub mod models;
pub mod recurrence;
