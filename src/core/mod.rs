pub mod dashboard;
pub mod recurrence;
pub mod task;
