pub mod attendance;
pub mod backup_exchange;
pub mod core;
pub mod employees;
pub mod planner;
pub mod reports;
pub mod schedules;
pub mod session;
pub mod students;
