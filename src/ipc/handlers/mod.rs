pub mod assignments;
pub mod attendance;
pub mod auth;
pub mod backup_exchange;
pub mod clubs;
pub mod core;
pub mod feed;
pub mod fees;
pub mod fundraising;
pub mod notifications;
pub mod reports;
pub mod subjects;
pub mod timetable;
pub mod users;
