pub mod auth;
pub mod init;
pub mod notifications;
pub mod push;
pub mod reminders;
pub mod schedule;
pub mod scheduler;
pub mod store;
pub mod weekly_report;

#[cfg(test)]
pub mod testing;
