//! User backups by e-mail, on demand and on a daily timer

mod mail;
mod scheduler;

pub use mail::BackupMailer;
pub use scheduler::spawn_daily;
