//! vidstream: a Range-aware video streaming and upload server with a small
//! users table, CSV import/export and e-mailed backups.

pub mod backup;
pub mod config;
pub mod error;
pub mod handler;
pub mod http;
pub mod logger;
pub mod server;
pub mod users;
pub mod video;
