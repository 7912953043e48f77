//! Users table
//!
//! A small `id;name` table with a pluggable store, CSV import/export and
//! the JSON shapes used by the API.

pub mod csv;
mod store;

use serde::{Deserialize, Serialize};

pub use store::{MemoryUserStore, MySqlUserStore, UserStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
}

/// Body of `POST /api/users`
#[derive(Debug, Deserialize)]
pub struct NewUser {
    #[serde(default)]
    pub name: String,
}
