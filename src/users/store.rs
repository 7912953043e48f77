//! User storage backends
//!
//! `MySQL` when a database URL is configured, otherwise a process-local table.

use async_trait::async_trait;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use std::sync::{Mutex, PoisonError};

use super::User;
use crate::error::AppError;
use crate::logger;

/// Backing store for the users table
#[async_trait]
pub trait UserStore: Send + Sync {
    /// All users ordered by id
    async fn list(&self) -> Result<Vec<User>, AppError>;

    /// Insert a user with a store-assigned id
    async fn create(&self, name: &str) -> Result<User, AppError>;

    /// Atomically replace the whole table; returns the number of rows written
    async fn replace_all(&self, users: &[User]) -> Result<usize, AppError>;

    async fn count(&self) -> Result<u64, AppError>;
}

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS users (
    id INT AUTO_INCREMENT PRIMARY KEY,
    name VARCHAR(255) NOT NULL
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4";

/// `MySQL` store over a sqlx pool
#[derive(Debug, Clone)]
pub struct MySqlUserStore {
    pool: MySqlPool,
}

impl MySqlUserStore {
    /// Connect and make sure the `users` table exists
    pub async fn connect(url: &str) -> Result<Self, AppError> {
        let pool = MySqlPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await?;
        sqlx::query(CREATE_TABLE).execute(&pool).await?;
        logger::log_info("Users table ready");
        Ok(Self { pool })
    }
}

#[async_trait]
impl UserStore for MySqlUserStore {
    async fn list(&self) -> Result<Vec<User>, AppError> {
        let rows: Vec<(i64, String)> = sqlx::query_as("SELECT id, name FROM users ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(id, name)| User { id, name }).collect())
    }

    async fn create(&self, name: &str) -> Result<User, AppError> {
        let result = sqlx::query("INSERT INTO users (name) VALUES (?)")
            .bind(name)
            .execute(&self.pool)
            .await?;
        let id = i64::try_from(result.last_insert_id())
            .map_err(|_| AppError::Io(std::io::Error::other("insert id out of range")))?;
        Ok(User {
            id,
            name: name.to_string(),
        })
    }

    async fn replace_all(&self, users: &[User]) -> Result<usize, AppError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM users").execute(&mut *tx).await?;
        for user in users {
            sqlx::query("INSERT INTO users (id, name) VALUES (?, ?)")
                .bind(user.id)
                .bind(&user.name)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(users.len())
    }

    async fn count(&self) -> Result<u64, AppError> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(n).unwrap_or_default())
    }
}

/// Process-local store, used when no database is configured
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: Mutex<Vec<User>>,
}

impl MemoryUserStore {
    pub fn with_users(users: Vec<User>) -> Self {
        Self {
            users: Mutex::new(users),
        }
    }

    fn rows(&self) -> std::sync::MutexGuard<'_, Vec<User>> {
        self.users.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn list(&self) -> Result<Vec<User>, AppError> {
        let mut users = self.rows().clone();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    async fn create(&self, name: &str) -> Result<User, AppError> {
        let mut rows = self.rows();
        let id = rows.iter().map(|u| u.id).max().unwrap_or(0) + 1;
        let user = User {
            id,
            name: name.to_string(),
        };
        rows.push(user.clone());
        Ok(user)
    }

    async fn replace_all(&self, users: &[User]) -> Result<usize, AppError> {
        let mut ids: Vec<i64> = users.iter().map(|u| u.id).collect();
        ids.sort_unstable();
        if let Some(pair) = ids.windows(2).find(|w| w[0] == w[1]) {
            return Err(AppError::validation(format!("duplicate id {}", pair[0])));
        }
        *self.rows() = users.to_vec();
        Ok(users.len())
    }

    async fn count(&self) -> Result<u64, AppError> {
        Ok(self.rows().len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64, name: &str) -> User {
        User {
            id,
            name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn test_memory_create_assigns_next_id() {
        let store = MemoryUserStore::with_users(vec![user(7, "Ann")]);
        let created = store.create("Bob").await.unwrap();
        assert_eq!(created, user(8, "Bob"));
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_memory_list_sorted_by_id() {
        let store = MemoryUserStore::with_users(vec![user(3, "C"), user(1, "A")]);
        let ids: Vec<i64> = store.list().await.unwrap().iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_memory_replace_all() {
        let store = MemoryUserStore::with_users(vec![user(1, "Old")]);
        let written = store
            .replace_all(&[user(10, "X"), user(11, "Y")])
            .await
            .unwrap();
        assert_eq!(written, 2);
        assert_eq!(store.list().await.unwrap(), vec![user(10, "X"), user(11, "Y")]);
    }

    #[tokio::test]
    async fn test_memory_replace_all_rejects_duplicates_and_keeps_old_rows() {
        let store = MemoryUserStore::with_users(vec![user(1, "Old")]);
        let result = store.replace_all(&[user(2, "A"), user(2, "B")]).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(store.list().await.unwrap(), vec![user(1, "Old")]);
    }
}
