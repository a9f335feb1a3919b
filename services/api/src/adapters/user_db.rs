//! services/api/src/adapters/user_db.rs
//!
//! This module contains the user database adapter, the concrete implementation
//! of the `UserStore` port from the `core` crate. It keeps user records and
//! login sessions in SQLite using `sqlx`.

use crate::adapters::sqlite::{open_pool, port_error};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use std::path::Path;
use tutor_core::domain::{LearningStyle, Role, UserRecord};
use tutor_core::ports::{PortError, PortResult, UserStore};

const DB_FILE: &str = "users.sqlite";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `UserStore` port.
#[derive(Clone)]
pub struct SqliteUserStore {
    pool: SqlitePool,
}

impl SqliteUserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens the store inside `dir` and brings its schema up to date.
    pub async fn open(dir: &Path) -> Result<Self, crate::error::ApiError> {
        let store = Self::new(open_pool(dir, DB_FILE).await?);
        store.run_migrations().await?;
        Ok(store)
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations/users").run(&self.pool).await
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRow {
    username: String,
    password_hash: String,
    email: String,
    role: String,
    created_at: DateTime<Utc>,
    learning_style: Option<String>,
    interaction_count: i64,
}

impl UserRow {
    fn to_domain(self) -> PortResult<UserRecord> {
        let role = self.role.parse::<Role>().map_err(PortError::Unexpected)?;
        let learning_style = self
            .learning_style
            .map(|s| s.parse::<LearningStyle>())
            .transpose()
            .map_err(PortError::Unexpected)?;
        Ok(UserRecord {
            username: self.username,
            password_hash: self.password_hash,
            email: self.email,
            role,
            created_at: self.created_at,
            learning_style,
            interaction_count: self.interaction_count.max(0) as u64,
        })
    }
}

const SELECT_USER: &str = "SELECT username, password_hash, email, role, created_at, learning_style, interaction_count FROM users";

//=========================================================================================
// `UserStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn insert_user(&self, user: &UserRecord) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO users (username, password_hash, email, role, created_at, learning_style, interaction_count) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.email)
        .bind(user.role.as_str())
        .bind(user.created_at)
        .bind(user.learning_style.map(|s| s.as_str()))
        .bind(user.interaction_count as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| match port_error(e) {
            PortError::Conflict(_) => {
                PortError::Conflict(format!("User {} or email {} already exists", user.username, user.email))
            }
            other => other,
        })?;
        Ok(())
    }

    async fn find_by_username(&self, username: &str) -> PortResult<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRow>(&format!("{} WHERE username = ?", SELECT_USER))
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(port_error)?;
        row.map(UserRow::to_domain).transpose()
    }

    async fn find_by_email(&self, email: &str) -> PortResult<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRow>(&format!("{} WHERE email = ? LIMIT 1", SELECT_USER))
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(port_error)?;
        row.map(UserRow::to_domain).transpose()
    }

    async fn save_user(&self, user: &UserRecord) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = ?, email = ?, role = ?, learning_style = ?, interaction_count = ? \
             WHERE username = ?",
        )
        .bind(&user.password_hash)
        .bind(&user.email)
        .bind(user.role.as_str())
        .bind(user.learning_style.map(|s| s.as_str()))
        .bind(user.interaction_count as i64)
        .bind(&user.username)
        .execute(&self.pool)
        .await
        .map_err(port_error)?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("User {} not found", user.username)));
        }
        Ok(())
    }

    async fn create_auth_session(&self, session_id: &str, username: &str) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, username, created_at) VALUES (?, ?, ?)")
            .bind(session_id)
            .bind(username)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(port_error)?;
        Ok(())
    }

    async fn resolve_auth_session(&self, session_id: &str) -> PortResult<String> {
        let username: Option<String> = sqlx::query_scalar("SELECT username FROM auth_sessions WHERE id = ?")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(port_error)?;
        username.ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(port_error)?;
        Ok(())
    }
}
