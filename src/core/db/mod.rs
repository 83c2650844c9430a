mod state;
mod user;

use std::{path::Path, sync::Arc};

use sqlx::Row;
use state::DbState;
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::core::auth::{AuthError, PBKDF2_ITERATIONS, PasswordHash};

pub use user::{NewUser, User, UserRepository};

/// SQLite credential store
#[derive(Debug, Clone)]
pub struct UserDb {
    state: Arc<DbState>,
    hash_iterations: u32,
}

impl UserDb {
    pub async fn open<P: AsRef<Path>>(db_file: P) -> anyhow::Result<Self> {
        Ok(Self {
            state: Arc::new(DbState::open(db_file).await?),
            hash_iterations: PBKDF2_ITERATIONS,
        })
    }

    /// Iteration count for newly registered passwords. Existing accounts keep
    /// the count stored with them.
    pub fn with_hash_iterations(mut self, iterations: u32) -> Self {
        self.hash_iterations = iterations;
        self
    }

    pub async fn close(&self) {
        self.state.close().await;
    }
}

fn user_from_row(row: &sqlx::sqlite::SqliteRow) -> anyhow::Result<User> {
    let created_at: String = row.try_get("created_at")?;
    Ok(User {
        username: row.try_get("username")?,
        name: row.try_get("name")?,
        created_at: OffsetDateTime::parse(
            &created_at,
            &time::format_description::well_known::Rfc3339,
        )?,
        _guard: (),
    })
}

impl UserRepository for UserDb {
    async fn register_user(&self, user: NewUser) -> anyhow::Result<User> {
        if user.password != user.password_confirmation {
            return Err(AuthError::PasswordMismatch.into());
        }
        if self.get_user(&user.username).await?.is_some() {
            return Err(AuthError::UsernameTaken(user.username).into());
        }

        let hash = PasswordHash::create(&user.password, self.hash_iterations);
        let created_at = OffsetDateTime::now_utc();
        let created_at_str = created_at.format(&time::format_description::well_known::Rfc3339)?;

        let mut conn = self.state.conn().await?;
        let inserted = sqlx::query(
            "INSERT INTO users (username, name, password_hash, salt, iterations, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&user.username)
        .bind(&user.name)
        .bind(&hash.hash)
        .bind(&hash.salt)
        .bind(hash.iterations as i64)
        .bind(&created_at_str)
        .execute(&mut *conn)
        .await;

        match inserted {
            Ok(_) => {}
            // Lost a race with a concurrent registration of the same name
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Err(AuthError::UsernameTaken(user.username).into());
            }
            Err(e) => return Err(e.into()),
        }

        info!("Registered user {}", user.username);
        // Round-trip through the stored text so the returned value matches
        // what later reads produce
        let created_at = OffsetDateTime::parse(
            &created_at_str,
            &time::format_description::well_known::Rfc3339,
        )?;
        Ok(User {
            username: user.username,
            name: user.name,
            created_at,
            _guard: (),
        })
    }

    async fn get_user(&self, username: &str) -> anyhow::Result<Option<User>> {
        let mut conn = self.state.conn().await?;
        sqlx::query("SELECT username, name, created_at FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&mut *conn)
            .await?
            .map(|row| user_from_row(&row))
            .transpose()
    }

    async fn verify_user(&self, username: &str, password: &str) -> anyhow::Result<Option<User>> {
        let mut conn = self.state.conn().await?;
        let Some(row) = sqlx::query(
            "SELECT username, name, created_at, password_hash, salt, iterations
            FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&mut *conn)
        .await?
        else {
            debug!("Login attempt for unknown user {}", username);
            return Ok(None);
        };

        let iterations: i64 = row.try_get("iterations")?;
        let stored = PasswordHash {
            hash: row.try_get("password_hash")?,
            salt: row.try_get("salt")?,
            iterations: u32::try_from(iterations)
                .map_err(|_| AuthError::CorruptedRecord(username.to_string()))?,
        };

        if stored.verify(password)? {
            Ok(Some(user_from_row(&row)?))
        } else {
            debug!("Wrong password for user {}", username);
            Ok(None)
        }
    }

    async fn list_users(&self) -> anyhow::Result<Vec<User>> {
        let mut conn = self.state.conn().await?;
        sqlx::query("SELECT username, name, created_at FROM users ORDER BY username ASC")
            .fetch_all(&mut *conn)
            .await?
            .iter()
            .map(user_from_row)
            .collect()
    }
}
