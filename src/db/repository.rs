//! User repository for gator.

use uuid::Uuid;

use super::user::{NewUser, User};
use super::{parse_id, parse_timestamp, DbPool};
use crate::datetime;
use crate::{GatorError, Result};

/// Row type for user from database.
#[derive(Debug, Clone, sqlx::FromRow)]
struct UserRow {
    id: String,
    name: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<UserRow> for User {
    type Error = GatorError;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            id: parse_id(&row.id)?,
            name: row.name,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

/// Repository for user operations.
pub struct UserRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new UserRepository with the given database pool reference.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Create a new user.
    ///
    /// Fails with [`GatorError::DuplicateKey`] if the name is taken.
    pub async fn create(&self, new_user: &NewUser) -> Result<User> {
        new_user.validate()?;

        let now = datetime::now();
        let user = User {
            id: Uuid::new_v4(),
            name: new_user.name.clone(),
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO users (id, name, created_at, updated_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(user.id.to_string())
        .bind(&user.name)
        .bind(datetime::to_storage(&user.created_at))
        .bind(datetime::to_storage(&user.updated_at))
        .execute(self.pool)
        .await?;

        Ok(user)
    }

    /// Get a user by name.
    pub async fn get_by_name(&self, name: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, name, created_at, updated_at FROM users WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// List all users ordered by name.
    pub async fn list_all(&self) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(
            "SELECT id, name, created_at, updated_at FROM users ORDER BY name ASC",
        )
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(User::try_from).collect()
    }

    /// Delete every user. Their feeds and posts go with them.
    ///
    /// Returns the number of users removed.
    pub async fn delete_all(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM users")
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
