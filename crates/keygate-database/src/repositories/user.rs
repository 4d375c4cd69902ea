//! User repository implementation.

use sqlx::PgPool;
use uuid::Uuid;

use keygate_core::error::{AppError, ErrorKind};
use keygate_core::result::AppResult;
use keygate_core::types::pagination::{PageRequest, PageResponse};
use keygate_entity::user::{NewUser, User, UserChanges};

use super::{db_err, like_pattern};

const USERNAME_INDEX: &str = "users_username_live_key";
const ACCESS_TOKEN_INDEX: &str = "users_access_token_key";

/// Repository for user CRUD and query operations.
///
/// Every read filters out soft-deleted rows.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new user repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a live user by primary key.
    pub async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err("Failed to find user by id"))
    }

    /// Find a live user whose username or email equals `identifier`.
    pub async fn find_by_login(&self, identifier: &str) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>(
            "SELECT * FROM users \
             WHERE (username = $1 OR (email <> '' AND email = $1)) AND deleted_at IS NULL \
             ORDER BY (username = $1) DESC LIMIT 1",
        )
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err("Failed to find user by login"))
    }

    /// Find a live user by personal access token.
    pub async fn find_by_access_token(&self, token: &str) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE access_token = $1 AND deleted_at IS NULL",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err("Failed to find user by access token"))
    }

    /// Whether a live user holds `username`.
    pub async fn username_exists(&self, username: &str) -> AppResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM users WHERE username = $1 AND deleted_at IS NULL)",
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err("Failed to check username"))
    }

    /// Count live users.
    pub async fn count(&self) -> AppResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE deleted_at IS NULL")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err("Failed to count users"))?;
        Ok(count as u64)
    }

    /// List live users, newest first. Count and page are read in one transaction.
    pub async fn find_all(&self, page: &PageRequest) -> AppResult<PageResponse<User>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_err("Failed to begin transaction"))?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE deleted_at IS NULL")
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err("Failed to count users"))?;

        let users = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE deleted_at IS NULL \
             ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2",
        )
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&mut *tx)
        .await
        .map_err(db_err("Failed to list users"))?;

        tx.commit()
            .await
            .map_err(db_err("Failed to commit transaction"))?;

        Ok(PageResponse::new(users, page, total as u64))
    }

    /// Search live users by username, display name or email.
    pub async fn search(&self, keyword: &str, page: &PageRequest) -> AppResult<PageResponse<User>> {
        let pattern = like_pattern(keyword);
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_err("Failed to begin transaction"))?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users WHERE deleted_at IS NULL \
             AND (username ILIKE $1 OR display_name ILIKE $1 OR email ILIKE $1)",
        )
        .bind(&pattern)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err("Failed to count search results"))?;

        let users = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE deleted_at IS NULL \
             AND (username ILIKE $1 OR display_name ILIKE $1 OR email ILIKE $1) \
             ORDER BY username ASC LIMIT $2 OFFSET $3",
        )
        .bind(&pattern)
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&mut *tx)
        .await
        .map_err(db_err("Failed to search users"))?;

        tx.commit()
            .await
            .map_err(db_err("Failed to commit transaction"))?;

        Ok(PageResponse::new(users, page, total as u64))
    }

    /// Create a new user.
    pub async fn create(&self, data: &NewUser) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            "INSERT INTO users (id, username, password_hash, display_name, email, role, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(&data.username)
        .bind(&data.password_hash)
        .bind(&data.display_name)
        .bind(&data.email)
        .bind(data.role)
        .bind(data.status)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.constraint() == Some(USERNAME_INDEX) => {
                AppError::conflict(format!("Username '{}' already exists", data.username))
            }
            _ => AppError::with_source(ErrorKind::Database, "Failed to create user", e),
        })
    }

    /// Apply a partial update to a live user.
    pub async fn update(&self, id: Uuid, changes: &UserChanges) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            "UPDATE users SET username = COALESCE($2, username), \
                              password_hash = COALESCE($3, password_hash), \
                              display_name = COALESCE($4, display_name), \
                              email = COALESCE($5, email), \
                              role = COALESCE($6, role), \
                              status = COALESCE($7, status), \
                              access_token = COALESCE($8, access_token), \
                              updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL RETURNING *",
        )
        .bind(id)
        .bind(&changes.username)
        .bind(&changes.password_hash)
        .bind(&changes.display_name)
        .bind(&changes.email)
        .bind(changes.role)
        .bind(changes.status)
        .bind(&changes.access_token)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.constraint() == Some(USERNAME_INDEX) => {
                AppError::conflict("Username already exists")
            }
            sqlx::Error::Database(ref db_err)
                if db_err.constraint() == Some(ACCESS_TOKEN_INDEX) =>
            {
                AppError::conflict("Access token collision, try again")
            }
            _ => AppError::with_source(ErrorKind::Database, "Failed to update user", e),
        })?
        .ok_or_else(|| AppError::not_found(format!("User {id} not found")))
    }

    /// Soft-delete a user together with their tokens. Returns `false` if
    /// no live user had this id.
    pub async fn soft_delete(&self, id: Uuid) -> AppResult<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_err("Failed to begin transaction"))?;

        let result = sqlx::query(
            "UPDATE users SET deleted_at = NOW(), access_token = NULL \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(db_err("Failed to delete user"))?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        sqlx::query("UPDATE tokens SET deleted_at = NOW() WHERE user_id = $1 AND deleted_at IS NULL")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_err("Failed to delete user tokens"))?;

        tx.commit()
            .await
            .map_err(db_err("Failed to commit transaction"))?;
        Ok(true)
    }
}
