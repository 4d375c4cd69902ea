//! API token repository implementation.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use keygate_core::error::{AppError, ErrorKind};
use keygate_core::result::AppResult;
use keygate_core::types::pagination::{PageRequest, PageResponse};
use keygate_entity::token::{NewToken, Token, TokenChanges, TokenStatus};

use super::{db_err, like_pattern};

const KEY_INDEX: &str = "tokens_key_key";

/// Repository for API token persistence, lifecycle updates and quota charges.
#[derive(Debug, Clone)]
pub struct TokenRepository {
    pool: PgPool,
}

impl TokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_key(&self, key: &str) -> AppResult<Option<Token>> {
        sqlx::query_as::<_, Token>("SELECT * FROM tokens WHERE key = $1 AND deleted_at IS NULL")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err("Failed to find token by key"))
    }

    pub async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Token>> {
        sqlx::query_as::<_, Token>("SELECT * FROM tokens WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err("Failed to find token by id"))
    }

    /// Insert a freshly issued token in the `Enabled` state.
    pub async fn create(&self, data: &NewToken) -> AppResult<Token> {
        sqlx::query_as::<_, Token>(
            "INSERT INTO tokens (id, user_id, key, name, status, expires_at, remaining_quota, unlimited_quota) \
             VALUES ($1, $2, $3, $4, 1, $5, $6, $7) \
             RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(data.user_id)
        .bind(&data.key)
        .bind(&data.name)
        .bind(data.expires_at)
        .bind(data.remaining_quota)
        .bind(data.unlimited_quota)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.constraint() == Some(KEY_INDEX) => {
                AppError::conflict("Token key collision, try again")
            }
            _ => AppError::with_source(ErrorKind::Database, "Failed to create token", e),
        })
    }

    /// Apply a partial update to a live token.
    pub async fn update(&self, id: Uuid, changes: &TokenChanges) -> AppResult<Token> {
        sqlx::query_as::<_, Token>(
            "UPDATE tokens SET name = COALESCE($2, name), \
                               status = COALESCE($3, status), \
                               expires_at = COALESCE($4, expires_at), \
                               remaining_quota = COALESCE($5, remaining_quota), \
                               unlimited_quota = COALESCE($6, unlimited_quota) \
             WHERE id = $1 AND deleted_at IS NULL RETURNING *",
        )
        .bind(id)
        .bind(&changes.name)
        .bind(changes.status)
        .bind(changes.expires_at)
        .bind(changes.remaining_quota)
        .bind(changes.unlimited_quota)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err("Failed to update token"))?
        .ok_or_else(|| AppError::not_found(format!("Token {id} not found")))
    }

    /// Refresh `accessed_at`.
    pub async fn touch(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<()> {
        sqlx::query("UPDATE tokens SET accessed_at = $2 WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(db_err("Failed to touch token"))?;
        Ok(())
    }

    /// Compare-and-set lifecycle move out of `Enabled`.
    ///
    /// The `WHERE` clause re-checks status and the target's condition, so a
    /// concurrent disable, top-up or extension wins over this write.
    pub async fn transition(
        &self,
        id: Uuid,
        to: TokenStatus,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Token>> {
        let query = match to {
            TokenStatus::Expired => sqlx::query_as::<_, Token>(
                "UPDATE tokens SET status = $2 \
                 WHERE id = $1 AND deleted_at IS NULL AND status = 1 AND expires_at < $3 \
                 RETURNING *",
            )
            .bind(id)
            .bind(to)
            .bind(now),
            TokenStatus::Exhausted => sqlx::query_as::<_, Token>(
                "UPDATE tokens SET status = $2 \
                 WHERE id = $1 AND deleted_at IS NULL AND status = 1 \
                   AND NOT unlimited_quota AND remaining_quota <= 0 \
                 RETURNING *",
            )
            .bind(id)
            .bind(to),
            TokenStatus::Enabled | TokenStatus::Disabled => return Ok(None),
        };
        query
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err("Failed to transition token status"))
    }

    /// Atomically subtract `units` from an enabled token's quota.
    ///
    /// Returns `None` when the token is gone, not enabled, or cannot
    /// afford the charge. Unlimited tokens are returned unchanged.
    pub async fn charge(&self, id: Uuid, units: i64) -> AppResult<Option<Token>> {
        sqlx::query_as::<_, Token>(
            "UPDATE tokens SET remaining_quota = CASE WHEN unlimited_quota \
                                                      THEN remaining_quota \
                                                      ELSE remaining_quota - $2 END \
             WHERE id = $1 AND deleted_at IS NULL AND status = 1 \
               AND (unlimited_quota OR remaining_quota >= $2) \
             RETURNING *",
        )
        .bind(id)
        .bind(units)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err("Failed to charge token quota"))
    }

    pub async fn soft_delete(&self, id: Uuid) -> AppResult<bool> {
        let result =
            sqlx::query("UPDATE tokens SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL")
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(db_err("Failed to delete token"))?;
        Ok(result.rows_affected() > 0)
    }

    /// Page through live tokens, optionally restricted to one owner and a
    /// name keyword. Count and page are read in one transaction.
    pub async fn find_page(
        &self,
        owner: Option<Uuid>,
        keyword: Option<&str>,
        page: &PageRequest,
    ) -> AppResult<PageResponse<Token>> {
        let pattern = keyword.map(like_pattern);
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_err("Failed to begin transaction"))?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM tokens WHERE deleted_at IS NULL \
             AND ($1::uuid IS NULL OR user_id = $1) \
             AND ($2::text IS NULL OR name ILIKE $2)",
        )
        .bind(owner)
        .bind(&pattern)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err("Failed to count tokens"))?;

        let tokens = sqlx::query_as::<_, Token>(
            "SELECT * FROM tokens WHERE deleted_at IS NULL \
             AND ($1::uuid IS NULL OR user_id = $1) \
             AND ($2::text IS NULL OR name ILIKE $2) \
             ORDER BY created_at DESC, id DESC LIMIT $3 OFFSET $4",
        )
        .bind(owner)
        .bind(&pattern)
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&mut *tx)
        .await
        .map_err(db_err("Failed to list tokens"))?;

        tx.commit()
            .await
            .map_err(db_err("Failed to commit transaction"))?;

        Ok(PageResponse::new(tokens, page, total as u64))
    }
}
