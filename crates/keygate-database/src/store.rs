//! The credential store seam.
//!
//! The gate and the HTTP handlers only see [`CredentialStore`]; the
//! PostgreSQL and in-memory backends implement it. Every lookup ignores
//! soft-deleted records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use keygate_core::result::AppResult;
use keygate_core::types::pagination::{PageRequest, PageResponse};
use keygate_entity::token::{NewToken, Token, TokenChanges, TokenStatus};
use keygate_entity::user::{NewUser, User, UserChanges};

use crate::connection::DatabasePool;
use crate::repositories::{TokenRepository, UserRepository};

/// Persistence operations for users and API tokens.
#[async_trait]
pub trait CredentialStore: Send + Sync + 'static {
    async fn find_user_by_id(&self, id: Uuid) -> AppResult<Option<User>>;

    /// Match `identifier` against username first, then email.
    async fn find_user_by_login(&self, identifier: &str) -> AppResult<Option<User>>;

    async fn find_user_by_access_token(&self, token: &str) -> AppResult<Option<User>>;

    async fn username_exists(&self, username: &str) -> AppResult<bool>;

    async fn count_users(&self) -> AppResult<u64>;

    /// Fails with `Conflict` when a live user already holds the username.
    async fn insert_user(&self, user: NewUser) -> AppResult<User>;

    /// Fails with `NotFound` when no live user has this id.
    async fn update_user(&self, id: Uuid, changes: &UserChanges) -> AppResult<User>;

    /// Soft-delete the user and their tokens.
    async fn delete_user(&self, id: Uuid) -> AppResult<bool>;

    async fn page_users(&self, page: &PageRequest) -> AppResult<PageResponse<User>>;

    async fn search_users(
        &self,
        keyword: &str,
        page: &PageRequest,
    ) -> AppResult<PageResponse<User>>;

    async fn find_token_by_key(&self, key: &str) -> AppResult<Option<Token>>;

    async fn find_token_by_id(&self, id: Uuid) -> AppResult<Option<Token>>;

    async fn insert_token(&self, token: NewToken) -> AppResult<Token>;

    async fn update_token(&self, id: Uuid, changes: &TokenChanges) -> AppResult<Token>;

    async fn touch_token(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<()>;

    /// Move a live `Enabled` token to `Expired` or `Exhausted`.
    ///
    /// The write only happens when the condition for `to` still holds at
    /// `now` (see [`Token::transition_due`]). `None` means the token changed
    /// since it was read and nothing was written.
    async fn transition_token(
        &self,
        id: Uuid,
        to: TokenStatus,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Token>>;

    /// Atomically subtract `units` from an enabled token's quota.
    ///
    /// `None` means the charge did not happen: the token is gone, not
    /// enabled, or too little quota remains.
    async fn charge_token(&self, id: Uuid, units: i64) -> AppResult<Option<Token>>;

    async fn delete_token(&self, id: Uuid) -> AppResult<bool>;

    /// Page through tokens, optionally for one owner and matching a name keyword.
    async fn page_tokens(
        &self,
        owner: Option<Uuid>,
        keyword: Option<&str>,
        page: &PageRequest,
    ) -> AppResult<PageResponse<Token>>;

    /// Check that the backend can serve requests.
    async fn ping(&self) -> AppResult<()>;
}

/// PostgreSQL-backed [`CredentialStore`].
#[derive(Debug, Clone)]
pub struct PgCredentialStore {
    db: DatabasePool,
    users: UserRepository,
    tokens: TokenRepository,
}

impl PgCredentialStore {
    pub fn new(db: DatabasePool) -> Self {
        let pool = db.pool().clone();
        Self {
            users: UserRepository::new(pool.clone()),
            tokens: TokenRepository::new(pool),
            db,
        }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_user_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        self.users.find_by_id(id).await
    }

    async fn find_user_by_login(&self, identifier: &str) -> AppResult<Option<User>> {
        self.users.find_by_login(identifier).await
    }

    async fn find_user_by_access_token(&self, token: &str) -> AppResult<Option<User>> {
        self.users.find_by_access_token(token).await
    }

    async fn username_exists(&self, username: &str) -> AppResult<bool> {
        self.users.username_exists(username).await
    }

    async fn count_users(&self) -> AppResult<u64> {
        self.users.count().await
    }

    async fn insert_user(&self, user: NewUser) -> AppResult<User> {
        self.users.create(&user).await
    }

    async fn update_user(&self, id: Uuid, changes: &UserChanges) -> AppResult<User> {
        self.users.update(id, changes).await
    }

    async fn delete_user(&self, id: Uuid) -> AppResult<bool> {
        self.users.soft_delete(id).await
    }

    async fn page_users(&self, page: &PageRequest) -> AppResult<PageResponse<User>> {
        self.users.find_all(page).await
    }

    async fn search_users(
        &self,
        keyword: &str,
        page: &PageRequest,
    ) -> AppResult<PageResponse<User>> {
        self.users.search(keyword, page).await
    }

    async fn find_token_by_key(&self, key: &str) -> AppResult<Option<Token>> {
        self.tokens.find_by_key(key).await
    }

    async fn find_token_by_id(&self, id: Uuid) -> AppResult<Option<Token>> {
        self.tokens.find_by_id(id).await
    }

    async fn insert_token(&self, token: NewToken) -> AppResult<Token> {
        self.tokens.create(&token).await
    }

    async fn update_token(&self, id: Uuid, changes: &TokenChanges) -> AppResult<Token> {
        self.tokens.update(id, changes).await
    }

    async fn touch_token(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<()> {
        self.tokens.touch(id, at).await
    }

    async fn transition_token(
        &self,
        id: Uuid,
        to: TokenStatus,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Token>> {
        self.tokens.transition(id, to, now).await
    }

    async fn charge_token(&self, id: Uuid, units: i64) -> AppResult<Option<Token>> {
        self.tokens.charge(id, units).await
    }

    async fn delete_token(&self, id: Uuid) -> AppResult<bool> {
        self.tokens.soft_delete(id).await
    }

    async fn page_tokens(
        &self,
        owner: Option<Uuid>,
        keyword: Option<&str>,
        page: &PageRequest,
    ) -> AppResult<PageResponse<Token>> {
        self.tokens.find_page(owner, keyword, page).await
    }

    async fn ping(&self) -> AppResult<()> {
        self.db.ping().await.map(|_| ())
    }
}
