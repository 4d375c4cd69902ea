//! API token lifecycle evaluation.
//!
//! Expiry and exhaustion are detected lazily: the first validation that
//! observes the condition persists the new status before rejecting, and
//! every later validation rejects on the stored status alone.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use keygate_core::error::{AppError, ErrorKind};
use keygate_database::CredentialStore;
use keygate_entity::token::{Token, TokenStatus};

/// Why a token was refused.
#[derive(Debug, Error)]
pub enum TokenRejection {
    #[error("no token key was supplied")]
    EmptyKey,
    #[error("token does not exist")]
    NotFound,
    #[error("token is disabled")]
    Disabled(Box<Token>),
    #[error("token has expired")]
    Expired(Box<Token>),
    #[error("token quota is exhausted")]
    Exhausted(Box<Token>),
    #[error("charge of {0} units is not positive")]
    InvalidCharge(i64),
    #[error(transparent)]
    Store(#[from] AppError),
}

impl TokenRejection {
    /// The rejected token, when one was found.
    pub fn token(&self) -> Option<&Token> {
        match self {
            Self::Disabled(t) | Self::Expired(t) | Self::Exhausted(t) => Some(t),
            _ => None,
        }
    }

    fn for_status(token: Token) -> Self {
        Self::with_status(token.status, token)
    }

    fn with_status(status: TokenStatus, token: Token) -> Self {
        match status {
            TokenStatus::Expired => Self::Expired(Box::new(token)),
            TokenStatus::Exhausted => Self::Exhausted(Box::new(token)),
            TokenStatus::Disabled | TokenStatus::Enabled => Self::Disabled(Box::new(token)),
        }
    }
}

impl From<TokenRejection> for AppError {
    fn from(rejection: TokenRejection) -> Self {
        let kind = match &rejection {
            TokenRejection::EmptyKey | TokenRejection::NotFound => ErrorKind::TokenNotFound,
            TokenRejection::Disabled(_) => ErrorKind::TokenDisabled,
            TokenRejection::Expired(_) => ErrorKind::TokenExpired,
            TokenRejection::Exhausted(_) => ErrorKind::TokenExhausted,
            TokenRejection::InvalidCharge(_) => ErrorKind::Validation,
            TokenRejection::Store(_) => ErrorKind::Internal,
        };
        match rejection {
            TokenRejection::Store(err) => err,
            other => AppError::new(kind, other.to_string()),
        }
    }
}

const TRANSITION_ATTEMPTS: usize = 3;

/// Validates API tokens against the credential store.
#[derive(Clone)]
pub struct TokenLifecycleEvaluator {
    store: Arc<dyn CredentialStore>,
}

impl std::fmt::Debug for TokenLifecycleEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenLifecycleEvaluator").finish()
    }
}

impl TokenLifecycleEvaluator {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Validate a token key.
    ///
    /// Checks, in order: empty key, existence, stored status, expiry,
    /// remaining quota. On success `accessed_at` is refreshed in the
    /// background.
    ///
    /// A due transition is written with a compare-and-set. When the token
    /// changed in between (disabled, topped up, extended) the write is
    /// skipped and the checks run again on the fresh record.
    pub async fn validate(&self, key: &str) -> Result<Token, TokenRejection> {
        if key.is_empty() {
            return Err(TokenRejection::EmptyKey);
        }

        let mut token = self
            .store
            .find_token_by_key(key)
            .await?
            .ok_or(TokenRejection::NotFound)?;

        let mut attempts = 0;
        loop {
            if !token.status.is_enabled() {
                debug!(token_id = %token.id, status = %token.status, "Rejected non-enabled token");
                return Err(TokenRejection::for_status(token));
            }

            let now = Utc::now();
            let due = if token.is_expired_at(now) {
                TokenStatus::Expired
            } else if token.is_exhausted() {
                TokenStatus::Exhausted
            } else {
                self.touch_in_background(&token);
                return Ok(token);
            };

            if let Some(moved) = self.persist(&token, due, now).await? {
                return Err(TokenRejection::for_status(moved));
            }

            attempts += 1;
            let current = self.reload(token.id).await?;
            if attempts == TRANSITION_ATTEMPTS {
                warn!(token_id = %token.id, "Token kept changing during validation");
                return Err(TokenRejection::with_status(due, current));
            }
            token = current;
        }
    }

    /// Atomically charge `units` against a token's quota.
    ///
    /// Unlimited tokens are never decremented. When the charge cannot be
    /// made the token is re-read to report why; a token left with no quota
    /// is moved to `Exhausted`.
    pub async fn charge(&self, token: &Token, units: i64) -> Result<Token, TokenRejection> {
        if units <= 0 {
            return Err(TokenRejection::InvalidCharge(units));
        }

        if let Some(charged) = self.store.charge_token(token.id, units).await? {
            debug!(
                token_id = %charged.id,
                units,
                remaining = charged.remaining_quota,
                "Charged token quota"
            );
            return Ok(charged);
        }

        let mut current = self.reload(token.id).await?;
        if current.status.is_enabled() && current.is_exhausted() {
            match self.persist(&current, TokenStatus::Exhausted, Utc::now()).await? {
                Some(moved) => current = moved,
                None => current = self.reload(token.id).await?,
            }
        }
        if !current.status.is_enabled() {
            return Err(TokenRejection::for_status(current));
        }
        Err(TokenRejection::Exhausted(Box::new(current)))
    }

    /// Write a due transition. `None` when the token changed first.
    async fn persist(
        &self,
        token: &Token,
        to: TokenStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Token>, TokenRejection> {
        let moved = self.store.transition_token(token.id, to, now).await?;
        match &moved {
            Some(updated) => {
                info!(token_id = %updated.id, status = %to, "Token status transitioned");
            }
            None => {
                debug!(token_id = %token.id, status = %to, "Token changed before transition");
            }
        }
        Ok(moved)
    }

    async fn reload(&self, id: Uuid) -> Result<Token, TokenRejection> {
        self.store
            .find_token_by_id(id)
            .await?
            .ok_or(TokenRejection::NotFound)
    }

    fn touch_in_background(&self, token: &Token) {
        let store = Arc::clone(&self.store);
        let id = token.id;
        tokio::spawn(async move {
            if let Err(e) = store.touch_token(id, Utc::now()).await {
                warn!(token_id = %id, error = %e, "Failed to refresh token access time");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::Duration;
    use keygate_core::result::AppResult;
    use keygate_core::types::pagination::{PageRequest, PageResponse};
    use keygate_database::MemoryCredentialStore;
    use keygate_entity::token::{NewToken, TokenChanges};
    use keygate_entity::user::{NewUser, User, UserChanges};

    use super::*;

    struct Fixture {
        store: Arc<MemoryCredentialStore>,
        evaluator: TokenLifecycleEvaluator,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryCredentialStore::new());
        let evaluator = TokenLifecycleEvaluator::new(store.clone());
        Fixture { store, evaluator }
    }

    async fn issue(store: &MemoryCredentialStore, quota: i64, unlimited: bool) -> Token {
        store
            .insert_token(NewToken::issue(Uuid::new_v4(), "ci", 30, quota, unlimited))
            .await
            .unwrap()
    }

    async fn expire(store: &MemoryCredentialStore, token: &Token) {
        let changes = TokenChanges {
            expires_at: Some(Utc::now() - Duration::hours(1)),
            ..TokenChanges::default()
        };
        store.update_token(token.id, &changes).await.unwrap();
    }

    #[tokio::test]
    async fn empty_and_unknown_keys() {
        let f = fixture();
        assert!(matches!(
            f.evaluator.validate("").await,
            Err(TokenRejection::EmptyKey)
        ));
        assert!(matches!(
            f.evaluator.validate("nope").await,
            Err(TokenRejection::NotFound)
        ));
    }

    #[tokio::test]
    async fn enabled_token_validates() {
        let f = fixture();
        let token = issue(&f.store, 5, false).await;
        let validated = f.evaluator.validate(&token.key).await.unwrap();
        assert_eq!(validated.id, token.id);
    }

    #[tokio::test]
    async fn expiry_is_persisted_and_idempotent() {
        let f = fixture();
        let token = issue(&f.store, 5, false).await;
        expire(&f.store, &token).await;

        let first = f.evaluator.validate(&token.key).await.unwrap_err();
        assert!(matches!(first, TokenRejection::Expired(_)));
        let stored = f.store.find_token_by_id(token.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TokenStatus::Expired);

        let second = f.evaluator.validate(&token.key).await.unwrap_err();
        assert!(matches!(second, TokenRejection::Expired(_)));
        assert_eq!(
            AppError::from(second).kind,
            ErrorKind::TokenExpired
        );
    }

    #[tokio::test]
    async fn exhausted_token_transitions() {
        let f = fixture();
        let token = issue(&f.store, 0, false).await;
        let err = f.evaluator.validate(&token.key).await.unwrap_err();
        assert!(matches!(err, TokenRejection::Exhausted(_)));
        let stored = f.store.find_token_by_id(token.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TokenStatus::Exhausted);
    }

    #[tokio::test]
    async fn unlimited_token_is_never_exhausted() {
        let f = fixture();
        let token = issue(&f.store, 0, true).await;
        for _ in 0..3 {
            f.evaluator.validate(&token.key).await.unwrap();
            let charged = f.evaluator.charge(&token, 10).await.unwrap();
            assert_eq!(charged.remaining_quota, 0);
        }
    }

    #[tokio::test]
    async fn disabled_token_is_rejected_with_token() {
        let f = fixture();
        let token = issue(&f.store, 5, false).await;
        f.store
            .update_token(token.id, &TokenChanges::status(TokenStatus::Disabled))
            .await
            .unwrap();
        let err = f.evaluator.validate(&token.key).await.unwrap_err();
        assert_eq!(err.token().map(|t| t.id), Some(token.id));
        assert_eq!(AppError::from(err).kind, ErrorKind::TokenDisabled);
    }

    #[tokio::test]
    async fn charging_down_to_zero_then_exhausts() {
        let f = fixture();
        let token = issue(&f.store, 2, false).await;
        f.evaluator.charge(&token, 1).await.unwrap();
        let last = f.evaluator.charge(&token, 1).await.unwrap();
        assert_eq!(last.remaining_quota, 0);

        let err = f.evaluator.charge(&token, 1).await.unwrap_err();
        assert!(matches!(err, TokenRejection::Exhausted(_)));
        let stored = f.store.find_token_by_id(token.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TokenStatus::Exhausted);
    }

    #[tokio::test]
    async fn non_positive_charge_is_refused() {
        let f = fixture();
        let token = issue(&f.store, 2, false).await;
        assert!(matches!(
            f.evaluator.charge(&token, 0).await,
            Err(TokenRejection::InvalidCharge(0))
        ));
    }

    /// Applies `change` to the token right after a key lookup reads it,
    /// the way a concurrent owner or admin update would land.
    struct ChangingStore {
        inner: MemoryCredentialStore,
        change: TokenChanges,
    }

    #[async_trait]
    impl CredentialStore for ChangingStore {
        async fn find_user_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
            self.inner.find_user_by_id(id).await
        }
        async fn find_user_by_login(&self, identifier: &str) -> AppResult<Option<User>> {
            self.inner.find_user_by_login(identifier).await
        }
        async fn find_user_by_access_token(&self, token: &str) -> AppResult<Option<User>> {
            self.inner.find_user_by_access_token(token).await
        }
        async fn username_exists(&self, username: &str) -> AppResult<bool> {
            self.inner.username_exists(username).await
        }
        async fn count_users(&self) -> AppResult<u64> {
            self.inner.count_users().await
        }
        async fn insert_user(&self, user: NewUser) -> AppResult<User> {
            self.inner.insert_user(user).await
        }
        async fn update_user(&self, id: Uuid, changes: &UserChanges) -> AppResult<User> {
            self.inner.update_user(id, changes).await
        }
        async fn delete_user(&self, id: Uuid) -> AppResult<bool> {
            self.inner.delete_user(id).await
        }
        async fn page_users(&self, page: &PageRequest) -> AppResult<PageResponse<User>> {
            self.inner.page_users(page).await
        }
        async fn search_users(
            &self,
            keyword: &str,
            page: &PageRequest,
        ) -> AppResult<PageResponse<User>> {
            self.inner.search_users(keyword, page).await
        }
        async fn find_token_by_key(&self, key: &str) -> AppResult<Option<Token>> {
            let read = self.inner.find_token_by_key(key).await?;
            if let Some(token) = &read {
                self.inner.update_token(token.id, &self.change).await?;
            }
            Ok(read)
        }
        async fn find_token_by_id(&self, id: Uuid) -> AppResult<Option<Token>> {
            self.inner.find_token_by_id(id).await
        }
        async fn insert_token(&self, token: NewToken) -> AppResult<Token> {
            self.inner.insert_token(token).await
        }
        async fn update_token(&self, id: Uuid, changes: &TokenChanges) -> AppResult<Token> {
            self.inner.update_token(id, changes).await
        }
        async fn touch_token(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<()> {
            self.inner.touch_token(id, at).await
        }
        async fn transition_token(
            &self,
            id: Uuid,
            to: TokenStatus,
            now: DateTime<Utc>,
        ) -> AppResult<Option<Token>> {
            self.inner.transition_token(id, to, now).await
        }
        async fn charge_token(&self, id: Uuid, units: i64) -> AppResult<Option<Token>> {
            self.inner.charge_token(id, units).await
        }
        async fn delete_token(&self, id: Uuid) -> AppResult<bool> {
            self.inner.delete_token(id).await
        }
        async fn page_tokens(
            &self,
            owner: Option<Uuid>,
            keyword: Option<&str>,
            page: &PageRequest,
        ) -> AppResult<PageResponse<Token>> {
            self.inner.page_tokens(owner, keyword, page).await
        }

        async fn ping(&self) -> AppResult<()> {
            self.inner.ping().await
        }
    }

    fn changing(change: TokenChanges) -> (Arc<ChangingStore>, TokenLifecycleEvaluator) {
        let store = Arc::new(ChangingStore {
            inner: MemoryCredentialStore::new(),
            change,
        });
        let evaluator = TokenLifecycleEvaluator::new(store.clone());
        (store, evaluator)
    }

    #[tokio::test]
    async fn concurrent_disable_beats_expiry() {
        let (store, evaluator) = changing(TokenChanges::status(TokenStatus::Disabled));
        let token = issue(&store.inner, 5, false).await;
        expire(&store.inner, &token).await;

        let err = evaluator.validate(&token.key).await.unwrap_err();
        assert!(matches!(err, TokenRejection::Disabled(_)));
        let stored = store.find_token_by_id(token.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TokenStatus::Disabled);
    }

    #[tokio::test]
    async fn concurrent_top_up_beats_exhaustion() {
        let (store, evaluator) = changing(TokenChanges {
            remaining_quota: Some(10),
            ..TokenChanges::default()
        });
        let token = issue(&store.inner, 0, false).await;

        let validated = evaluator.validate(&token.key).await.unwrap();
        assert_eq!(validated.remaining_quota, 10);
        let stored = store.find_token_by_id(token.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TokenStatus::Enabled);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_validations_of_unlimited_token() {
        let f = fixture();
        let token = issue(&f.store, 0, true).await;
        let before = Utc::now();

        let mut handles = Vec::new();
        for _ in 0..32 {
            let evaluator = f.evaluator.clone();
            let key = token.key.clone();
            handles.push(tokio::spawn(async move { evaluator.validate(&key).await }));
        }
        for handle in handles {
            let validated = handle.await.unwrap().unwrap();
            assert_eq!(validated.status, TokenStatus::Enabled);
        }

        let mut stored = f.store.find_token_by_id(token.id).await.unwrap().unwrap();
        for _ in 0..100 {
            if stored.accessed_at >= before {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            stored = f.store.find_token_by_id(token.id).await.unwrap().unwrap();
        }
        assert!(stored.accessed_at >= before);
        assert!(stored.accessed_at <= Utc::now());
        assert_eq!(stored.status, TokenStatus::Enabled);
        assert_eq!(stored.remaining_quota, 0);
    }
}
