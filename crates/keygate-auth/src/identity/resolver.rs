//! Identity resolution from the session cookie or the `Authorization` header.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use keygate_core::error::{AppError, ErrorKind};
use keygate_database::CredentialStore;
use keygate_entity::token::Token;

use crate::session::SessionCodec;
use crate::token::TokenLifecycleEvaluator;

use super::principal::{Origin, Principal};

const BEARER_PREFIX: &str = "Bearer ";

/// Why a request could not be tied to a user.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("not logged in and no access token supplied")]
    Unauthenticated,
    #[error("{0}")]
    InvalidCredential(String),
    #[error(transparent)]
    Store(AppError),
}

impl From<ResolveError> for AppError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::Unauthenticated => AppError::unauthenticated(err.to_string()),
            ResolveError::InvalidCredential(message) => AppError::invalid_credential(message),
            ResolveError::Store(source) => source,
        }
    }
}

/// Strip a single leading `Bearer ` from a header value.
pub fn strip_bearer(value: &str) -> &str {
    value.strip_prefix(BEARER_PREFIX).unwrap_or(value)
}

/// Resolves callers to a [`Principal`]. Never writes to the store.
#[derive(Clone)]
pub struct IdentityResolver {
    store: Arc<dyn CredentialStore>,
    sessions: Arc<SessionCodec>,
    tokens: TokenLifecycleEvaluator,
}

impl std::fmt::Debug for IdentityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityResolver")
            .field("sessions", &self.sessions)
            .finish()
    }
}

impl IdentityResolver {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        sessions: Arc<SessionCodec>,
        tokens: TokenLifecycleEvaluator,
    ) -> Self {
        Self {
            store,
            sessions,
            tokens,
        }
    }

    /// Resolve a user identity.
    ///
    /// A session with a non-empty username wins over any header. Without
    /// one, the `Authorization` value (after one `Bearer ` prefix is
    /// removed) is looked up as a personal access token.
    pub async fn resolve(
        &self,
        session: Option<&str>,
        authorization: Option<&str>,
    ) -> Result<Principal, ResolveError> {
        let from_session = match session {
            Some(cookie) => self.sessions.decode(cookie).map_err(|e| match e.kind {
                ErrorKind::InvalidCredential => ResolveError::InvalidCredential(e.message),
                _ => ResolveError::Store(e),
            })?,
            None => None,
        };
        if let Some(identity) = from_session {
            return Ok(Principal::from(identity));
        }

        let header = authorization.unwrap_or_default();
        if header.is_empty() {
            return Err(ResolveError::Unauthenticated);
        }

        let user = self
            .store
            .find_user_by_access_token(strip_bearer(header))
            .await
            .map_err(ResolveError::Store)?;

        match user {
            Some(user) if !user.username.is_empty() => {
                Ok(Principal::from_user(&user, Origin::AccessToken))
            }
            _ => Err(ResolveError::InvalidCredential(
                "invalid access token".to_string(),
            )),
        }
    }

    /// Resolve an identity if one is present. Never fails.
    pub async fn resolve_optional(
        &self,
        session: Option<&str>,
        authorization: Option<&str>,
    ) -> Option<Principal> {
        match self.resolve(session, authorization).await {
            Ok(principal) => Some(principal),
            Err(ResolveError::Store(e)) => {
                warn!(error = %e, "Store failure during optional identity resolution");
                None
            }
            Err(e) => {
                debug!(reason = %e, "Proceeding without identity");
                None
            }
        }
    }

    /// Authenticate an API token and its owner.
    ///
    /// Token failures carry the token error kinds. A missing or disabled
    /// owner is `Forbidden`; a store failure keeps its own kind.
    pub async fn resolve_api_token(
        &self,
        authorization: Option<&str>,
    ) -> Result<(Principal, Token), AppError> {
        let key = strip_bearer(authorization.unwrap_or_default());
        let token = self.tokens.validate(key).await?;

        let owner = self.store.find_user_by_id(token.user_id).await?;
        let owner = match owner {
            Some(owner) if owner.is_enabled() => owner,
            Some(owner) => {
                debug!(user_id = %owner.id, token_id = %token.id, "Token owner is disabled");
                return Err(AppError::forbidden("token owner is disabled"));
            }
            None => return Err(AppError::forbidden("token owner no longer exists")),
        };

        let principal = Principal::from_user(&owner, Origin::ApiToken { token_id: token.id });
        Ok((principal, token))
    }

    pub fn tokens(&self) -> &TokenLifecycleEvaluator {
        &self.tokens
    }

    pub fn sessions(&self) -> &SessionCodec {
        &self.sessions
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use keygate_core::config::SessionConfig;
    use keygate_core::result::AppResult;
    use keygate_core::types::pagination::{PageRequest, PageResponse};
    use keygate_database::MemoryCredentialStore;
    use keygate_entity::token::{NewToken, TokenChanges, TokenStatus};
    use keygate_entity::user::{NewUser, Role, User, UserChanges, UserStatus};
    use uuid::Uuid;

    use super::*;

    fn codec() -> Arc<SessionCodec> {
        Arc::new(SessionCodec::new(&SessionConfig {
            secret: "test-secret".to_string(),
            ..SessionConfig::default()
        }))
    }

    fn resolver(store: Arc<dyn CredentialStore>) -> IdentityResolver {
        let tokens = TokenLifecycleEvaluator::new(Arc::clone(&store));
        IdentityResolver::new(store, codec(), tokens)
    }

    async fn user_with_access_token(
        store: &MemoryCredentialStore,
        username: &str,
        token: &str,
    ) -> User {
        let user = store
            .insert_user(NewUser {
                username: username.to_string(),
                password_hash: String::new(),
                display_name: username.to_string(),
                email: String::new(),
                role: Role::Common,
                status: UserStatus::Enabled,
            })
            .await
            .unwrap();
        let changes = UserChanges {
            access_token: Some(token.to_string()),
            ..UserChanges::default()
        };
        store.update_user(user.id, &changes).await.unwrap()
    }

    #[tokio::test]
    async fn session_wins_over_header() {
        let store = Arc::new(MemoryCredentialStore::new());
        let alice = user_with_access_token(&store, "alice", "alice-token").await;
        user_with_access_token(&store, "bob", "xyz").await;

        let resolver = resolver(store);
        let cookie = resolver.sessions().issue(&alice).unwrap();
        let principal = resolver
            .resolve(Some(&cookie), Some("Bearer xyz"))
            .await
            .unwrap();
        assert_eq!(principal.username, "alice");
        assert_eq!(principal.origin, Origin::Session);
    }

    #[tokio::test]
    async fn bearer_prefix_is_stripped_once() {
        let store = Arc::new(MemoryCredentialStore::new());
        user_with_access_token(&store, "bob", "xyz").await;
        let resolver = resolver(store);

        let bob = resolver.resolve(None, Some("Bearer xyz")).await.unwrap();
        assert_eq!(bob.username, "bob");
        assert_eq!(bob.origin, Origin::AccessToken);

        let raw = resolver.resolve(None, Some("xyz")).await.unwrap();
        assert_eq!(raw.username, "bob");

        let doubled = resolver.resolve(None, Some("Bearer Bearer xyz")).await;
        assert!(matches!(doubled, Err(ResolveError::InvalidCredential(_))));
    }

    #[tokio::test]
    async fn missing_credentials_are_unauthenticated() {
        let resolver = resolver(Arc::new(MemoryCredentialStore::new()));
        assert!(matches!(
            resolver.resolve(None, None).await,
            Err(ResolveError::Unauthenticated)
        ));
        assert!(matches!(
            resolver.resolve(Some("not-a-jwt"), Some("")).await,
            Err(ResolveError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn unknown_access_token_is_invalid() {
        let resolver = resolver(Arc::new(MemoryCredentialStore::new()));
        let err = resolver.resolve(None, Some("Bearer nope")).await.unwrap_err();
        assert!(matches!(err, ResolveError::InvalidCredential(_)));
        assert_eq!(AppError::from(err).kind, ErrorKind::InvalidCredential);
    }

    #[tokio::test]
    async fn store_failure_stays_internal() {
        let resolver = resolver(Arc::new(FailingStore));
        let err = resolver.resolve(None, Some("Bearer xyz")).await.unwrap_err();
        assert!(matches!(err, ResolveError::Store(_)));
        assert_eq!(AppError::from(err).kind, ErrorKind::Database);
        assert!(resolver.resolve_optional(None, Some("xyz")).await.is_none());
    }

    #[tokio::test]
    async fn api_token_with_disabled_owner_is_forbidden() {
        let store = Arc::new(MemoryCredentialStore::new());
        let owner = user_with_access_token(&store, "carol", "carol-token").await;
        let token = store
            .insert_token(NewToken::issue(owner.id, "ci", 30, 10, false))
            .await
            .unwrap();
        let resolver = resolver(store.clone());

        let header = format!("Bearer {}", token.key);
        let (principal, _) = resolver.resolve_api_token(Some(&header)).await.unwrap();
        assert_eq!(principal.token_id(), Some(token.id));

        let disable = UserChanges {
            status: Some(UserStatus::Disabled),
            ..UserChanges::default()
        };
        store.update_user(owner.id, &disable).await.unwrap();
        let err = resolver.resolve_api_token(Some(&header)).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn api_token_failures_use_token_kinds() {
        let resolver = resolver(Arc::new(MemoryCredentialStore::new()));
        let err = resolver.resolve_api_token(None).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::TokenNotFound);
    }

    struct FailingStore;

    fn down<T>() -> AppResult<T> {
        Err(AppError::database("store unavailable"))
    }

    #[async_trait]
    impl CredentialStore for FailingStore {
        async fn find_user_by_id(&self, _: Uuid) -> AppResult<Option<User>> {
            down()
        }
        async fn find_user_by_login(&self, _: &str) -> AppResult<Option<User>> {
            down()
        }
        async fn find_user_by_access_token(&self, _: &str) -> AppResult<Option<User>> {
            down()
        }
        async fn username_exists(&self, _: &str) -> AppResult<bool> {
            down()
        }
        async fn count_users(&self) -> AppResult<u64> {
            down()
        }
        async fn insert_user(&self, _: NewUser) -> AppResult<User> {
            down()
        }
        async fn update_user(&self, _: Uuid, _: &UserChanges) -> AppResult<User> {
            down()
        }
        async fn delete_user(&self, _: Uuid) -> AppResult<bool> {
            down()
        }
        async fn page_users(&self, _: &PageRequest) -> AppResult<PageResponse<User>> {
            down()
        }
        async fn search_users(&self, _: &str, _: &PageRequest) -> AppResult<PageResponse<User>> {
            down()
        }
        async fn find_token_by_key(&self, _: &str) -> AppResult<Option<Token>> {
            down()
        }
        async fn find_token_by_id(&self, _: Uuid) -> AppResult<Option<Token>> {
            down()
        }
        async fn insert_token(&self, _: NewToken) -> AppResult<Token> {
            down()
        }
        async fn update_token(&self, _: Uuid, _: &TokenChanges) -> AppResult<Token> {
            down()
        }
        async fn touch_token(&self, _: Uuid, _: DateTime<Utc>) -> AppResult<()> {
            down()
        }
        async fn transition_token(
            &self,
            _: Uuid,
            _: TokenStatus,
            _: DateTime<Utc>,
        ) -> AppResult<Option<Token>> {
            down()
        }
        async fn charge_token(&self, _: Uuid, _: i64) -> AppResult<Option<Token>> {
            down()
        }
        async fn delete_token(&self, _: Uuid) -> AppResult<bool> {
            down()
        }
        async fn page_tokens(
            &self,
            _: Option<Uuid>,
            _: Option<&str>,
            _: &PageRequest,
        ) -> AppResult<PageResponse<Token>> {
            down()
        }

        async fn ping(&self) -> AppResult<()> {
            down()
        }
    }
}
