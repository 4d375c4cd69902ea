//! In-memory credential store built on `dashmap`.
//!
//! Used by the test suites and by local runs without PostgreSQL. Guards
//! on one map are never held while another map is locked.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use uuid::Uuid;

use keygate_core::error::AppError;
use keygate_core::result::AppResult;
use keygate_core::types::pagination::{PageRequest, PageResponse};
use keygate_entity::token::{NewToken, Token, TokenChanges, TokenStatus};
use keygate_entity::user::{NewUser, User, UserChanges};

use crate::store::CredentialStore;

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    users: DashMap<Uuid, User>,
    /// Live username -> user id.
    usernames: DashMap<String, Uuid>,
    /// Access token -> user id.
    access_tokens: DashMap<String, Uuid>,
    tokens: DashMap<Uuid, Token>,
    /// Token key -> token id. Keys stay reserved after deletion.
    keys: DashMap<String, Uuid>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn live_user(&self, id: Uuid) -> Option<User> {
        self.users
            .get(&id)
            .filter(|u| !u.is_deleted())
            .map(|u| u.clone())
    }

    fn live_token(&self, id: Uuid) -> Option<Token> {
        self.tokens
            .get(&id)
            .filter(|t| !t.is_deleted())
            .map(|t| t.clone())
    }

    fn reserve(index: &DashMap<String, Uuid>, value: &str, id: Uuid) -> bool {
        match index.entry(value.to_string()) {
            Entry::Occupied(existing) => *existing.get() == id,
            Entry::Vacant(slot) => {
                slot.insert(id);
                true
            }
        }
    }

    fn paginate<T>(mut items: Vec<T>, page: &PageRequest) -> PageResponse<T> {
        let total = items.len() as u64;
        let start = (page.offset() as usize).min(items.len());
        let end = start.saturating_add(page.limit() as usize).min(items.len());
        let items = items.drain(start..end).collect();
        PageResponse::new(items, page, total)
    }

    fn newest_first_users(mut users: Vec<User>) -> Vec<User> {
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        users
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_user_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.live_user(id))
    }

    async fn find_user_by_login(&self, identifier: &str) -> AppResult<Option<User>> {
        let by_name = self.usernames.get(identifier).map(|id| *id);
        if let Some(user) = by_name.and_then(|id| self.live_user(id)) {
            return Ok(Some(user));
        }
        if identifier.is_empty() {
            return Ok(None);
        }
        Ok(self
            .users
            .iter()
            .find(|u| !u.is_deleted() && u.email == identifier)
            .map(|u| u.clone()))
    }

    async fn find_user_by_access_token(&self, token: &str) -> AppResult<Option<User>> {
        let id = self.access_tokens.get(token).map(|id| *id);
        Ok(id.and_then(|id| self.live_user(id)))
    }

    async fn username_exists(&self, username: &str) -> AppResult<bool> {
        Ok(self.usernames.contains_key(username))
    }

    async fn count_users(&self) -> AppResult<u64> {
        Ok(self.users.iter().filter(|u| !u.is_deleted()).count() as u64)
    }

    async fn insert_user(&self, user: NewUser) -> AppResult<User> {
        let id = Uuid::now_v7();
        if !Self::reserve(&self.usernames, &user.username, id) {
            return Err(AppError::conflict(format!(
                "Username '{}' already exists",
                user.username
            )));
        }

        let now = Utc::now();
        let record = User {
            id,
            username: user.username,
            password_hash: user.password_hash,
            display_name: user.display_name,
            email: user.email,
            role: user.role,
            status: user.status,
            access_token: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.users.insert(id, record.clone());
        Ok(record)
    }

    async fn update_user(&self, id: Uuid, changes: &UserChanges) -> AppResult<User> {
        let current = self
            .live_user(id)
            .ok_or_else(|| AppError::not_found(format!("User {id} not found")))?;

        let rename = changes
            .username
            .as_ref()
            .filter(|name| **name != current.username);
        if let Some(name) = rename {
            if !Self::reserve(&self.usernames, name, id) {
                return Err(AppError::conflict("Username already exists"));
            }
        }
        if let Some(token) = &changes.access_token {
            if !Self::reserve(&self.access_tokens, token, id) {
                if let Some(name) = rename {
                    self.usernames.remove_if(name, |_, owner| *owner == id);
                }
                return Err(AppError::conflict("Access token collision, try again"));
            }
        }

        let updated = {
            let mut entry = self
                .users
                .get_mut(&id)
                .filter(|u| !u.is_deleted())
                .ok_or_else(|| AppError::not_found(format!("User {id} not found")))?;
            changes.apply(&mut entry);
            entry.updated_at = Utc::now();
            entry.clone()
        };

        if rename.is_some() {
            self.usernames
                .remove_if(&current.username, |_, owner| *owner == id);
        }
        if let (Some(old), Some(_)) = (&current.access_token, &changes.access_token) {
            if Some(old) != updated.access_token.as_ref() {
                self.access_tokens.remove_if(old, |_, owner| *owner == id);
            }
        }
        Ok(updated)
    }

    async fn delete_user(&self, id: Uuid) -> AppResult<bool> {
        let removed = {
            let Some(mut entry) = self.users.get_mut(&id) else {
                return Ok(false);
            };
            if entry.is_deleted() {
                return Ok(false);
            }
            entry.deleted_at = Some(Utc::now());
            (entry.username.clone(), entry.access_token.take())
        };

        self.usernames.remove_if(&removed.0, |_, owner| *owner == id);
        if let Some(token) = removed.1 {
            self.access_tokens.remove_if(&token, |_, owner| *owner == id);
        }

        let now = Utc::now();
        for mut token in self.tokens.iter_mut() {
            if token.user_id == id && token.deleted_at.is_none() {
                token.deleted_at = Some(now);
            }
        }
        Ok(true)
    }

    async fn page_users(&self, page: &PageRequest) -> AppResult<PageResponse<User>> {
        let users: Vec<User> = self
            .users
            .iter()
            .filter(|u| !u.is_deleted())
            .map(|u| u.clone())
            .collect();
        Ok(Self::paginate(Self::newest_first_users(users), page))
    }

    async fn search_users(
        &self,
        keyword: &str,
        page: &PageRequest,
    ) -> AppResult<PageResponse<User>> {
        let needle = keyword.to_lowercase();
        let mut users: Vec<User> = self
            .users
            .iter()
            .filter(|u| !u.is_deleted())
            .filter(|u| {
                u.username.to_lowercase().contains(&needle)
                    || u.display_name.to_lowercase().contains(&needle)
                    || u.email.to_lowercase().contains(&needle)
            })
            .map(|u| u.clone())
            .collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(Self::paginate(users, page))
    }

    async fn find_token_by_key(&self, key: &str) -> AppResult<Option<Token>> {
        let id = self.keys.get(key).map(|id| *id);
        Ok(id.and_then(|id| self.live_token(id)))
    }

    async fn find_token_by_id(&self, id: Uuid) -> AppResult<Option<Token>> {
        Ok(self.live_token(id))
    }

    async fn insert_token(&self, token: NewToken) -> AppResult<Token> {
        let id = Uuid::now_v7();
        if !Self::reserve(&self.keys, &token.key, id) {
            return Err(AppError::conflict("Token key collision, try again"));
        }

        let now = Utc::now();
        let record = Token {
            id,
            user_id: token.user_id,
            key: token.key,
            name: token.name,
            status: TokenStatus::Enabled,
            created_at: now,
            accessed_at: now,
            expires_at: token.expires_at,
            remaining_quota: token.remaining_quota,
            unlimited_quota: token.unlimited_quota,
            deleted_at: None,
        };
        self.tokens.insert(id, record.clone());
        Ok(record)
    }

    async fn update_token(&self, id: Uuid, changes: &TokenChanges) -> AppResult<Token> {
        let mut entry = self
            .tokens
            .get_mut(&id)
            .filter(|t| !t.is_deleted())
            .ok_or_else(|| AppError::not_found(format!("Token {id} not found")))?;
        changes.apply(&mut entry);
        Ok(entry.clone())
    }

    async fn touch_token(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<()> {
        if let Some(mut entry) = self.tokens.get_mut(&id) {
            if !entry.is_deleted() {
                entry.accessed_at = at;
            }
        }
        Ok(())
    }

    async fn transition_token(
        &self,
        id: Uuid,
        to: TokenStatus,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Token>> {
        let Some(mut entry) = self.tokens.get_mut(&id) else {
            return Ok(None);
        };
        if !entry.transition_due(to, now) {
            return Ok(None);
        }
        entry.status = to;
        Ok(Some(entry.clone()))
    }

    async fn charge_token(&self, id: Uuid, units: i64) -> AppResult<Option<Token>> {
        let Some(mut entry) = self.tokens.get_mut(&id) else {
            return Ok(None);
        };
        if entry.is_deleted() || !entry.status.is_enabled() || !entry.can_afford(units) {
            return Ok(None);
        }
        if !entry.unlimited_quota {
            entry.remaining_quota -= units;
        }
        Ok(Some(entry.clone()))
    }

    async fn delete_token(&self, id: Uuid) -> AppResult<bool> {
        let Some(mut entry) = self.tokens.get_mut(&id) else {
            return Ok(false);
        };
        if entry.is_deleted() {
            return Ok(false);
        }
        entry.deleted_at = Some(Utc::now());
        Ok(true)
    }

    async fn page_tokens(
        &self,
        owner: Option<Uuid>,
        keyword: Option<&str>,
        page: &PageRequest,
    ) -> AppResult<PageResponse<Token>> {
        let needle = keyword.map(str::to_lowercase);
        let mut tokens: Vec<Token> = self
            .tokens
            .iter()
            .filter(|t| !t.is_deleted())
            .filter(|t| owner.is_none_or(|owner| t.user_id == owner))
            .filter(|t| {
                needle
                    .as_deref()
                    .is_none_or(|n| t.name.to_lowercase().contains(n))
            })
            .map(|t| t.clone())
            .collect();
        tokens.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(Self::paginate(tokens, page))
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}
