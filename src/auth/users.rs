//! User lookup collaborator
use crate::auth::provider::Identity;
use async_trait::async_trait;
use dashmap::DashMap;

use crate::config::UserConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub username: String,
    /// Digest produced by the configured password hasher
    pub password_digest: String,
    pub authorities: Vec<String>,
    pub enabled: bool,
}

impl UserRecord {
    pub fn identity(&self) -> Identity {
        Identity::new(self.username.clone(), self.authorities.clone())
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find(&self, username: &str) -> Option<UserRecord>;
}

/// In-memory user store, seeded from configuration
#[derive(Default)]
pub struct InMemoryUserStore {
    users: DashMap<String, UserRecord>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(users: &[UserConfig]) -> Self {
        let store = Self::new();
        for user in users {
            store.insert(UserRecord {
                username: user.username.clone(),
                password_digest: user.password.clone(),
                authorities: user.authorities.clone(),
                enabled: user.enabled,
            });
        }
        store
    }

    pub fn insert(&self, user: UserRecord) {
        self.users.insert(user.username.clone(), user);
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find(&self, username: &str) -> Option<UserRecord> {
        self.users.get(username).map(|u| u.value().clone())
    }
}
