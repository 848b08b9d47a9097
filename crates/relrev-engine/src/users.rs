use std::sync::Arc;

use relrev_store::{Collection, Key, ObjectStore};
use relrev_types::User;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::EngineResult;

pub const USERS_KEY: &str = "users";
pub const CURRENT_USER_KEY: &str = "current-user";

/// Reviewers shipped with a fresh install.
pub fn default_users() -> Vec<User> {
    vec![
        User::new("user-1", "John Doe").with_email("john@example.com"),
        User::new("user-2", "Jane Smith").with_email("jane@example.com"),
        User::new("user-3", "Mike Johnson").with_email("mike@example.com"),
    ]
}

/// Known reviewers and which of them is acting on this device.
#[derive(Clone)]
pub struct UserDirectory {
    store: Arc<dyn ObjectStore>,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Write the default reviewers if no user list is stored yet.
    /// Returns `true` if it wrote anything.
    pub async fn seed_defaults(&self) -> EngineResult<bool> {
        if self.store.get(Collection::Users, &Key::from(USERS_KEY)).await?.is_some() {
            return Ok(false);
        }
        self.save_users(&default_users()).await?;
        info!("seeded default users");
        Ok(true)
    }

    pub async fn list_users(&self) -> EngineResult<Vec<User>> {
        let stored = self.store.get(Collection::Users, &Key::from(USERS_KEY)).await?;
        Ok(stored.and_then(parse::<Vec<User>>).unwrap_or_default())
    }

    pub async fn save_users(&self, users: &[User]) -> EngineResult<()> {
        let value = serde_json::to_value(users)?;
        self.store.put(Collection::Users, Key::from(USERS_KEY), value).await?;
        Ok(())
    }

    pub async fn get_user_by_id(&self, id: &str) -> EngineResult<Option<User>> {
        Ok(self.list_users().await?.into_iter().find(|u| u.id == id))
    }

    /// The selected user, or the first known user if none is selected.
    pub async fn current_user(&self) -> EngineResult<Option<User>> {
        let selected = self
            .store
            .get(Collection::Users, &Key::from(CURRENT_USER_KEY))
            .await?
            .and_then(parse::<User>);
        match selected {
            Some(user) => Ok(Some(user)),
            None => Ok(self.list_users().await?.into_iter().next()),
        }
    }

    pub async fn set_current_user(&self, user: &User) -> EngineResult<()> {
        let value = serde_json::to_value(user)?;
        self.store
            .put(Collection::Users, Key::from(CURRENT_USER_KEY), value)
            .await?;
        info!(user = %user.id, "current user changed");
        Ok(())
    }
}

fn parse<T: serde::de::DeserializeOwned>(value: Value) -> Option<T> {
    match serde_json::from_value(value) {
        Ok(parsed) => Some(parsed),
        Err(error) => {
            warn!(%error, "ignoring unreadable user record");
            None
        }
    }
}
