//! Login gate backed by the local store

use std::sync::Arc;

use crate::config::SessionConfig;
use crate::store::{LocalStore, IS_LOGGED_IN};

/// Compares credentials against the configured pair and keeps the logged-in flag
#[derive(Debug, Clone)]
pub struct SessionGate {
    store: Arc<LocalStore>,
    username: String,
    password: String,
}

impl SessionGate {
    pub fn new(config: &SessionConfig, store: Arc<LocalStore>) -> Self {
        Self {
            store,
            username: config.username.clone(),
            password: config.password.clone(),
        }
    }

    /// Returns whether the credentials matched
    pub async fn login(&self, username: &str, password: &str) -> crate::Result<bool> {
        if username != self.username || password != self.password {
            tracing::info!("Rejected login for '{}'", username);
            return Ok(false);
        }
        self.store.set(IS_LOGGED_IN, "true").await?;
        tracing::info!("User '{}' logged in", username);
        Ok(true)
    }

    pub async fn logout(&self) -> crate::Result<()> {
        self.store.remove(IS_LOGGED_IN).await?;
        tracing::info!("Logged out");
        Ok(())
    }

    pub async fn is_logged_in(&self) -> bool {
        self.store.get(IS_LOGGED_IN).await.as_deref() == Some("true")
    }
}
