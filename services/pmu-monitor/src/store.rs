//! Small durable key-value store for the console's local state

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tokio::sync::RwLock;

use crate::model::Protocol;
use crate::PmuMonitorError;

/// `"true"` while a user is logged in
pub const IS_LOGGED_IN: &str = "isLoggedIn";
/// Last protocol chosen by the user (`udp` or `tcp`)
pub const SELECTED_PROTOCOL: &str = "selectedProtocol";

/// String map persisted as a JSON object, rewritten atomically on every change
#[derive(Debug)]
pub struct LocalStore {
    path: Option<PathBuf>,
    values: RwLock<BTreeMap<String, String>>,
}

impl LocalStore {
    /// Load the store; a missing or corrupt file starts empty
    pub async fn open(path: impl Into<PathBuf>) -> crate::Result<Self> {
        let path = path.into();
        let values = match tokio::fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(values) => values,
                Err(e) => {
                    tracing::warn!("Ignoring corrupt store {}: {}", path.display(), e);
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(PmuMonitorError::Store(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };
        tracing::debug!("Opened store {} with {} key(s)", path.display(), values.len());
        Ok(Self {
            path: Some(path),
            values: RwLock::new(values),
        })
    }

    /// A store that never touches disk
    pub fn in_memory() -> Self {
        Self {
            path: None,
            values: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.values.read().await.get(key).cloned()
    }

    /// Memory only changes once the new map is on disk
    pub async fn set(&self, key: &str, value: &str) -> crate::Result<()> {
        let mut values = self.values.write().await;
        let mut next = values.clone();
        next.insert(key.to_string(), value.to_string());
        self.persist(&next).await?;
        *values = next;
        Ok(())
    }

    pub async fn remove(&self, key: &str) -> crate::Result<()> {
        let mut values = self.values.write().await;
        if !values.contains_key(key) {
            return Ok(());
        }
        let mut next = values.clone();
        next.remove(key);
        self.persist(&next).await?;
        *values = next;
        Ok(())
    }

    /// Stored protocol, defaulting to UDP
    pub async fn protocol(&self) -> Protocol {
        self.get(SELECTED_PROTOCOL)
            .await
            .and_then(|p| p.parse().ok())
            .unwrap_or_default()
    }

    // Called with the write lock held so writes land in order
    async fn persist(&self, values: &BTreeMap<String, String>) -> crate::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(values)?;
        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, json.as_bytes())
            .await
            .map_err(|e| PmuMonitorError::Store(format!("Failed to write {}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, path).await.map_err(|e| {
            PmuMonitorError::Store(format!("Failed to replace {}: {}", path.display(), e))
        })?;
        Ok(())
    }
}
