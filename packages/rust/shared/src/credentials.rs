//! User-scoped credential store boundary.
//!
//! Stores are keyed by `(user_id, name)`. The libSQL-backed store lives in
//! `flowsmith-storage`; [`MemoryCredentialStore`] serves tests and
//! single-process use.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;

/// Placeholder value that counts as "not configured".
pub const DUMMY_CREDENTIAL: &str = "dummy";

/// Whether `value` is a usable credential (non-empty and not the sentinel).
pub fn is_configured_credential(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && value != DUMMY_CREDENTIAL
}

/// Persistence for named per-user secrets such as provider API keys.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Fetch a credential value, `None` when absent.
    async fn get(&self, user_id: &str, name: &str) -> Result<Option<String>>;

    /// Create or replace a credential.
    async fn set(&self, user_id: &str, name: &str, value: &str) -> Result<()>;

    /// Names of all credentials saved for `user_id`, sorted.
    async fn list_names(&self, user_id: &str) -> Result<Vec<String>>;
}

/// In-process credential store.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    entries: RwLock<BTreeMap<(String, String), String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, user_id: &str, name: &str) -> Result<Option<String>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(&(user_id.to_string(), name.to_string()))
            .cloned())
    }

    async fn set(&self, user_id: &str, name: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .await
            .insert((user_id.to_string(), name.to_string()), value.to_string());
        Ok(())
    }

    async fn list_names(&self, user_id: &str) -> Result<Vec<String>> {
        let entries = self.entries.read().await;
        Ok(entries
            .keys()
            .filter(|(owner, _)| owner == user_id)
            .map(|(_, name)| name.clone())
            .collect())
    }
}
