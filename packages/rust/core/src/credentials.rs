//! Provider credential lookup: process environment first, then the user's
//! saved credentials.

use std::sync::Arc;

use tracing::debug;

use flowsmith_shared::{CredentialStore, FlowsmithError, Result, is_configured_credential};

/// Resolves named credentials for a principal.
#[derive(Clone)]
pub struct CredentialResolver {
    store: Arc<dyn CredentialStore>,
}

impl CredentialResolver {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// The usable value of `name` for `user_id`.
    ///
    /// A value equal to the `dummy` sentinel counts as missing. Missing
    /// credentials are a [`FlowsmithError::Config`] the user can act on.
    pub async fn resolve(&self, user_id: &str, name: &str) -> Result<String> {
        if let Ok(value) = std::env::var(name) {
            if is_configured_credential(&value) {
                debug!(name, "credential found in environment");
                return Ok(value);
            }
        }

        if let Some(value) = self.store.get(user_id, name).await? {
            if is_configured_credential(&value) {
                debug!(name, user_id, "credential found in store");
                return Ok(value);
            }
        }

        Err(FlowsmithError::config(format!(
            "{name} is not configured. Set the {name} environment variable or save it with \
             `flowsmith credentials set {name} <value>`."
        )))
    }
}
