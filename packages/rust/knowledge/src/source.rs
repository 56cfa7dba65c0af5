//! Where component descriptors come from.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{info, warn};

use flowsmith_shared::{FlowsmithError, Result};

use crate::descriptor::ComponentDescriptor;

/// `category → name → descriptor`, as yielded by a source.
pub type RegistryCatalog = BTreeMap<String, BTreeMap<String, ComponentDescriptor>>;

/// A provider of component metadata.
#[async_trait]
pub trait RegistrySource: Send + Sync {
    /// Human-readable source name for tracing.
    fn name(&self) -> &str;

    /// Load the full catalog. An empty catalog is a valid answer.
    async fn load(&self) -> Result<RegistryCatalog>;
}

/// Catalog read from a JSON file shaped `{category: {name: descriptor}}`.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RegistrySource for JsonFileSource {
    fn name(&self) -> &str {
        "json-file"
    }

    async fn load(&self) -> Result<RegistryCatalog> {
        if !tokio::fs::try_exists(&self.path).await.unwrap_or(false) {
            warn!(path = ?self.path, "component registry file not found, using empty catalog");
            return Ok(RegistryCatalog::new());
        }

        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| FlowsmithError::io(&self.path, e))?;

        let catalog: RegistryCatalog = serde_json::from_str(&content).map_err(|e| {
            FlowsmithError::decode(format!("invalid registry file {}: {e}", self.path.display()))
        })?;

        info!(path = ?self.path, categories = catalog.len(), "loaded component registry file");
        Ok(catalog)
    }
}

/// Catalog held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    catalog: RegistryCatalog,
}

impl StaticSource {
    pub fn new(catalog: RegistryCatalog) -> Self {
        Self { catalog }
    }

    /// Parse a JSON catalog string.
    pub fn from_json(json: &str) -> Result<Self> {
        let catalog = serde_json::from_str(json)
            .map_err(|e| FlowsmithError::decode(format!("invalid registry JSON: {e}")))?;
        Ok(Self { catalog })
    }
}

#[async_trait]
impl RegistrySource for StaticSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn load(&self) -> Result<RegistryCatalog> {
        Ok(self.catalog.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"{
        "inputs": {
            "ChatInput": {"display_name": "Chat Input", "output_types": ["Message"]}
        },
        "outputs": {
            "ChatOutput": {"inputs": {"input_value": "Message"}}
        }
    }"#;

    #[tokio::test]
    async fn missing_file_is_empty_catalog() {
        let source = JsonFileSource::new("/nonexistent/flowsmith/components.json");
        let catalog = source.load().await.unwrap();
        assert!(catalog.is_empty());
    }

    #[tokio::test]
    async fn loads_json_file() {
        let path = std::env::temp_dir().join(format!("flowsmith_registry_{}.json", std::process::id()));
        std::fs::write(&path, CATALOG).unwrap();

        let catalog = JsonFileSource::new(&path).load().await.unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(
            catalog["inputs"]["ChatInput"].output_types,
            vec!["Message".to_string()]
        );
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn malformed_file_is_decode_error() {
        let path = std::env::temp_dir().join(format!("flowsmith_bad_{}.json", std::process::id()));
        std::fs::write(&path, "{not json").unwrap();

        let err = JsonFileSource::new(&path).load().await.unwrap_err();
        assert!(matches!(err, FlowsmithError::Decode { .. }));
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn static_source_from_json() {
        let source = StaticSource::from_json(CATALOG).unwrap();
        let catalog = source.load().await.unwrap();
        assert!(catalog["outputs"].contains_key("ChatOutput"));
        assert!(StaticSource::from_json("[]").is_err());
    }
}
