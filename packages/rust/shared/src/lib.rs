//! Shared types, error model, and configuration for Flowsmith.
//!
//! This crate is the foundation depended on by all other Flowsmith crates.
//! It provides:
//! - [`FlowsmithError`] — the unified error type
//! - Wire types ([`ParsedInstruction`], [`FlowGraph`], [`ClarificationQuestion`], ...)
//! - Configuration ([`AppConfig`], [`ProviderConfig`], config loading)
//! - The [`CredentialStore`] collaborator boundary

pub mod config;
pub mod credentials;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, LayoutConfig, OracleConfig, ProviderConfig, RegistryConfig,
    StorageConfig, DEFAULT_MODEL, DEFAULT_PROVIDER, config_dir, config_file_path, expand_home,
    init_config, load_config, load_config_from, save_config, save_config_to,
};
pub use credentials::{
    CredentialStore, DUMMY_CREDENTIAL, MemoryCredentialStore, is_configured_credential,
};
pub use error::{ErrorKind, FlowsmithError, Result};
pub use types::{
    ClarificationAnswer, ClarificationQuestion, ComponentRequirement, ConnectionRequirement,
    DEFAULT_SOURCE_FIELD, FieldBinding, FlowEdge, FlowGraph, FlowNode, ParsedInstruction,
    Position,
};
