//! libSQL storage layer for Flowsmith.
//!
//! The [`Storage`] struct wraps a local libSQL database holding user-scoped
//! credentials and implements [`CredentialStore`] over it. The schema is
//! migrated on every [`Storage::open`].

mod migrations;

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use flowsmith_shared::{CredentialStore, FlowsmithError, Result};
use libsql::{Connection, Database, params};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

fn storage_err(e: libsql::Error) -> FlowsmithError {
    FlowsmithError::Storage(e.to_string())
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| FlowsmithError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        let storage = Self { db, conn };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        FlowsmithError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    // -----------------------------------------------------------------------
    // Credentials
    // -----------------------------------------------------------------------

    /// Insert or replace a credential value.
    pub async fn upsert_credential(&self, user_id: &str, name: &str, value: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO credentials (user_id, name, value, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(user_id, name) DO UPDATE SET
                   value = excluded.value,
                   updated_at = excluded.updated_at",
                params![user_id, name, value, now.as_str(), now.as_str()],
            )
            .await
            .map_err(storage_err)?;
        tracing::debug!(user_id, name, "credential saved");
        Ok(())
    }

    /// Fetch a credential value.
    pub async fn get_credential(&self, user_id: &str, name: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT value FROM credentials WHERE user_id = ?1 AND name = ?2",
                params![user_id, name],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row.get::<String>(0).map_err(storage_err)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }

    /// Credential names saved for `user_id`, sorted. Values are never listed.
    pub async fn list_credential_names(&self, user_id: &str) -> Result<Vec<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT name FROM credentials WHERE user_id = ?1 ORDER BY name",
                params![user_id],
            )
            .await
            .map_err(storage_err)?;

        let mut names = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            names.push(row.get::<String>(0).map_err(storage_err)?);
        }
        Ok(names)
    }
}

#[async_trait]
impl CredentialStore for Storage {
    async fn get(&self, user_id: &str, name: &str) -> Result<Option<String>> {
        self.get_credential(user_id, name).await
    }

    async fn set(&self, user_id: &str, name: &str, value: &str) -> Result<()> {
        self.upsert_credential(user_id, name, value).await
    }

    async fn list_names(&self, user_id: &str) -> Result<Vec<String>> {
        self.list_credential_names(user_id).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
