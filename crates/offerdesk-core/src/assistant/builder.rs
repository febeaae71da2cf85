//! Builder for creating and configuring Assistant instances.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use log::debug;
use tokio::task;

use super::{Assistant, Settings};
use crate::{
    catalog::FieldCatalog,
    error::{DeskError, Result},
    oracle::{PlanOracle, UnconfiguredOracle},
    store::SqliteStore,
};

/// Builder for creating and configuring Assistant instances.
#[derive(Clone)]
pub struct AssistantBuilder {
    database_path: Option<PathBuf>,
    catalog_path: Option<PathBuf>,
    oracle: Option<Arc<dyn PlanOracle>>,
    settings: Settings,
}

impl AssistantBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            database_path: None,
            catalog_path: None,
            oracle: None,
            settings: Settings::default(),
        }
    }

    /// Sets a custom database file path.
    ///
    /// If not specified, uses XDG Base Directory specification:
    /// `$XDG_DATA_HOME/offerdesk/offerdesk.db` or
    /// `~/.local/share/offerdesk/offerdesk.db`
    pub fn with_database_path<P: AsRef<Path>>(mut self, path: Option<P>) -> Self {
        if let Some(path) = path {
            self.database_path = Some(path.as_ref().to_path_buf());
        }
        self
    }

    /// Sets a field catalog file to use instead of the embedded one.
    pub fn with_catalog_path<P: AsRef<Path>>(mut self, path: Option<P>) -> Self {
        if let Some(path) = path {
            self.catalog_path = Some(path.as_ref().to_path_buf());
        }
        self
    }

    /// Sets the model that produces plans. Without one, every question
    /// fails with an oracle error; stored plans can still be replayed.
    pub fn with_oracle(mut self, oracle: Arc<dyn PlanOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Opens the offer store, creating its directory and schema if needed.
    ///
    /// # Errors
    ///
    /// Returns `DeskError::FileSystem` if the database directory cannot be
    /// created, `DeskError::Database` if initialization fails
    pub async fn open_store(&self) -> Result<SqliteStore> {
        let db_path = match &self.database_path {
            Some(path) => path.clone(),
            None => Self::default_database_path()?,
        };

        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| DeskError::FileSystem {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        debug!("Opening offer store at {}", db_path.display());
        task::spawn_blocking(move || SqliteStore::open(&db_path))
            .await
            .map_err(|e| DeskError::Configuration {
                message: format!("Task join error: {e}"),
            })?
    }

    /// Builds the configured assistant.
    pub async fn build(self) -> Result<Assistant> {
        let store = self.open_store().await?;
        let catalog = match &self.catalog_path {
            Some(path) => FieldCatalog::load(path)?,
            None => FieldCatalog::embedded()?,
        };
        let oracle = self
            .oracle
            .unwrap_or_else(|| Arc::new(UnconfiguredOracle));
        Ok(Assistant::new(oracle, Arc::new(store), catalog, self.settings))
    }

    /// Returns the default database path following XDG Base Directory
    /// specification.
    fn default_database_path() -> Result<PathBuf> {
        xdg::BaseDirectories::with_prefix("offerdesk")
            .place_data_file("offerdesk.db")
            .map_err(|e| DeskError::XdgDirectory(e.to_string()))
    }
}

impl Default for AssistantBuilder {
    fn default() -> Self {
        Self::new()
    }
}
