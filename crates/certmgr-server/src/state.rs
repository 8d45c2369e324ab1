//! Shared state for the HTTP server.

use std::fmt;
use std::sync::Arc;

use certmgr_service::{CertificateService, ChainWalker, NamespaceService};
use certmgr_store::SqliteStore;

use crate::config::{ServerConfig, Storage};
use crate::error::ServerResult;

/// Services shared by every request handler.
pub struct AppState {
    config: ServerConfig,
    certificates: CertificateService<SqliteStore>,
    namespaces: NamespaceService<SqliteStore>,
}

impl AppState {
    /// Opens the configured store and builds the services over it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ServerError::Storage`] if the database cannot be
    /// opened.
    pub fn open(config: ServerConfig) -> ServerResult<Self> {
        let store = match &config.storage {
            Storage::File(path) => SqliteStore::open(path)?,
            Storage::InMemory => SqliteStore::open_in_memory()?,
        };
        Ok(Self::new(config, Arc::new(store)))
    }

    /// Builds the services over an already opened store.
    #[must_use]
    pub fn new(config: ServerConfig, store: Arc<SqliteStore>) -> Self {
        let walker = ChainWalker::new().with_max_depth(config.max_chain_depth);
        Self {
            certificates: CertificateService::new(Arc::clone(&store)).with_walker(walker),
            namespaces: NamespaceService::new(store),
            config,
        }
    }

    /// Server configuration.
    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Certificate lifecycle operations.
    #[must_use]
    pub const fn certificates(&self) -> &CertificateService<SqliteStore> {
        &self.certificates
    }

    /// Namespace operations.
    #[must_use]
    pub const fn namespaces(&self) -> &NamespaceService<SqliteStore> {
        &self.namespaces
    }
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
