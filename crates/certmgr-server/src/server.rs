//! HTTP server lifecycle.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::routes::create_router;
use crate::state::AppState;

/// The certmgr HTTP API server.
#[derive(Debug, Clone)]
pub struct CertmgrServer {
    state: Arc<AppState>,
}

impl CertmgrServer {
    /// Opens the configured record store and prepares the server.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened.
    pub fn open(config: ServerConfig) -> ServerResult<Self> {
        Ok(Self::from_state(AppState::open(config)?))
    }

    /// Wraps already built state.
    #[must_use]
    pub fn from_state(state: AppState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    /// Shared state.
    #[must_use]
    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }

    /// Serves on the configured address until `shutdown` completes.
    ///
    /// In-flight requests are allowed to finish.
    ///
    /// # Errors
    ///
    /// Returns an error if binding fails or the server stops abnormally.
    pub async fn serve_with_shutdown<F>(&self, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.state.config().bind_addr;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindFailed(addr, e))?;
        let local: SocketAddr = listener
            .local_addr()
            .map_err(|e| ServerError::Internal(e.to_string()))?;

        info!(addr = %local, "certmgr listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))?;

        info!("certmgr shut down");
        Ok(())
    }

    /// Create the router without starting the server.
    pub fn router(&self) -> axum::Router {
        create_router(Arc::clone(&self.state))
    }
}

/// Completes on Ctrl-C or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::Storage;

    fn test_config() -> ServerConfig {
        ServerConfig::new("127.0.0.1:0".parse().unwrap()).with_storage(Storage::InMemory)
    }

    #[test]
    fn test_server_creation() {
        let server = CertmgrServer::open(test_config()).unwrap();
        assert_eq!(server.state().config().storage, Storage::InMemory);
    }

    #[test]
    fn test_server_clone_shares_state() {
        let server = CertmgrServer::open(test_config()).unwrap();
        let cloned = server.clone();
        assert!(Arc::ptr_eq(&server.state(), &cloned.state()));
    }

    #[test]
    fn test_open_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("certmgr.db");
        let config = test_config().with_storage(Storage::File(path.clone()));
        CertmgrServer::open(config).unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_graceful_shutdown() {
        let server = CertmgrServer::open(test_config()).unwrap();
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            server.serve_with_shutdown(async {}),
        )
        .await
        .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_bind_failure() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap();
        let server = CertmgrServer::open(
            ServerConfig::new(addr).with_storage(Storage::InMemory),
        )
        .unwrap();
        let err = server.serve_with_shutdown(async {}).await.unwrap_err();
        assert!(matches!(err, ServerError::BindFailed(a, _) if a == addr));
    }
}
