//! # certmgr-server
//!
//! HTTP API for certmgr, built on axum over a SQLite record store.
//!
//! ## API Endpoints
//!
//! | Endpoint | Method | Description |
//! |----------|--------|-------------|
//! | `/status` | GET | Liveness check |
//! | `/api/v1/namespaces` | GET, POST | List or create namespaces |
//! | `/api/v1/namespaces/{id}` | GET, PUT, DELETE | Read, update or delete a namespace |
//! | `/api/v1/certificates?namespaceId={id}` | GET | List a namespace's certificates |
//! | `/api/v1/certificates` | POST | Issue a certificate |
//! | `/api/v1/certificates/{id}` | GET, DELETE | Detail, or delete with descendants |
//! | `/api/v1/certificates/{id}/renew` | POST | Re-sign with a new validity window |
//! | `/api/v1/certificates/{id}/export` | POST | Chain and key as a tar archive |
//!
//! Errors are JSON objects `{"error": kind, "message": text}`.

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;
pub mod state;
pub mod telemetry;

pub use config::{Cli, LogFormat, ServerConfig, Storage};
pub use error::{ServerError, ServerResult};
pub use routes::create_router;
pub use server::{CertmgrServer, shutdown_signal};
pub use state::AppState;
