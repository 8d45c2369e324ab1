//! Server configuration and command-line parsing.

use std::net::SocketAddr;
use std::path::PathBuf;

use certmgr_service::DEFAULT_MAX_DEPTH;
use clap::{Parser, ValueEnum};

/// certmgr - a small certificate authority over HTTP.
#[derive(Parser, Debug, Clone)]
#[command(name = "certmgr")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Address to listen on.
    #[arg(short, long, env = "CERTMGR_LISTEN", default_value = "127.0.0.1:8080")]
    pub listen: SocketAddr,

    /// SQLite database file. Defaults to `$HOME/.certmgr/certmgr.db`.
    #[arg(long, env = "CERTMGR_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Keep all records in memory; nothing survives a restart.
    #[arg(long, conflicts_with = "db_path")]
    pub in_memory: bool,

    /// Log output format.
    #[arg(long, value_enum, env = "CERTMGR_LOG_FORMAT", default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Deepest issuer chain walked by delete and export.
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    pub max_chain_depth: usize,

    /// Allowed CORS origin; repeat for several. None allows any origin.
    #[arg(long = "cors-origin")]
    pub cors_origins: Vec<String>,
}

impl Cli {
    /// Converts parsed arguments into a [`ServerConfig`].
    #[must_use]
    pub fn into_config(self) -> ServerConfig {
        let storage = if self.in_memory {
            Storage::InMemory
        } else {
            Storage::File(self.db_path.unwrap_or_else(default_db_path))
        };
        ServerConfig {
            bind_addr: self.listen,
            storage,
            log_format: self.log_format,
            max_chain_depth: self.max_chain_depth,
            cors_origins: self.cors_origins,
        }
    }
}

/// Log output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Where records are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Storage {
    /// A SQLite database file.
    File(PathBuf),
    /// A private in-memory SQLite database.
    InMemory,
}

/// Configuration for the HTTP server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the HTTP server to.
    pub bind_addr: SocketAddr,
    /// Record storage.
    pub storage: Storage,
    /// Log output format.
    pub log_format: LogFormat,
    /// Maximum issuer chain depth walked by delete and export.
    pub max_chain_depth: usize,
    /// CORS allowed origins (empty means all).
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            storage: Storage::File(default_db_path()),
            log_format: LogFormat::Text,
            max_chain_depth: DEFAULT_MAX_DEPTH,
            cors_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Create a new configuration with the specified bind address.
    #[must_use]
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Self::default()
        }
    }

    /// Set the record storage.
    #[must_use]
    pub fn with_storage(mut self, storage: Storage) -> Self {
        self.storage = storage;
        self
    }

    /// Set the log format.
    #[must_use]
    pub const fn with_log_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }

    /// Set the maximum chain depth.
    #[must_use]
    pub const fn with_max_chain_depth(mut self, depth: usize) -> Self {
        self.max_chain_depth = depth;
        self
    }

    /// Add a CORS allowed origin.
    #[must_use]
    pub fn with_cors_origin(mut self, origin: impl Into<String>) -> Self {
        self.cors_origins.push(origin.into());
        self
    }
}

/// `$HOME/.certmgr/certmgr.db`, or `./.certmgr/certmgr.db` without a home.
#[must_use]
pub fn default_db_path() -> PathBuf {
    std::env::var_os("HOME")
        .map_or_else(|| PathBuf::from("."), PathBuf::from)
        .join(".certmgr")
        .join("certmgr.db")
}
