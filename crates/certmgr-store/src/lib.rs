//! Record store for certmgr.
//!
//! Certificates are kept as a flat table keyed by id, with `issuer_id`
//! pointing at the issuing row (`None` for the namespace root). Trees are
//! walked by querying children, never by holding object graphs in memory.
//!
//! Two backends implement [`RecordStore`]:
//! - [`MemoryStore`] - process-local, used in tests and ephemeral setups
//! - [`SqliteStore`] - SQLite file or in-memory database

#![forbid(unsafe_code)]

pub mod error;
pub mod memory;
pub mod model;
pub mod ops;
pub mod sqlite;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use model::{
    CertificateId, CertificateRecord, Namespace, NamespaceFields, NamespaceId, NewCertificate,
    issuer_ref,
};
pub use ops::{CertificateOps, NamespaceOps, RecordStore, StoreOps};
pub use sqlite::SqliteStore;
