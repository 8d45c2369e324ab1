//! Certificate lifecycle operations for certmgr.
//!
//! [`CertificateService`] drives the X.509 engine in `certmgr-pki` against
//! any [`certmgr_store::RecordStore`]: it issues certificates under a chosen
//! issuer or as a namespace root, lists and describes them, renews them in
//! place, deletes whole subtrees atomically and exports leaf-to-root chains
//! as tar archives. [`NamespaceService`] manages the namespaces that own
//! them.
//!
//! Every operation takes a [`RequestContext`] carrying the caller's
//! cancellation token and tracing span.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use certmgr_pki::{CertUsage, Subject};
//! use certmgr_service::{
//!     CertificateService, CreateCertificateRequest, NamespaceRequest, NamespaceService,
//!     RequestContext,
//! };
//! use certmgr_store::MemoryStore;
//!
//! let store = Arc::new(MemoryStore::new());
//! let namespaces = NamespaceService::new(Arc::clone(&store));
//! let certificates = CertificateService::new(store);
//! let ctx = RequestContext::background();
//!
//! let ns = namespaces.create(&ctx, NamespaceRequest::new("acme", "")).unwrap();
//! let root = certificates
//!     .create(
//!         &ctx,
//!         CreateCertificateRequest::new(ns.id, Subject::common_name("Acme Root"), CertUsage::Ca, 3650),
//!     )
//!     .unwrap();
//! assert!(root.is_ca);
//! ```

#![forbid(unsafe_code)]

pub mod certificates;
pub mod chain;
pub mod context;
pub mod error;
pub mod export;
pub mod namespaces;
pub mod views;

pub use certificates::CertificateService;
pub use chain::{ChainWalker, DEFAULT_MAX_DEPTH, DEFAULT_MAX_NODES};
pub use context::RequestContext;
pub use error::{Error, Phase, Result};
pub use export::{CERTIFICATE_ENTRY, ExportBundle, KEY_ENTRY};
pub use namespaces::{MAX_NAME_LEN, NamespaceService};
pub use views::{
    CertificateDetail, CertificateSummary, CertificateView, CreateCertificateRequest,
    NamespaceRequest, NamespaceView,
};
