//! The record store contract.
//!
//! Reads and writes are split into [`CertificateOps`] and [`NamespaceOps`] so
//! that the same code can run against a store directly or inside a
//! transaction handle passed to [`RecordStore::transaction`].

use crate::error::{StoreError, StoreResult};
use crate::model::{
    CertificateId, CertificateRecord, Namespace, NamespaceFields, NamespaceId, NewCertificate,
};

/// Certificate table operations.
pub trait CertificateOps {
    /// Inserts a certificate, assigning its id and timestamps.
    fn create_certificate(&self, new: NewCertificate) -> StoreResult<CertificateRecord>;

    /// Fetches one certificate.
    fn get_certificate(&self, id: CertificateId) -> StoreResult<CertificateRecord>;

    /// All certificates of a namespace, ordered by id.
    fn list_certificates_by_namespace(
        &self,
        namespace_id: NamespaceId,
    ) -> StoreResult<Vec<CertificateRecord>>;

    /// Direct children of a certificate, ordered by id.
    fn list_certificates_by_issuer(
        &self,
        issuer_id: CertificateId,
    ) -> StoreResult<Vec<CertificateRecord>>;

    /// Number of self-signed roots in a namespace.
    fn count_root_certificates(&self, namespace_id: NamespaceId) -> StoreResult<usize>;

    /// Replaces the certificate PEM and bumps `updated_at`.
    fn update_certificate_pem(&self, id: CertificateId, cert_pem: &str) -> StoreResult<()>;

    /// Deletes one certificate row; children are not touched.
    fn delete_certificate(&self, id: CertificateId) -> StoreResult<()>;
}

/// Namespace table operations.
pub trait NamespaceOps {
    /// Inserts a namespace; fails with [`StoreError::DuplicateName`] if the name is taken.
    fn create_namespace(&self, fields: NamespaceFields) -> StoreResult<Namespace>;

    /// Fetches one namespace.
    fn get_namespace(&self, id: NamespaceId) -> StoreResult<Namespace>;

    /// All namespaces, ordered by id.
    fn list_namespaces(&self) -> StoreResult<Vec<Namespace>>;

    /// Renames or re-describes a namespace.
    fn update_namespace(&self, id: NamespaceId, fields: NamespaceFields) -> StoreResult<Namespace>;

    /// Deletes an empty namespace; fails with [`StoreError::Constraint`] if it
    /// still owns certificates.
    fn delete_namespace(&self, id: NamespaceId) -> StoreResult<()>;

    /// Number of certificates owned by a namespace.
    fn count_certificates(&self, namespace_id: NamespaceId) -> StoreResult<usize>;
}

/// Everything a transaction body can do.
pub trait StoreOps: CertificateOps + NamespaceOps {}

impl<T: CertificateOps + NamespaceOps + ?Sized> StoreOps for T {}

/// A store that can run a batch of operations atomically.
pub trait RecordStore: StoreOps + Send + Sync {
    /// Runs `f` against a transaction handle. Changes become visible only if
    /// `f` returns `Ok`; any `Err` discards all of them.
    ///
    /// `f` must only use the handle it is given. Calling back into the store
    /// itself from inside `f` may deadlock.
    fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&dyn StoreOps) -> Result<T, E>,
        E: From<StoreError>;
}
