//! Test helpers for E2E tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use certmgr_pki::{CertUsage, Subject};
use certmgr_service::{
    CertificateService, CertificateView, CreateCertificateRequest, NamespaceRequest,
    NamespaceService, NamespaceView, RequestContext,
};
use certmgr_store::{
    CertificateId, CertificateOps, CertificateRecord, MemoryStore, Namespace, NamespaceFields,
    NamespaceId, NamespaceOps, NewCertificate, RecordStore, SqliteStore, StoreError, StoreOps,
    StoreResult,
};
use tempfile::TempDir;

/// Services over one store, plus a background context.
pub struct Harness<S> {
    pub store: Arc<S>,
    pub namespaces: NamespaceService<S>,
    pub certificates: CertificateService<S>,
    pub ctx: RequestContext,
}

impl<S: RecordStore> Harness<S> {
    pub fn new(store: S) -> Self {
        let store = Arc::new(store);
        Self {
            namespaces: NamespaceService::new(Arc::clone(&store)),
            certificates: CertificateService::new(Arc::clone(&store)),
            store,
            ctx: RequestContext::background(),
        }
    }

    pub fn namespace(&self, name: &str) -> NamespaceView {
        self.namespaces
            .create(&self.ctx, NamespaceRequest::new(name, ""))
            .unwrap()
    }

    pub fn root(&self, ns: NamespaceId, cn: &str) -> CertificateView {
        self.issue(CreateCertificateRequest::new(
            ns,
            Subject::common_name(cn),
            CertUsage::Ca,
            3650,
        ))
    }

    pub fn intermediate(&self, ns: NamespaceId, issuer: CertificateId, cn: &str) -> CertificateView {
        self.issue(
            CreateCertificateRequest::new(ns, Subject::common_name(cn), CertUsage::Ca, 1825)
                .issued_by(issuer),
        )
    }

    pub fn leaf(&self, ns: NamespaceId, issuer: CertificateId, cn: &str) -> CertificateView {
        self.issue(
            CreateCertificateRequest::new(ns, Subject::common_name(cn), CertUsage::Server, 365)
                .issued_by(issuer)
                .with_dns_names([cn]),
        )
    }

    pub fn issue(&self, req: CreateCertificateRequest) -> CertificateView {
        self.certificates.create(&self.ctx, req).unwrap()
    }

    pub fn exists(&self, id: CertificateId) -> bool {
        let result = self.store.get_certificate(id);
        assert!(
            matches!(result, Ok(_) | Err(StoreError::NotFound { .. })),
            "unexpected store error: {result:?}"
        );
        result.is_ok()
    }
}

/// root -> A -> B -> C, plus D directly under root.
pub struct Chain {
    pub ns: NamespaceId,
    pub root: CertificateId,
    pub a: CertificateId,
    pub b: CertificateId,
    pub c: CertificateId,
    pub d: CertificateId,
}

impl Chain {
    pub fn build<S: RecordStore>(h: &Harness<S>) -> Self {
        let ns = h.namespace("acme").id;
        let root = h.root(ns, "Acme Root").id;
        let a = h.intermediate(ns, root, "A").id;
        let b = h.intermediate(ns, a, "B").id;
        let c = h.leaf(ns, b, "c.acme.test").id;
        let d = h.leaf(ns, root, "d.acme.test").id;
        Self {
            ns,
            root,
            a,
            b,
            c,
            d,
        }
    }
}

pub fn memory() -> Harness<MemoryStore> {
    Harness::new(MemoryStore::new())
}

/// A harness over a SQLite file; keep the directory alive for the test.
pub fn sqlite() -> (Harness<SqliteStore>, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(dir.path().join("certmgr.db")).unwrap();
    (Harness::new(store), dir)
}

// ============================================================================
// Fault injection
// ============================================================================

const NO_FAILURE: i64 = 0;

/// Wraps a store and injects backend failures, both on the store itself and
/// inside transactions: `delete_certificate` or `get_certificate` for one
/// chosen id, and `count_root_certificates` for every namespace.
pub struct FailingStore<S> {
    inner: S,
    fail_delete: AtomicI64,
    fail_get: AtomicI64,
    fail_root_count: AtomicBool,
}

/// The faults armed when an operation starts.
#[derive(Clone, Copy)]
struct Faults {
    delete: Option<CertificateId>,
    get: Option<CertificateId>,
    root_count: bool,
}

impl<S: RecordStore> FailingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            fail_delete: AtomicI64::new(NO_FAILURE),
            fail_get: AtomicI64::new(NO_FAILURE),
            fail_root_count: AtomicBool::new(false),
        }
    }

    pub fn fail_delete_of(&self, id: CertificateId) {
        self.fail_delete.store(id.get(), Ordering::SeqCst);
    }

    pub fn fail_get_of(&self, id: CertificateId) {
        self.fail_get.store(id.get(), Ordering::SeqCst);
    }

    pub fn fail_root_count(&self) {
        self.fail_root_count.store(true, Ordering::SeqCst);
    }

    pub fn heal(&self) {
        self.fail_delete.store(NO_FAILURE, Ordering::SeqCst);
        self.fail_get.store(NO_FAILURE, Ordering::SeqCst);
        self.fail_root_count.store(false, Ordering::SeqCst);
    }

    fn faults(&self) -> Faults {
        let target = |slot: &AtomicI64| match slot.load(Ordering::SeqCst) {
            NO_FAILURE => None,
            id => Some(CertificateId::new(id)),
        };
        Faults {
            delete: target(&self.fail_delete),
            get: target(&self.fail_get),
            root_count: self.fail_root_count.load(Ordering::SeqCst),
        }
    }

    fn ops(&self) -> FailingOps<'_> {
        FailingOps {
            inner: &self.inner,
            faults: self.faults(),
        }
    }
}

struct FailingOps<'a> {
    inner: &'a dyn StoreOps,
    faults: Faults,
}

impl CertificateOps for FailingOps<'_> {
    fn create_certificate(&self, new: NewCertificate) -> StoreResult<CertificateRecord> {
        self.inner.create_certificate(new)
    }

    fn get_certificate(&self, id: CertificateId) -> StoreResult<CertificateRecord> {
        if self.faults.get == Some(id) {
            return Err(StoreError::Backend(format!("injected failure reading {id}")));
        }
        self.inner.get_certificate(id)
    }

    fn list_certificates_by_namespace(
        &self,
        namespace_id: NamespaceId,
    ) -> StoreResult<Vec<CertificateRecord>> {
        self.inner.list_certificates_by_namespace(namespace_id)
    }

    fn list_certificates_by_issuer(
        &self,
        issuer_id: CertificateId,
    ) -> StoreResult<Vec<CertificateRecord>> {
        self.inner.list_certificates_by_issuer(issuer_id)
    }

    fn count_root_certificates(&self, namespace_id: NamespaceId) -> StoreResult<usize> {
        if self.faults.root_count {
            return Err(StoreError::Backend(format!(
                "injected failure counting roots of {namespace_id}"
            )));
        }
        self.inner.count_root_certificates(namespace_id)
    }

    fn update_certificate_pem(&self, id: CertificateId, cert_pem: &str) -> StoreResult<()> {
        self.inner.update_certificate_pem(id, cert_pem)
    }

    fn delete_certificate(&self, id: CertificateId) -> StoreResult<()> {
        if self.faults.delete == Some(id) {
            return Err(StoreError::Backend(format!("injected failure deleting {id}")));
        }
        self.inner.delete_certificate(id)
    }
}

impl NamespaceOps for FailingOps<'_> {
    fn create_namespace(&self, fields: NamespaceFields) -> StoreResult<Namespace> {
        self.inner.create_namespace(fields)
    }

    fn get_namespace(&self, id: NamespaceId) -> StoreResult<Namespace> {
        self.inner.get_namespace(id)
    }

    fn list_namespaces(&self) -> StoreResult<Vec<Namespace>> {
        self.inner.list_namespaces()
    }

    fn update_namespace(&self, id: NamespaceId, fields: NamespaceFields) -> StoreResult<Namespace> {
        self.inner.update_namespace(id, fields)
    }

    fn delete_namespace(&self, id: NamespaceId) -> StoreResult<()> {
        self.inner.delete_namespace(id)
    }

    fn count_certificates(&self, namespace_id: NamespaceId) -> StoreResult<usize> {
        self.inner.count_certificates(namespace_id)
    }
}

impl<S: RecordStore> CertificateOps for FailingStore<S> {
    fn create_certificate(&self, new: NewCertificate) -> StoreResult<CertificateRecord> {
        self.ops().create_certificate(new)
    }

    fn get_certificate(&self, id: CertificateId) -> StoreResult<CertificateRecord> {
        self.ops().get_certificate(id)
    }

    fn list_certificates_by_namespace(
        &self,
        namespace_id: NamespaceId,
    ) -> StoreResult<Vec<CertificateRecord>> {
        self.ops().list_certificates_by_namespace(namespace_id)
    }

    fn list_certificates_by_issuer(
        &self,
        issuer_id: CertificateId,
    ) -> StoreResult<Vec<CertificateRecord>> {
        self.ops().list_certificates_by_issuer(issuer_id)
    }

    fn count_root_certificates(&self, namespace_id: NamespaceId) -> StoreResult<usize> {
        self.ops().count_root_certificates(namespace_id)
    }

    fn update_certificate_pem(&self, id: CertificateId, cert_pem: &str) -> StoreResult<()> {
        self.ops().update_certificate_pem(id, cert_pem)
    }

    fn delete_certificate(&self, id: CertificateId) -> StoreResult<()> {
        self.ops().delete_certificate(id)
    }
}

impl<S: RecordStore> NamespaceOps for FailingStore<S> {
    fn create_namespace(&self, fields: NamespaceFields) -> StoreResult<Namespace> {
        self.ops().create_namespace(fields)
    }

    fn get_namespace(&self, id: NamespaceId) -> StoreResult<Namespace> {
        self.ops().get_namespace(id)
    }

    fn list_namespaces(&self) -> StoreResult<Vec<Namespace>> {
        self.ops().list_namespaces()
    }

    fn update_namespace(&self, id: NamespaceId, fields: NamespaceFields) -> StoreResult<Namespace> {
        self.ops().update_namespace(id, fields)
    }

    fn delete_namespace(&self, id: NamespaceId) -> StoreResult<()> {
        self.ops().delete_namespace(id)
    }

    fn count_certificates(&self, namespace_id: NamespaceId) -> StoreResult<usize> {
        self.ops().count_certificates(namespace_id)
    }
}

impl<S: RecordStore> RecordStore for FailingStore<S> {
    fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&dyn StoreOps) -> Result<T, E>,
        E: From<StoreError>,
    {
        let faults = self.faults();
        self.inner.transaction(|tx| f(&FailingOps { inner: tx, faults }))
    }
}
