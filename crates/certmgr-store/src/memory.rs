//! In-memory record store.

// Guards are held for the whole of each table operation on purpose.
#![allow(clippy::significant_drop_tightening)]

use std::cell::RefCell;
use std::collections::BTreeMap;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::model::{
    CertificateId, CertificateRecord, Namespace, NamespaceFields, NamespaceId, NewCertificate,
};
use crate::ops::{CertificateOps, NamespaceOps, RecordStore, StoreOps};

#[derive(Debug, Clone, Default)]
struct Tables {
    namespaces: BTreeMap<NamespaceId, Namespace>,
    certificates: BTreeMap<CertificateId, CertificateRecord>,
    last_namespace_id: i64,
    last_certificate_id: i64,
}

impl Tables {
    fn create_certificate(&mut self, new: NewCertificate) -> StoreResult<CertificateRecord> {
        if !self.namespaces.contains_key(&new.namespace_id) {
            return Err(StoreError::Constraint(format!(
                "namespace {} does not exist",
                new.namespace_id
            )));
        }
        if let Some(issuer) = new.issuer_id {
            if !self.certificates.contains_key(&issuer) {
                return Err(StoreError::Constraint(format!(
                    "issuer certificate {issuer} does not exist"
                )));
            }
        }

        self.last_certificate_id += 1;
        let now = Utc::now();
        let record = CertificateRecord {
            id: CertificateId::new(self.last_certificate_id),
            namespace_id: new.namespace_id,
            issuer_id: new.issuer_id,
            cert_pem: new.cert_pem,
            key_pem: new.key_pem,
            desc: new.desc,
            usage: new.usage,
            created_at: now,
            updated_at: now,
        };
        self.certificates.insert(record.id, record.clone());
        Ok(record)
    }

    fn get_certificate(&self, id: CertificateId) -> StoreResult<CertificateRecord> {
        self.certificates
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::certificate_not_found(id.get()))
    }

    fn certificates_where(
        &self,
        pred: impl Fn(&CertificateRecord) -> bool,
    ) -> Vec<CertificateRecord> {
        self.certificates
            .values()
            .filter(|c| pred(c))
            .cloned()
            .collect()
    }

    fn update_certificate_pem(&mut self, id: CertificateId, cert_pem: &str) -> StoreResult<()> {
        let record = self
            .certificates
            .get_mut(&id)
            .ok_or_else(|| StoreError::certificate_not_found(id.get()))?;
        record.cert_pem = cert_pem.to_string();
        record.updated_at = Utc::now();
        Ok(())
    }

    fn delete_certificate(&mut self, id: CertificateId) -> StoreResult<()> {
        self.certificates
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::certificate_not_found(id.get()))
    }

    fn ensure_unique_name(&self, name: &str, except: Option<NamespaceId>) -> StoreResult<()> {
        let taken = self
            .namespaces
            .values()
            .any(|ns| ns.name == name && Some(ns.id) != except);
        if taken {
            return Err(StoreError::DuplicateName(name.to_string()));
        }
        Ok(())
    }

    fn create_namespace(&mut self, fields: NamespaceFields) -> StoreResult<Namespace> {
        self.ensure_unique_name(&fields.name, None)?;
        self.last_namespace_id += 1;
        let now = Utc::now();
        let namespace = Namespace {
            id: NamespaceId::new(self.last_namespace_id),
            name: fields.name,
            desc: fields.desc,
            created_at: now,
            updated_at: now,
        };
        self.namespaces.insert(namespace.id, namespace.clone());
        Ok(namespace)
    }

    fn get_namespace(&self, id: NamespaceId) -> StoreResult<Namespace> {
        self.namespaces
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::namespace_not_found(id.get()))
    }

    fn update_namespace(
        &mut self,
        id: NamespaceId,
        fields: NamespaceFields,
    ) -> StoreResult<Namespace> {
        self.ensure_unique_name(&fields.name, Some(id))?;
        let namespace = self
            .namespaces
            .get_mut(&id)
            .ok_or_else(|| StoreError::namespace_not_found(id.get()))?;
        namespace.name = fields.name;
        namespace.desc = fields.desc;
        namespace.updated_at = Utc::now();
        Ok(namespace.clone())
    }

    fn delete_namespace(&mut self, id: NamespaceId) -> StoreResult<()> {
        if !self.namespaces.contains_key(&id) {
            return Err(StoreError::namespace_not_found(id.get()));
        }
        let owned = self.count_certificates(id);
        if owned > 0 {
            return Err(StoreError::Constraint(format!(
                "namespace {id} still owns {owned} certificates"
            )));
        }
        self.namespaces.remove(&id);
        Ok(())
    }

    fn count_certificates(&self, namespace_id: NamespaceId) -> usize {
        self.certificates
            .values()
            .filter(|c| c.namespace_id == namespace_id)
            .count()
    }
}

/// Forwards every operation to `Tables` through a borrow accessor.
macro_rules! forward_ops {
    ($ty:ty, $read:ident, $write:ident) => {
        impl CertificateOps for $ty {
            fn create_certificate(&self, new: NewCertificate) -> StoreResult<CertificateRecord> {
                self.$write().create_certificate(new)
            }

            fn get_certificate(&self, id: CertificateId) -> StoreResult<CertificateRecord> {
                self.$read().get_certificate(id)
            }

            fn list_certificates_by_namespace(
                &self,
                namespace_id: NamespaceId,
            ) -> StoreResult<Vec<CertificateRecord>> {
                Ok(self.$read().certificates_where(|c| c.namespace_id == namespace_id))
            }

            fn list_certificates_by_issuer(
                &self,
                issuer_id: CertificateId,
            ) -> StoreResult<Vec<CertificateRecord>> {
                Ok(self.$read().certificates_where(|c| c.issuer_id == Some(issuer_id)))
            }

            fn count_root_certificates(&self, namespace_id: NamespaceId) -> StoreResult<usize> {
                Ok(self
                    .$read()
                    .certificates_where(|c| c.namespace_id == namespace_id && c.is_root())
                    .len())
            }

            fn update_certificate_pem(&self, id: CertificateId, cert_pem: &str) -> StoreResult<()> {
                self.$write().update_certificate_pem(id, cert_pem)
            }

            fn delete_certificate(&self, id: CertificateId) -> StoreResult<()> {
                self.$write().delete_certificate(id)
            }
        }

        impl NamespaceOps for $ty {
            fn create_namespace(&self, fields: NamespaceFields) -> StoreResult<Namespace> {
                self.$write().create_namespace(fields)
            }

            fn get_namespace(&self, id: NamespaceId) -> StoreResult<Namespace> {
                self.$read().get_namespace(id)
            }

            fn list_namespaces(&self) -> StoreResult<Vec<Namespace>> {
                Ok(self.$read().namespaces.values().cloned().collect())
            }

            fn update_namespace(
                &self,
                id: NamespaceId,
                fields: NamespaceFields,
            ) -> StoreResult<Namespace> {
                self.$write().update_namespace(id, fields)
            }

            fn delete_namespace(&self, id: NamespaceId) -> StoreResult<()> {
                self.$write().delete_namespace(id)
            }

            fn count_certificates(&self, namespace_id: NamespaceId) -> StoreResult<usize> {
                Ok(self.$read().count_certificates(namespace_id))
            }
        }
    };
}

/// Record store kept entirely in process memory.
///
/// Transactions hold the write lock for their whole duration and work on a
/// private copy of the tables, which replaces the shared copy only on success.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        info!("opening in-memory record store");
        Self::default()
    }

    fn read(&self) -> parking_lot::RwLockReadGuard<'_, Tables> {
        self.tables.read()
    }

    fn write(&self) -> parking_lot::RwLockWriteGuard<'_, Tables> {
        self.tables.write()
    }
}

forward_ops!(MemoryStore, read, write);

impl RecordStore for MemoryStore {
    fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&dyn StoreOps) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut shared = self.tables.write();
        let tx = MemoryTx {
            tables: RefCell::new(shared.clone()),
        };
        let result = f(&tx);
        if result.is_ok() {
            *shared = tx.tables.into_inner();
            debug!("memory transaction committed");
        } else {
            debug!("memory transaction rolled back");
        }
        result
    }
}

/// Transaction handle over a private copy of the tables.
struct MemoryTx {
    tables: RefCell<Tables>,
}

impl MemoryTx {
    fn read(&self) -> std::cell::Ref<'_, Tables> {
        self.tables.borrow()
    }

    fn write(&self) -> std::cell::RefMut<'_, Tables> {
        self.tables.borrow_mut()
    }
}

forward_ops!(MemoryTx, read, write);
