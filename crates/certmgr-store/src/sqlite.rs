//! SQLite record store.

use std::path::Path;

use certmgr_pki::CertUsage;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::model::{
    CertificateId, CertificateRecord, Namespace, NamespaceFields, NamespaceId, NewCertificate,
};
use crate::ops::{CertificateOps, NamespaceOps, RecordStore, StoreOps};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS namespaces (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL UNIQUE,
    description TEXT NOT NULL DEFAULT '',
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS certificates (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    namespace_id INTEGER NOT NULL REFERENCES namespaces(id),
    issuer_id    INTEGER NOT NULL DEFAULT 0,
    cert_pem     TEXT NOT NULL,
    key_pem      TEXT NOT NULL,
    description  TEXT NOT NULL DEFAULT '',
    usage        TEXT,
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_certificates_namespace ON certificates(namespace_id);
CREATE INDEX IF NOT EXISTS idx_certificates_issuer ON certificates(issuer_id);
";

const CERT_COLUMNS: &str =
    "id, namespace_id, issuer_id, cert_pem, key_pem, description, usage, created_at, updated_at";
const NAMESPACE_COLUMNS: &str = "id, name, description, created_at, updated_at";

/// Record store backed by a single SQLite connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (creating if needed) a database file and its parent directory.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the directory or database cannot be
    /// created or the schema cannot be applied.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Backend(format!("failed to create {}: {e}", parent.display()))
            })?;
        }
        info!(path = %path.display(), "opening SQLite record store");
        Self::init(Connection::open(path)?)
    }

    /// Opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the schema cannot be applied.
    pub fn open_in_memory() -> StoreResult<Self> {
        debug!("opening in-memory SQLite record store");
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StoreResult<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl RecordStore for SqliteStore {
    fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&dyn StoreOps) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(StoreError::from)?;
        let handle = SqliteTx { conn: &tx };
        let value = f(&handle)?;
        tx.commit().map_err(StoreError::from)?;
        debug!("sqlite transaction committed");
        Ok(value)
    }
}

/// Operations running inside an open SQLite transaction.
struct SqliteTx<'a> {
    conn: &'a Connection,
}

trait WithConnection {
    fn with_conn<R>(&self, f: impl FnOnce(&Connection) -> R) -> R;
}

impl WithConnection for SqliteStore {
    fn with_conn<R>(&self, f: impl FnOnce(&Connection) -> R) -> R {
        f(&self.conn.lock())
    }
}

impl WithConnection for SqliteTx<'_> {
    fn with_conn<R>(&self, f: impl FnOnce(&Connection) -> R) -> R {
        f(self.conn)
    }
}

macro_rules! connection_ops {
    ($ty:ty) => {
        impl CertificateOps for $ty {
            fn create_certificate(&self, new: NewCertificate) -> StoreResult<CertificateRecord> {
                self.with_conn(|conn| create_certificate(conn, new))
            }

            fn get_certificate(&self, id: CertificateId) -> StoreResult<CertificateRecord> {
                self.with_conn(|conn| get_certificate(conn, id))
            }

            fn list_certificates_by_namespace(
                &self,
                namespace_id: NamespaceId,
            ) -> StoreResult<Vec<CertificateRecord>> {
                self.with_conn(|conn| query_certificates(conn, "namespace_id = ?1", namespace_id.get()))
            }

            fn list_certificates_by_issuer(
                &self,
                issuer_id: CertificateId,
            ) -> StoreResult<Vec<CertificateRecord>> {
                self.with_conn(|conn| query_certificates(conn, "issuer_id = ?1", issuer_id.get()))
            }

            fn count_root_certificates(&self, namespace_id: NamespaceId) -> StoreResult<usize> {
                self.with_conn(|conn| {
                    count(
                        conn,
                        "SELECT COUNT(*) FROM certificates WHERE namespace_id = ?1 AND issuer_id = 0",
                        namespace_id.get(),
                    )
                })
            }

            fn update_certificate_pem(&self, id: CertificateId, cert_pem: &str) -> StoreResult<()> {
                self.with_conn(|conn| {
                    let changed = conn.execute(
                        "UPDATE certificates SET cert_pem = ?1, updated_at = ?2 WHERE id = ?3",
                        params![cert_pem, Utc::now(), id.get()],
                    )?;
                    if changed == 0 {
                        return Err(StoreError::certificate_not_found(id.get()));
                    }
                    Ok(())
                })
            }

            fn delete_certificate(&self, id: CertificateId) -> StoreResult<()> {
                self.with_conn(|conn| {
                    let changed = conn.execute("DELETE FROM certificates WHERE id = ?1", [id.get()])?;
                    if changed == 0 {
                        return Err(StoreError::certificate_not_found(id.get()));
                    }
                    Ok(())
                })
            }
        }

        impl NamespaceOps for $ty {
            fn create_namespace(&self, fields: NamespaceFields) -> StoreResult<Namespace> {
                self.with_conn(|conn| {
                    conn.execute(
                        "INSERT INTO namespaces (name, description, created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?3)",
                        params![fields.name, fields.desc, Utc::now()],
                    )
                    .map_err(|e| unique_violation(e, &fields.name))?;
                    get_namespace(conn, NamespaceId::new(conn.last_insert_rowid()))
                })
            }

            fn get_namespace(&self, id: NamespaceId) -> StoreResult<Namespace> {
                self.with_conn(|conn| get_namespace(conn, id))
            }

            fn list_namespaces(&self) -> StoreResult<Vec<Namespace>> {
                self.with_conn(|conn| {
                    let mut stmt =
                        conn.prepare(&format!("SELECT {NAMESPACE_COLUMNS} FROM namespaces ORDER BY id"))?;
                    let rows = stmt.query_map([], namespace_from_row)?;
                    Ok(rows.collect::<Result<Vec<_>, _>>()?)
                })
            }

            fn update_namespace(&self, id: NamespaceId, fields: NamespaceFields) -> StoreResult<Namespace> {
                self.with_conn(|conn| {
                    let changed = conn
                        .execute(
                            "UPDATE namespaces SET name = ?1, description = ?2, updated_at = ?3
                             WHERE id = ?4",
                            params![fields.name, fields.desc, Utc::now(), id.get()],
                        )
                        .map_err(|e| unique_violation(e, &fields.name))?;
                    if changed == 0 {
                        return Err(StoreError::namespace_not_found(id.get()));
                    }
                    get_namespace(conn, id)
                })
            }

            fn delete_namespace(&self, id: NamespaceId) -> StoreResult<()> {
                self.with_conn(|conn| {
                    let changed = conn.execute("DELETE FROM namespaces WHERE id = ?1", [id.get()])?;
                    if changed == 0 {
                        return Err(StoreError::namespace_not_found(id.get()));
                    }
                    Ok(())
                })
            }

            fn count_certificates(&self, namespace_id: NamespaceId) -> StoreResult<usize> {
                self.with_conn(|conn| {
                    count(
                        conn,
                        "SELECT COUNT(*) FROM certificates WHERE namespace_id = ?1",
                        namespace_id.get(),
                    )
                })
            }
        }
    };
}

connection_ops!(SqliteStore);
connection_ops!(SqliteTx<'_>);

fn create_certificate(conn: &Connection, new: NewCertificate) -> StoreResult<CertificateRecord> {
    if let Some(issuer) = new.issuer_id {
        let exists = count(conn, "SELECT COUNT(*) FROM certificates WHERE id = ?1", issuer.get())?;
        if exists == 0 {
            return Err(StoreError::Constraint(format!(
                "issuer certificate {issuer} does not exist"
            )));
        }
    }

    let now = Utc::now();
    conn.execute(
        "INSERT INTO certificates
            (namespace_id, issuer_id, cert_pem, key_pem, description, usage, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        params![
            new.namespace_id.get(),
            new.issuer_id.map_or(0, CertificateId::get),
            new.cert_pem,
            new.key_pem,
            new.desc,
            new.usage.map(|u| u.as_str()),
            now,
        ],
    )?;
    get_certificate(conn, CertificateId::new(conn.last_insert_rowid()))
}

fn get_certificate(conn: &Connection, id: CertificateId) -> StoreResult<CertificateRecord> {
    conn.query_row(
        &format!("SELECT {CERT_COLUMNS} FROM certificates WHERE id = ?1"),
        [id.get()],
        certificate_from_row,
    )
    .optional()?
    .ok_or_else(|| StoreError::certificate_not_found(id.get()))
}

fn query_certificates(
    conn: &Connection,
    filter: &str,
    value: i64,
) -> StoreResult<Vec<CertificateRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CERT_COLUMNS} FROM certificates WHERE {filter} ORDER BY id"
    ))?;
    let rows = stmt.query_map([value], certificate_from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

fn get_namespace(conn: &Connection, id: NamespaceId) -> StoreResult<Namespace> {
    conn.query_row(
        &format!("SELECT {NAMESPACE_COLUMNS} FROM namespaces WHERE id = ?1"),
        [id.get()],
        namespace_from_row,
    )
    .optional()?
    .ok_or_else(|| StoreError::namespace_not_found(id.get()))
}

fn count(conn: &Connection, sql: &str, value: i64) -> StoreResult<usize> {
    let n: i64 = conn.query_row(sql, [value], |row| row.get(0))?;
    Ok(usize::try_from(n).unwrap_or_default())
}

fn unique_violation(err: rusqlite::Error, name: &str) -> StoreError {
    match StoreError::from(err) {
        StoreError::Constraint(msg) if msg.contains("UNIQUE") => {
            StoreError::DuplicateName(name.to_string())
        }
        other => other,
    }
}

fn certificate_from_row(row: &Row<'_>) -> rusqlite::Result<CertificateRecord> {
    let issuer: i64 = row.get(2)?;
    let usage: Option<String> = row.get(6)?;
    let usage = usage
        .filter(|u| !u.is_empty())
        .map(|u| u.parse::<CertUsage>())
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?;
    let created_at: DateTime<Utc> = row.get(7)?;
    let updated_at: DateTime<Utc> = row.get(8)?;

    Ok(CertificateRecord {
        id: CertificateId::new(row.get(0)?),
        namespace_id: NamespaceId::new(row.get(1)?),
        issuer_id: (issuer != 0).then_some(CertificateId::new(issuer)),
        cert_pem: row.get(3)?,
        key_pem: row.get(4)?,
        desc: row.get(5)?,
        usage,
        created_at,
        updated_at,
    })
}

fn namespace_from_row(row: &Row<'_>) -> rusqlite::Result<Namespace> {
    Ok(Namespace {
        id: NamespaceId::new(row.get(0)?),
        name: row.get(1)?,
        desc: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}
