//! Tar packaging for exported certificate chains.

use std::fmt;

use certmgr_store::CertificateRecord;
use chrono::Utc;
use tar::{Builder, EntryType, Header};

use crate::error::{Error, Result};

/// Archive entry holding the leaf-to-root certificate chain.
pub const CERTIFICATE_ENTRY: &str = "certificate.pem";

/// Archive entry holding the leaf's private key.
pub const KEY_ENTRY: &str = "key.pem";

const CERTIFICATE_MODE: u32 = 0o644;
const KEY_MODE: u32 = 0o600;

/// The two files of an export, before packaging.
#[derive(Clone, PartialEq, Eq)]
pub struct ExportBundle {
    /// Every certificate PEM of the chain, leaf first.
    pub certificate_pem: String,
    /// The leaf's PEM private key.
    pub key_pem: String,
}

impl ExportBundle {
    /// Builds the bundle from an ancestor chain whose first element is the
    /// exported certificate.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if the chain is empty.
    pub fn from_chain(chain: &[CertificateRecord]) -> Result<Self> {
        let leaf = chain
            .first()
            .ok_or_else(|| Error::InvalidRequest("cannot export an empty chain".into()))?;

        let mut certificate_pem = String::new();
        for record in chain {
            certificate_pem.push_str(&record.cert_pem);
            certificate_pem.push('\n');
        }
        let mut key_pem = leaf.key_pem.clone();
        key_pem.push('\n');

        Ok(Self {
            certificate_pem,
            key_pem,
        })
    }

    /// Packages the bundle as an uncompressed tar archive.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Archive`] if an entry cannot be written.
    pub fn to_tar(&self) -> Result<Vec<u8>> {
        let mut builder = Builder::new(Vec::new());
        let mtime = u64::try_from(Utc::now().timestamp()).unwrap_or_default();
        append(
            &mut builder,
            CERTIFICATE_ENTRY,
            CERTIFICATE_MODE,
            mtime,
            self.certificate_pem.as_bytes(),
        )?;
        append(&mut builder, KEY_ENTRY, KEY_MODE, mtime, self.key_pem.as_bytes())?;
        builder
            .into_inner()
            .map_err(|e| Error::Archive(format!("failed to finish archive: {e}")))
    }
}

impl fmt::Debug for ExportBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportBundle")
            .field("certificate_pem_len", &self.certificate_pem.len())
            .field("key_pem", &"[REDACTED]")
            .finish()
    }
}

fn append(
    builder: &mut Builder<Vec<u8>>,
    name: &str,
    mode: u32,
    mtime: u64,
    data: &[u8],
) -> Result<()> {
    let mut header = Header::new_ustar();
    header.set_entry_type(EntryType::Regular);
    header.set_size(data.len() as u64);
    header.set_mode(mode);
    header.set_mtime(mtime);
    builder
        .append_data(&mut header, name, data)
        .map_err(|e| Error::Archive(format!("failed to write {name}: {e}")))
}
