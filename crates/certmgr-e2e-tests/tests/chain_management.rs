//! End-to-end tests for the issuer graph: traversal, cascading delete,
//! renewal and export.
//!
//! These tests verify:
//! 1. Descendants are walked depth-first and stay inside the subtree
//! 2. Deleting a certificate removes exactly its subtree
//! 3. A failure mid-delete leaves every row in place
//! 4. Renewal keeps the key, serial and subject
//! 5. Export emits the chain leaf first with the leaf's key

mod helpers;

use std::io::Read;

use certmgr_pki::{Certificate, validate_chain, verify_issued_by};
use certmgr_service::{ChainWalker, Error, RequestContext};
use certmgr_store::{CertificateId, CertificateOps, MemoryStore, RecordStore, SqliteStore};
use helpers::*;
use test_case::test_case;

fn ids(records: &[certmgr_store::CertificateRecord]) -> Vec<CertificateId> {
    records.iter().map(|r| r.id).collect()
}

// ============================================================================
// Traversal
// ============================================================================

fn traversal<S: RecordStore>(h: &Harness<S>) {
    let chain = Chain::build(h);
    let walker = ChainWalker::new();

    let below_root = walker
        .descendants_of(h.store.as_ref(), &h.ctx, chain.root)
        .unwrap();
    assert_eq!(ids(&below_root), vec![chain.a, chain.b, chain.c, chain.d]);

    let below_a = walker
        .descendants_of(h.store.as_ref(), &h.ctx, chain.a)
        .unwrap();
    assert_eq!(ids(&below_a), vec![chain.b, chain.c]);
    assert!(!ids(&below_a).contains(&chain.d));

    assert!(walker
        .descendants_of(h.store.as_ref(), &h.ctx, chain.c)
        .unwrap()
        .is_empty());

    let above_c = walker
        .ancestors_of(h.store.as_ref(), &h.ctx, chain.c)
        .unwrap();
    assert_eq!(ids(&above_c), vec![chain.c, chain.b, chain.a, chain.root]);
}

#[test]
fn test_traversal_memory() {
    traversal(&memory());
}

#[test]
fn test_traversal_sqlite() {
    let (h, _dir) = sqlite();
    traversal(&h);
}

#[test]
fn test_depth_limit_stops_traversal() {
    let h = memory();
    let chain = Chain::build(&h);
    let walker = ChainWalker::new().with_max_depth(2);

    let err = walker
        .ancestors_of(h.store.as_ref(), &h.ctx, chain.c)
        .unwrap_err();
    assert!(matches!(err, Error::ChainTooDeep { limit: 2, .. }));
}

// ============================================================================
// Cascading delete
// ============================================================================

fn cascading_delete<S: RecordStore>(h: &Harness<S>) {
    let chain = Chain::build(h);

    let deleted = h.certificates.delete(&h.ctx, chain.a).unwrap();
    assert_eq!(deleted, vec![chain.b, chain.c, chain.a]);

    assert!(h.exists(chain.root));
    assert!(h.exists(chain.d));
    for id in [chain.a, chain.b, chain.c] {
        assert!(!h.exists(id), "{id} should be gone");
    }

    let deleted = h.certificates.delete(&h.ctx, chain.root).unwrap();
    assert_eq!(deleted, vec![chain.d, chain.root]);
    assert_eq!(h.namespaces.get(&h.ctx, chain.ns).unwrap().cert_count, 0);
}

#[test]
fn test_cascading_delete_memory() {
    cascading_delete(&memory());
}

#[test]
fn test_cascading_delete_sqlite() {
    let (h, _dir) = sqlite();
    cascading_delete(&h);
}

#[test]
fn test_delete_keeps_other_namespaces() {
    let h = memory();
    let chain = Chain::build(&h);
    let globex = h.namespace("globex").id;
    let other_root = h.root(globex, "Globex Root");
    let other_leaf = h.leaf(globex, other_root.id, "www.globex.test");

    h.certificates.delete(&h.ctx, chain.root).unwrap();

    assert!(h.exists(other_root.id));
    assert!(h.exists(other_leaf.id));
    assert_eq!(h.certificates.list(&h.ctx, globex).unwrap().len(), 2);
}

#[test]
fn test_delete_missing_is_not_found() {
    let h = memory();
    let err = h
        .certificates
        .delete(&h.ctx, CertificateId::new(12))
        .unwrap_err();
    assert!(matches!(err, Error::NotFound { entity: "certificate", id: 12 }));
}

fn assert_failed_delete_rolls_back<S: RecordStore>(h: &Harness<FailingStore<S>>) {
    let chain = Chain::build(h);
    h.store.fail_delete_of(chain.b);

    let err = h.certificates.delete(&h.ctx, chain.root).unwrap_err();
    assert!(matches!(err, Error::Store { op: "delete_certificate", id: Some(id), .. } if id == chain.b.get()));

    for id in [chain.root, chain.a, chain.b, chain.c, chain.d] {
        assert!(h.exists(id), "{id} should survive the failed delete");
    }
    assert_eq!(h.namespaces.get(&h.ctx, chain.ns).unwrap().cert_count, 5);

    h.store.heal();
    let deleted = h.certificates.delete(&h.ctx, chain.root).unwrap();
    assert_eq!(deleted.len(), 5);
}

#[test]
fn test_failed_delete_rolls_back_memory() {
    assert_failed_delete_rolls_back(&Harness::new(FailingStore::new(MemoryStore::new())));
}

#[test]
fn test_failed_delete_rolls_back_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(dir.path().join("certmgr.db")).unwrap();
    assert_failed_delete_rolls_back(&Harness::new(FailingStore::new(store)));
}

#[test]
fn test_canceled_delete_changes_nothing() {
    let h = memory();
    let chain = Chain::build(&h);
    let ctx = RequestContext::background();
    ctx.cancel();

    let err = h.certificates.delete(&ctx, chain.root).unwrap_err();
    assert!(matches!(err, Error::Canceled { .. }));
    assert_eq!(h.namespaces.get(&h.ctx, chain.ns).unwrap().cert_count, 5);
}

// ============================================================================
// Renewal
// ============================================================================

#[test_case(true ; "root")]
#[test_case(false ; "intermediate")]
fn test_renewal_preserves_identity(renew_root: bool) {
    let (h, _dir) = sqlite();
    let chain = Chain::build(&h);
    let target = if renew_root { chain.root } else { chain.a };

    let before_record = h.store.get_certificate(target).unwrap();
    let before = Certificate::from_pem(&before_record.cert_pem).unwrap();

    std::thread::sleep(std::time::Duration::from_millis(1100));
    let renewed = h.certificates.renew(&h.ctx, target, 30).unwrap();
    let after = Certificate::from_pem(&renewed.cert_pem).unwrap();

    assert_ne!(renewed.cert_pem, before_record.cert_pem);
    assert_eq!(renewed.key_pem, before_record.key_pem);
    assert_eq!(after.serial_hex(), before.serial_hex());
    assert_eq!(after.subject(), before.subject());
    assert_eq!(after.public_key(), before.public_key());
    assert_eq!(after.is_ca(), before.is_ca());
    assert!(after.not_before() > before.not_before());
    assert_eq!(after.valid_days(), 30);
    assert!(renewed.updated_at >= before_record.updated_at);

    // Children signed before the renewal still verify against the renewed
    // certificate, so the key pair is unchanged.
    let child_id = if renew_root { chain.a } else { chain.b };
    let child = Certificate::from_pem(&h.store.get_certificate(child_id).unwrap().cert_pem).unwrap();
    verify_issued_by(&child, &after).unwrap();
}

#[test]
fn test_renewal_of_leaf_is_signed_by_issuer() {
    let h = memory();
    let chain = Chain::build(&h);

    let renewed = h.certificates.renew(&h.ctx, chain.c, 7).unwrap();
    let leaf = Certificate::from_pem(&renewed.cert_pem).unwrap();
    let issuer = Certificate::from_pem(&h.store.get_certificate(chain.b).unwrap().cert_pem).unwrap();
    verify_issued_by(&leaf, &issuer).unwrap();
    assert_eq!(leaf.dns_names(), ["c.acme.test"]);
}

#[test_case(0 ; "zero")]
#[test_case(-1 ; "negative")]
fn test_renewal_rejects_non_positive_days(days: i64) {
    let h = memory();
    let chain = Chain::build(&h);
    let before = h.store.get_certificate(chain.c).unwrap();

    let err = h.certificates.renew(&h.ctx, chain.c, days).unwrap_err();
    assert!(matches!(err, Error::InvalidRequest(_)));
    assert_eq!(h.store.get_certificate(chain.c).unwrap(), before);
}

// ============================================================================
// Export
// ============================================================================

fn read_entries(archive: &[u8]) -> Vec<(String, u32, String)> {
    let mut archive = tar::Archive::new(archive);
    archive
        .entries()
        .unwrap()
        .map(|entry| {
            let mut entry = entry.unwrap();
            let name = entry.path().unwrap().to_string_lossy().into_owned();
            let mode = entry.header().mode().unwrap();
            let mut body = String::new();
            entry.read_to_string(&mut body).unwrap();
            (name, mode, body)
        })
        .collect()
}

fn split_pem_blocks(text: &str) -> Vec<String> {
    text.split_inclusive("-----END CERTIFICATE-----")
        .map(str::trim)
        .filter(|block| !block.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn export_ordering<S: RecordStore>(h: &Harness<S>) {
    let chain = Chain::build(h);

    let archive = h.certificates.export(&h.ctx, chain.b).unwrap();
    let entries = read_entries(&archive);
    assert_eq!(entries.len(), 2);

    let (cert_name, cert_mode, cert_body) = &entries[0];
    let (key_name, key_mode, key_body) = &entries[1];
    assert_eq!(cert_name, "certificate.pem");
    assert_eq!(*cert_mode, 0o644);
    assert_eq!(key_name, "key.pem");
    assert_eq!(*key_mode, 0o600);

    let expected: Vec<String> = [chain.b, chain.a, chain.root]
        .into_iter()
        .map(|id| h.store.get_certificate(id).unwrap().cert_pem.trim().to_string())
        .collect();
    assert_eq!(split_pem_blocks(cert_body), expected);

    let b_key = h.store.get_certificate(chain.b).unwrap().key_pem;
    assert_eq!(key_body.trim(), b_key.trim());

    let decoded: Vec<Certificate> = expected
        .iter()
        .map(|pem| Certificate::from_pem(pem).unwrap())
        .collect();
    validate_chain(&decoded).unwrap();
}

#[test]
fn test_export_ordering_memory() {
    export_ordering(&memory());
}

#[test]
fn test_export_ordering_sqlite() {
    let (h, _dir) = sqlite();
    export_ordering(&h);
}

#[test]
fn test_export_of_root_is_single_certificate() {
    let h = memory();
    let chain = Chain::build(&h);
    let bundle = h.certificates.export_bundle(&h.ctx, chain.root).unwrap();
    assert_eq!(split_pem_blocks(&bundle.certificate_pem).len(), 1);
}

#[test]
fn test_export_missing_is_not_found() {
    let h = memory();
    let err = h
        .certificates
        .export(&h.ctx, CertificateId::new(3))
        .unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
}
