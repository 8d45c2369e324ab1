//! End-to-end integration tests for certmgr.
//!
//! These tests exercise the full stack:
//! - Issuance against both record store backends
//! - Root uniqueness and issuer checks
//! - Chain traversal, cascading delete and its rollback
//! - Renewal and chain export
//! - The HTTP API over an on-disk database

#![cfg(test)]
