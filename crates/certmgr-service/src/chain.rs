//! Issuer graph traversal.
//!
//! The graph lives in the store as `issuer_id` references. Walks query it
//! one level at a time and never build an in-memory tree, so the result
//! reflects whatever the store returns at each step.

use std::collections::HashSet;

use certmgr_store::{CertificateId, CertificateOps, CertificateRecord, StoreError};
use tracing::{debug, warn};

use crate::context::RequestContext;
use crate::error::{Error, Result};

/// Default bound on issuer chain length.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Default bound on the number of certificates a single walk may return.
pub const DEFAULT_MAX_NODES: usize = 100_000;

/// Walks issuer references with depth, size and cycle guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainWalker {
    max_depth: usize,
    max_nodes: usize,
}

impl Default for ChainWalker {
    fn default() -> Self {
        Self::new()
    }
}

impl ChainWalker {
    /// Creates a walker with the default limits.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_nodes: DEFAULT_MAX_NODES,
        }
    }

    /// Sets the maximum chain length.
    #[must_use]
    pub const fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Sets the maximum number of certificates one walk may visit.
    #[must_use]
    pub const fn with_max_nodes(mut self, max_nodes: usize) -> Self {
        self.max_nodes = max_nodes;
        self
    }

    /// Maximum chain length.
    #[must_use]
    pub const fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Every certificate below `id`, depth-first pre-order.
    ///
    /// Each child is emitted before its own subtree, and siblings follow the
    /// store's id order. `id` itself is not included.
    ///
    /// # Errors
    ///
    /// [`Error::CycleDetected`] if a certificate is reached twice,
    /// [`Error::ChainTooDeep`] if a limit is exceeded, [`Error::Canceled`]
    /// if `ctx` is canceled, or a store error.
    pub fn descendants_of<S>(
        &self,
        store: &S,
        ctx: &RequestContext,
        id: CertificateId,
    ) -> Result<Vec<CertificateRecord>>
    where
        S: CertificateOps + ?Sized,
    {
        let mut visited = HashSet::from([id]);
        let mut result = Vec::new();
        let mut stack: Vec<(CertificateRecord, usize)> = Vec::new();
        self.push_children(store, ctx, id, 1, &mut stack)?;

        while let Some((record, depth)) = stack.pop() {
            if !visited.insert(record.id) {
                warn!(cert_id = %record.id, root = %id, "issuer cycle while walking descendants");
                return Err(Error::CycleDetected { id: record.id });
            }
            if result.len() >= self.max_nodes {
                return Err(Error::ChainTooDeep {
                    id,
                    limit: self.max_nodes,
                });
            }
            let child_id = record.id;
            result.push(record);
            self.push_children(store, ctx, child_id, depth + 1, &mut stack)?;
        }

        debug!(cert_id = %id, count = result.len(), "collected descendants");
        Ok(result)
    }

    fn push_children<S>(
        &self,
        store: &S,
        ctx: &RequestContext,
        parent: CertificateId,
        depth: usize,
        stack: &mut Vec<(CertificateRecord, usize)>,
    ) -> Result<()>
    where
        S: CertificateOps + ?Sized,
    {
        ctx.ensure_active("list_certificates_by_issuer")?;
        let children = store
            .list_certificates_by_issuer(parent)
            .map_err(|e| Error::store("list_certificates_by_issuer", Some(parent.get()), e))?;
        if children.is_empty() {
            return Ok(());
        }
        if depth > self.max_depth {
            return Err(Error::ChainTooDeep {
                id: parent,
                limit: self.max_depth,
            });
        }
        // Reversed so the lowest id is popped first.
        stack.extend(children.into_iter().rev().map(|child| (child, depth)));
        Ok(())
    }

    /// `id` followed by its issuer, its issuer's issuer and so on, ending
    /// with the self-signed root.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if `id` does not exist, [`Error::IssuerNotFound`]
    /// if a link in the chain is dangling, [`Error::CycleDetected`] or
    /// [`Error::ChainTooDeep`] on malformed chains, [`Error::Canceled`] if
    /// `ctx` is canceled, or a store error.
    pub fn ancestors_of<S>(
        &self,
        store: &S,
        ctx: &RequestContext,
        id: CertificateId,
    ) -> Result<Vec<CertificateRecord>>
    where
        S: CertificateOps + ?Sized,
    {
        ctx.ensure_active("get_certificate")?;
        let leaf = store
            .get_certificate(id)
            .map_err(|e| Error::store("get_certificate", Some(id.get()), e))?;

        let mut visited = HashSet::from([id]);
        let mut next = leaf.issuer_id;
        let mut chain = vec![leaf];

        while let Some(issuer_id) = next {
            if !visited.insert(issuer_id) {
                warn!(cert_id = %id, issuer = %issuer_id, "issuer cycle while walking ancestors");
                return Err(Error::CycleDetected { id: issuer_id });
            }
            if chain.len() >= self.max_depth {
                return Err(Error::ChainTooDeep {
                    id,
                    limit: self.max_depth,
                });
            }
            ctx.ensure_active("get_certificate")?;
            let issuer = match store.get_certificate(issuer_id) {
                Ok(issuer) => issuer,
                Err(StoreError::NotFound { .. }) => return Err(Error::IssuerNotFound(issuer_id)),
                Err(e) => return Err(Error::store("get_certificate", Some(issuer_id.get()), e)),
            };
            next = issuer.issuer_id;
            chain.push(issuer);
        }

        debug!(cert_id = %id, length = chain.len(), "resolved issuer chain");
        Ok(chain)
    }
}
