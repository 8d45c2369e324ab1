//! Namespace management.

use std::sync::Arc;

use certmgr_store::{NamespaceFields, NamespaceId, NamespaceOps, RecordStore};
use tracing::{info, info_span};

use crate::context::RequestContext;
use crate::error::{Error, Result};
use crate::views::{NamespaceRequest, NamespaceView};

/// Maximum namespace name length in characters.
pub const MAX_NAME_LEN: usize = 255;

/// Create, read, update and delete for namespaces.
pub struct NamespaceService<S> {
    store: Arc<S>,
}

impl<S> Clone for NamespaceService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: RecordStore> NamespaceService<S> {
    /// Creates a service over `store`.
    #[must_use]
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Creates a namespace.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidRequest`] for an empty or overlong name,
    /// [`Error::Conflict`] if the name is taken.
    pub fn create(&self, ctx: &RequestContext, req: NamespaceRequest) -> Result<NamespaceView> {
        let span = info_span!(parent: ctx.span(), "create_namespace");
        let _enter = span.enter();

        let fields = validate(req)?;
        ctx.ensure_active("create_namespace")?;
        let namespace = self
            .store
            .create_namespace(fields)
            .map_err(|e| Error::store("create_namespace", None, e))?;
        info!(namespace_id = %namespace.id, name = %namespace.name, "created namespace");
        Ok(NamespaceView::new(namespace, 0))
    }

    /// Fetches one namespace with its certificate count.
    pub fn get(&self, ctx: &RequestContext, id: NamespaceId) -> Result<NamespaceView> {
        let span = info_span!(parent: ctx.span(), "get_namespace", namespace_id = %id);
        let _enter = span.enter();

        ctx.ensure_active("get_namespace")?;
        self.store.transaction(|tx| {
            let namespace = tx
                .get_namespace(id)
                .map_err(|e| Error::store("get_namespace", Some(id.get()), e))?;
            let count = tx
                .count_certificates(id)
                .map_err(|e| Error::store("count_certificates", Some(id.get()), e))?;
            Ok::<_, Error>(NamespaceView::new(namespace, count))
        })
    }

    /// Every namespace with its certificate count, read in one transaction.
    pub fn list(&self, ctx: &RequestContext) -> Result<Vec<NamespaceView>> {
        let span = info_span!(parent: ctx.span(), "list_namespaces");
        let _enter = span.enter();

        ctx.ensure_active("list_namespaces")?;
        self.store.transaction(|tx| {
            let namespaces = tx
                .list_namespaces()
                .map_err(|e| Error::store("list_namespaces", None, e))?;
            namespaces
                .into_iter()
                .map(|namespace| {
                    let count = tx.count_certificates(namespace.id).map_err(|e| {
                        Error::store("count_certificates", Some(namespace.id.get()), e)
                    })?;
                    Ok(NamespaceView::new(namespace, count))
                })
                .collect::<Result<Vec<_>>>()
        })
    }

    /// Renames or re-describes a namespace.
    pub fn update(
        &self,
        ctx: &RequestContext,
        id: NamespaceId,
        req: NamespaceRequest,
    ) -> Result<NamespaceView> {
        let span = info_span!(parent: ctx.span(), "update_namespace", namespace_id = %id);
        let _enter = span.enter();

        let fields = validate(req)?;
        ctx.ensure_active("update_namespace")?;
        let view = self.store.transaction(|tx| {
            let namespace = tx
                .update_namespace(id, fields)
                .map_err(|e| Error::store("update_namespace", Some(id.get()), e))?;
            let count = tx
                .count_certificates(id)
                .map_err(|e| Error::store("count_certificates", Some(id.get()), e))?;
            Ok::<_, Error>(NamespaceView::new(namespace, count))
        })?;
        info!(name = %view.name, "updated namespace");
        Ok(view)
    }

    /// Deletes an empty namespace.
    ///
    /// # Errors
    ///
    /// [`Error::Conflict`] while the namespace still owns certificates.
    pub fn delete(&self, ctx: &RequestContext, id: NamespaceId) -> Result<()> {
        let span = info_span!(parent: ctx.span(), "delete_namespace", namespace_id = %id);
        let _enter = span.enter();

        ctx.ensure_active("delete_namespace")?;
        self.store.transaction(|tx| {
            tx.get_namespace(id)
                .map_err(|e| Error::store("get_namespace", Some(id.get()), e))?;
            let count = tx
                .count_certificates(id)
                .map_err(|e| Error::store("count_certificates", Some(id.get()), e))?;
            if count > 0 {
                return Err(Error::Conflict(format!(
                    "namespace {id} still owns {count} certificates"
                )));
            }
            tx.delete_namespace(id)
                .map_err(|e| Error::store("delete_namespace", Some(id.get()), e))
        })?;
        info!("deleted namespace");
        Ok(())
    }
}

fn validate(req: NamespaceRequest) -> Result<NamespaceFields> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(Error::InvalidRequest("namespace name cannot be empty".into()));
    }
    let len = name.chars().count();
    if len > MAX_NAME_LEN {
        return Err(Error::InvalidRequest(format!(
            "namespace name is {len} characters, limit is {MAX_NAME_LEN}"
        )));
    }
    Ok(NamespaceFields {
        name: name.to_string(),
        desc: req.desc,
    })
}
