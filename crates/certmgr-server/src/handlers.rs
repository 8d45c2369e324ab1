//! HTTP request handlers for the certmgr API.
//!
//! Every lifecycle call runs on the blocking pool. The handler holds a drop
//! guard on the call's cancellation token, so a client that disconnects
//! cancels the operation at its next checkpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use certmgr_service::{
    CertificateDetail, CertificateSummary, CertificateView, CreateCertificateRequest,
    NamespaceRequest, NamespaceView, RequestContext,
};
use certmgr_store::{CertificateId, NamespaceId};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{Span, info};

use crate::error::{ServerError, ServerResult};
use crate::state::AppState;

/// Runs a lifecycle call on the blocking pool under a request context.
async fn run_blocking<T, F>(op: &'static str, f: F) -> ServerResult<T>
where
    T: Send + 'static,
    F: FnOnce(&RequestContext) -> certmgr_service::Result<T> + Send + 'static,
{
    let token = CancellationToken::new();
    let guard = token.clone().drop_guard();
    let ctx = RequestContext::new(Span::current()).with_token(token);

    let result = tokio::task::spawn_blocking(move || f(&ctx))
        .await
        .map_err(|e| ServerError::Internal(format!("{op} task failed: {e}")))?;
    guard.disarm();
    Ok(result?)
}

/// Liveness response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Always `"ok"`.
    pub status: String,
    /// Server version.
    pub version: String,
}

/// Liveness check.
pub async fn get_status() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// --- Namespaces ---

/// List all namespaces with their certificate counts.
pub async fn list_namespaces(
    State(state): State<Arc<AppState>>,
) -> ServerResult<Json<Vec<NamespaceView>>> {
    let svc = state.namespaces().clone();
    run_blocking("list_namespaces", move |ctx| svc.list(ctx))
        .await
        .map(Json)
}

/// Create a namespace.
pub async fn create_namespace(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NamespaceRequest>, JsonRejection>,
) -> ServerResult<(StatusCode, Json<NamespaceView>)> {
    let Json(req) = payload?;
    let svc = state.namespaces().clone();
    let view = run_blocking("create_namespace", move |ctx| svc.create(ctx, req)).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// Get one namespace.
pub async fn get_namespace(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
) -> ServerResult<Json<NamespaceView>> {
    let Path(id) = id?;
    let svc = state.namespaces().clone();
    run_blocking("get_namespace", move |ctx| svc.get(ctx, NamespaceId::new(id)))
        .await
        .map(Json)
}

/// Rename or re-describe a namespace.
pub async fn update_namespace(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<NamespaceRequest>, JsonRejection>,
) -> ServerResult<Json<NamespaceView>> {
    let Path(id) = id?;
    let Json(req) = payload?;
    let svc = state.namespaces().clone();
    run_blocking("update_namespace", move |ctx| {
        svc.update(ctx, NamespaceId::new(id), req)
    })
    .await
    .map(Json)
}

/// Delete an empty namespace.
pub async fn delete_namespace(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
) -> ServerResult<StatusCode> {
    let Path(id) = id?;
    let svc = state.namespaces().clone();
    run_blocking("delete_namespace", move |ctx| {
        svc.delete(ctx, NamespaceId::new(id))
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Certificates ---

/// Query parameters for listing certificates.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListCertificatesQuery {
    /// Namespace to list.
    pub namespace_id: i64,
}

/// List the certificates of a namespace.
pub async fn list_certificates(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ListCertificatesQuery>, QueryRejection>,
) -> ServerResult<Json<Vec<CertificateSummary>>> {
    let Query(query) = query?;
    let svc = state.certificates().clone();
    run_blocking("list_certificates", move |ctx| {
        svc.list(ctx, NamespaceId::new(query.namespace_id))
    })
    .await
    .map(Json)
}

/// Issue a certificate.
pub async fn create_certificate(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateCertificateRequest>, JsonRejection>,
) -> ServerResult<(StatusCode, Json<CertificateView>)> {
    let Json(req) = payload?;
    let svc = state.certificates().clone();
    let view = run_blocking("create_certificate", move |ctx| svc.create(ctx, req)).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// Get full detail of a certificate.
pub async fn get_certificate(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
) -> ServerResult<Json<CertificateDetail>> {
    let Path(id) = id?;
    let svc = state.certificates().clone();
    run_blocking("get_certificate", move |ctx| {
        svc.get(ctx, CertificateId::new(id))
    })
    .await
    .map(Json)
}

/// Delete a certificate and everything it issued.
pub async fn delete_certificate(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
) -> ServerResult<StatusCode> {
    let Path(id) = id?;
    let svc = state.certificates().clone();
    let deleted = run_blocking("delete_certificate", move |ctx| {
        svc.delete(ctx, CertificateId::new(id))
    })
    .await?;
    info!(cert_id = id, count = deleted.len(), "deleted certificate subtree");
    Ok(StatusCode::NO_CONTENT)
}

/// Body of a renew request.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenewRequest {
    /// New validity window in days, starting now.
    pub valid_days: i64,
}

/// Re-sign a certificate with a fresh validity window.
pub async fn renew_certificate(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<RenewRequest>, JsonRejection>,
) -> ServerResult<Json<CertificateView>> {
    let Path(id) = id?;
    let Json(req) = payload?;
    let svc = state.certificates().clone();
    run_blocking("renew_certificate", move |ctx| {
        svc.renew(ctx, CertificateId::new(id), req.valid_days)
    })
    .await
    .map(Json)
}

/// Download the certificate chain and key as a tar archive.
pub async fn export_certificate(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
) -> ServerResult<impl IntoResponse> {
    let Path(id) = id?;
    let svc = state.certificates().clone();
    let archive = run_blocking("export_certificate", move |ctx| {
        svc.export(ctx, CertificateId::new(id))
    })
    .await?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/x-tar".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=certificate-{id}.tar"),
            ),
        ],
        archive,
    ))
}
