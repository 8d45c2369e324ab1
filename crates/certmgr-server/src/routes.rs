//! Route configuration for the certmgr API.

use std::sync::Arc;

use axum::routing::{Router, get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::handlers::{
    create_certificate, create_namespace, delete_certificate, delete_namespace,
    export_certificate, get_certificate, get_namespace, get_status, list_certificates,
    list_namespaces, renew_certificate, update_namespace,
};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = build_cors_layer(state.config());

    let api_routes = Router::new()
        // Namespaces
        .route("/namespaces", get(list_namespaces).post(create_namespace))
        .route(
            "/namespaces/{id}",
            get(get_namespace)
                .put(update_namespace)
                .delete(delete_namespace),
        )
        // Certificates
        .route(
            "/certificates",
            get(list_certificates).post(create_certificate),
        )
        .route(
            "/certificates/{id}",
            get(get_certificate).delete(delete_certificate),
        )
        .route("/certificates/{id}/renew", post(renew_certificate))
        .route("/certificates/{id}/export", post(export_certificate));

    Router::new()
        .route("/status", get(get_status))
        .nest("/api/v1", api_routes)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    if config.cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use axum::body::{Body, Bytes};
    use axum::http::{HeaderMap, Request, StatusCode, header};
    use certmgr_store::SqliteStore;
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::config::Storage;

    fn make_test_router() -> Router {
        let config = ServerConfig::default().with_storage(Storage::InMemory);
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        create_router(Arc::new(AppState::new(config, store)))
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, headers, body)
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let (status, _, body) = send(app, request).await;
        let value = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, value)
    }

    async fn create_namespace(app: &Router, name: &str) -> i64 {
        let (status, body) = send_json(
            app,
            json_request("POST", "/api/v1/namespaces", &json!({"name": name, "desc": ""})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_i64().unwrap()
    }

    fn root_body(namespace_id: i64) -> Value {
        json!({
            "namespaceId": namespace_id,
            "keyType": "ECDSA",
            "eccCurve": "P256",
            "validDays": 3650,
            "subject": {"commonName": "Acme Root", "country": "US"},
            "usage": "CA"
        })
    }

    #[tokio::test]
    async fn test_status() {
        let app = make_test_router();
        let (status, body) = send_json(&app, get_request("/status")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_namespace_crud() {
        let app = make_test_router();
        let id = create_namespace(&app, "acme").await;

        let (status, body) = send_json(&app, get_request("/api/v1/namespaces")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["name"], "acme");
        assert_eq!(body[0]["certCount"], 0);

        let (status, body) = send_json(
            &app,
            json_request(
                "PUT",
                &format!("/api/v1/namespaces/{id}"),
                &json!({"name": "acme-prod", "desc": "production"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "acme-prod");

        let (status, _, _) = send(
            &app,
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/v1/namespaces/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) =
            send_json(&app, get_request(&format!("/api/v1/namespaces/{id}"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }

    #[tokio::test]
    async fn test_duplicate_namespace_conflicts() {
        let app = make_test_router();
        create_namespace(&app, "acme").await;
        let (status, body) = send_json(
            &app,
            json_request("POST", "/api/v1/namespaces", &json!({"name": "acme"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "conflict");
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let app = make_test_router();
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/namespaces")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send_json(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");
    }

    #[tokio::test]
    async fn test_list_requires_namespace_query() {
        let app = make_test_router();
        let (status, body) = send_json(&app, get_request("/api/v1/certificates")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");
    }

    #[tokio::test]
    async fn test_non_numeric_id_is_bad_request() {
        let app = make_test_router();
        let (status, body) = send_json(&app, get_request("/api/v1/certificates/abc")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");
    }

    #[tokio::test]
    async fn test_certificate_lifecycle() {
        let app = make_test_router();
        let ns = create_namespace(&app, "acme").await;

        let (status, root) = send_json(
            &app,
            json_request("POST", "/api/v1/certificates", &root_body(ns)),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(root["isCA"], true);
        assert_eq!(root["issuerId"], 0);
        assert_eq!(root["subject"], "C=US, CN=Acme Root");
        let root_id = root["id"].as_i64().unwrap();

        let (status, body) = send_json(
            &app,
            json_request("POST", "/api/v1/certificates", &root_body(ns)),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "duplicate_root");

        let (status, leaf) = send_json(
            &app,
            json_request(
                "POST",
                "/api/v1/certificates",
                &json!({
                    "namespaceId": ns,
                    "issuerId": root_id,
                    "keyType": "RSA",
                    "keyLen": 2048,
                    "validDays": 90,
                    "subject": {"commonName": "www.acme.test"},
                    "usage": "server",
                    "dnsNames": ["www.acme.test"],
                    "ipAddresses": ["10.0.0.1"]
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(leaf["issuerId"], root_id);
        let leaf_id = leaf["id"].as_i64().unwrap();

        let (status, list) =
            send_json(&app, get_request(&format!("/api/v1/certificates?namespaceId={ns}"))).await;
        assert_eq!(status, StatusCode::OK);
        let ids: Vec<i64> = list
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![root_id, leaf_id]);

        let (status, detail) =
            send_json(&app, get_request(&format!("/api/v1/certificates/{leaf_id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(detail["keyType"], "RSA");
        assert_eq!(detail["keyLen"], 2048);
        assert_eq!(detail["issuerSubject"], "C=US, CN=Acme Root");
        assert_eq!(detail["dnsNames"], json!(["www.acme.test"]));
        assert_eq!(detail["ipAddresses"], json!(["10.0.0.1"]));

        let (status, renewed) = send_json(
            &app,
            json_request(
                "POST",
                &format!("/api/v1/certificates/{leaf_id}/renew"),
                &json!({"validDays": 30}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(renewed["keyPem"], leaf["keyPem"]);
        assert_ne!(renewed["certPem"], leaf["certPem"]);

        let (status, _, _) = send(
            &app,
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/v1/certificates/{root_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) =
            send_json(&app, get_request(&format!("/api/v1/certificates/{leaf_id}"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_export_returns_tar() {
        let app = make_test_router();
        let ns = create_namespace(&app, "acme").await;
        let (_, root) = send_json(
            &app,
            json_request("POST", "/api/v1/certificates", &root_body(ns)),
        )
        .await;
        let root_id = root["id"].as_i64().unwrap();

        let request = Request::builder()
            .method("POST")
            .uri(format!("/api/v1/certificates/{root_id}/export"))
            .body(Body::empty())
            .unwrap();
        let (status, headers, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "application/x-tar");
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            format!("attachment; filename=certificate-{root_id}.tar").as_str()
        );

        let mut archive = tar::Archive::new(body.as_ref());
        let mut names = Vec::new();
        for entry in archive.entries().unwrap() {
            let mut entry = entry.unwrap();
            names.push(entry.path().unwrap().to_string_lossy().into_owned());
            let mut text = String::new();
            entry.read_to_string(&mut text).unwrap();
            assert!(text.starts_with("-----BEGIN"));
        }
        assert_eq!(names, vec!["certificate.pem", "key.pem"]);
    }

    #[tokio::test]
    async fn test_invalid_valid_days() {
        let app = make_test_router();
        let ns = create_namespace(&app, "acme").await;
        let mut body = root_body(ns);
        body["validDays"] = json!(0);
        let (status, body) =
            send_json(&app, json_request("POST", "/api/v1/certificates", &body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_request");
    }

    #[tokio::test]
    async fn test_cors_restricted_origin() {
        let config = ServerConfig::default()
            .with_storage(Storage::InMemory)
            .with_cors_origin("https://console.acme.test");
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let app = create_router(Arc::new(AppState::new(config, store)));

        let request = Request::builder()
            .uri("/status")
            .header(header::ORIGIN, "https://console.acme.test")
            .body(Body::empty())
            .unwrap();
        let (status, headers, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://console.acme.test"
        );
    }
}
