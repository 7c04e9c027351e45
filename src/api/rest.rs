//! REST API Handlers
//!
//! Every request under the REST base goes through one dispatcher: the path
//! is matched against the registered resource types and handed to that
//! type's lifecycle engine. Paths no type claims fall back to a read-only
//! view of the resource tree (service root, mockup documents).

use crate::api::auth::{AllowAll, Authenticator};
use crate::api::metrics::{ApiMetrics, UNMATCHED_RESOURCE};
use crate::engine::{EngineContext, LifecycleEngine};
use crate::error::{Error, Result};
use crate::registry::{match_target, ResourceTypeRegistry, Target};
use crate::resource::ResourcePath;
use crate::store::ResourceStore;
use axum::{
    extract::{DefaultBodyLimit, Json, State},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{any, get},
    Router,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::error::Error as _;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};

/// Default request body limit
pub const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024; // 10MB

// =============================================================================
// Response Types
// =============================================================================

/// API error response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiErrorResponse {
    /// Error body for `err`; internal failures carry no detail
    pub fn from_error(err: &Error) -> Self {
        if err.is_internal() {
            return Self {
                error: err.kind().into(),
                message: "internal server error".into(),
                details: None,
            };
        }
        Self {
            error: err.kind().into(),
            message: err.to_string(),
            details: err.source().map(|source| source.to_string()),
        }
    }
}

fn error_response(err: &Error) -> Response {
    if err.is_internal() {
        error!(error = %err, "request failed");
    } else {
        debug!(error = %err, "request rejected");
    }
    (err.status_code(), Json(ApiErrorResponse::from_error(err))).into_response()
}

// =============================================================================
// REST Router
// =============================================================================

/// REST API router builder
pub struct RestRouter<S> {
    engines: Vec<Arc<LifecycleEngine<S>>>,
    store: Arc<S>,
    rest_base: String,
    authenticator: Arc<dyn Authenticator>,
    metrics: Option<ApiMetrics>,
    max_body_size: usize,
}

impl<S: ResourceStore> RestRouter<S> {
    /// One engine per type in `registry`, all sharing `ctx`
    pub fn new(ctx: &EngineContext<S>, registry: &ResourceTypeRegistry) -> Self {
        Self {
            engines: registry.engines(ctx),
            store: ctx.store.clone(),
            rest_base: ctx.rest_base.clone(),
            authenticator: Arc::new(AllowAll),
            metrics: None,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }

    pub fn with_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = authenticator;
        self
    }

    pub fn with_metrics(mut self, metrics: ApiMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_max_body_size(mut self, max_body_size: usize) -> Self {
        self.max_body_size = max_body_size;
        self
    }

    /// Build the Axum router
    pub fn build(self) -> Result<Router> {
        let metrics = match self.metrics {
            Some(metrics) => metrics,
            None => ApiMetrics::new()?,
        };
        let base = self.rest_base.trim_end_matches('/').to_string();

        let state = AppState {
            engines: Arc::new(self.engines),
            store: self.store,
            rest_base: Arc::from(self.rest_base.as_str()),
            authenticator: self.authenticator,
            metrics,
        };

        let mut router = Router::new()
            .route("/healthz", get(health_check))
            .route("/metrics", get(render_metrics::<S>))
            .route(&format!("{base}/"), any(dispatch::<S>))
            .route(&format!("{base}/*path"), any(dispatch::<S>));
        if !base.is_empty() {
            router = router.route(&base, any(dispatch::<S>));
        }

        Ok(router
            .with_state(state)
            .layer(DefaultBodyLimit::max(self.max_body_size))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()))
    }
}

/// Shared application state
struct AppState<S> {
    engines: Arc<Vec<Arc<LifecycleEngine<S>>>>,
    store: Arc<S>,
    rest_base: Arc<str>,
    authenticator: Arc<dyn Authenticator>,
    metrics: ApiMetrics,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            engines: self.engines.clone(),
            store: self.store.clone(),
            rest_base: self.rest_base.clone(),
            authenticator: self.authenticator.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Route one resource request to the engine owning its path
async fn dispatch<S: ResourceStore>(
    State(state): State<AppState<S>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let (resource, result) = match route_request(&state, &method, &uri, &headers) {
        Ok(Routed::Engine(engine, target)) => {
            let resource = engine.kind().name().to_string();
            (resource, handle(&engine, target, &method, &body).await)
        }
        Ok(Routed::Static(path)) => {
            (UNMATCHED_RESOURCE.to_string(), read_static(&state, &method, &path).await)
        }
        Err(e) => (UNMATCHED_RESOURCE.to_string(), Err(e)),
    };

    let response = result.unwrap_or_else(|e| error_response(&e));
    state
        .metrics
        .record(&resource, method.as_str(), response.status().as_u16());
    response
}

enum Routed<S> {
    Engine(Arc<LifecycleEngine<S>>, Target),
    Static(ResourcePath),
}

fn route_request<S: ResourceStore>(
    state: &AppState<S>,
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
) -> Result<Routed<S>> {
    if let Err(e) = state.authenticator.check(headers) {
        warn!(method = %method, path = %uri.path(), "authentication failed");
        return Err(e);
    }

    let relative = relative_path(&state.rest_base, uri.path())
        .ok_or_else(|| Error::not_found(uri.path()))?;
    let path = decode_path(relative)?;

    let matched = state.engines.iter().find_map(|engine| {
        match_target(engine.kind(), &path).map(|target| (engine.clone(), target))
    });

    Ok(match matched {
        Some((engine, target)) => Routed::Engine(engine, target),
        None => Routed::Static(path),
    })
}

/// Percent-decode every segment, then validate it as an identifier
fn decode_path(relative: &str) -> Result<ResourcePath> {
    let segments = relative
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|segment| {
            urlencoding::decode(segment)
                .map(|decoded| decoded.into_owned())
                .map_err(|e| Error::InvalidInput(format!("invalid path segment {segment:?}: {e}")))
        })
        .collect::<Result<Vec<_>>>()?;
    ResourcePath::from_segments(segments)
}

/// Part of `uri_path` below the REST base, without surrounding slashes
fn relative_path<'a>(rest_base: &str, uri_path: &'a str) -> Option<&'a str> {
    let base = rest_base.trim_end_matches('/');
    let rest = uri_path.strip_prefix(base)?;
    if rest.is_empty() || rest.starts_with('/') {
        Some(rest.trim_matches('/'))
    } else {
        None
    }
}

/// Run one lifecycle operation
async fn handle<S: ResourceStore>(
    engine: &LifecycleEngine<S>,
    target: Target,
    method: &Method,
    body: &Bytes,
) -> Result<Response> {
    let body = parse_body(body)?;

    let document = match (target, method.clone()) {
        (Target::Collection { parent_ids }, Method::GET) => {
            engine.read_collection(&parent_ids).await?
        }
        (Target::Collection { parent_ids }, Method::POST) => {
            engine.create_in_collection(&parent_ids, body.as_ref()).await?
        }
        (Target::Instance { parent_ids, id }, Method::GET) => engine.read(&parent_ids, &id).await?,
        (Target::Instance { parent_ids, id }, Method::POST) => {
            engine.create(&parent_ids, &id, body.as_ref()).await?
        }
        (Target::Instance { parent_ids, id }, Method::PUT) => {
            engine.replace(&parent_ids, &id, &require_body(body)?).await?
        }
        (Target::Instance { parent_ids, id }, Method::PATCH) => {
            engine.patch(&parent_ids, &id, &require_body(body)?).await?
        }
        (Target::Instance { parent_ids, id }, Method::DELETE) => {
            engine.delete(&parent_ids, &id).await?;
            return Ok(StatusCode::OK.into_response());
        }
        _ => return Ok(method_not_allowed()),
    };

    Ok((StatusCode::OK, Json(document)).into_response())
}

/// GET on a path no resource type claims: serve the stored document as is
async fn read_static<S: ResourceStore>(
    state: &AppState<S>,
    method: &Method,
    path: &ResourcePath,
) -> Result<Response> {
    if *method != Method::GET {
        return Err(Error::not_found(path.to_string()));
    }
    let document = state.store.read(path).await?;
    Ok((StatusCode::OK, Json(document)).into_response())
}

fn parse_body(body: &Bytes) -> Result<Option<Value>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    Ok(Some(serde_json::from_slice(body)?))
}

fn require_body(body: Option<Value>) -> Result<Value> {
    body.ok_or_else(|| Error::InvalidInput("request body is required".into()))
}

fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(ApiErrorResponse {
            error: "method_not_allowed".into(),
            message: "Method not allowed on this resource".into(),
            details: None,
        }),
    )
        .into_response()
}

/// Prometheus metrics
async fn render_metrics<S: ResourceStore>(State(state): State<AppState<S>>) -> Response {
    match state.metrics.render() {
        Ok((content_type, buffer)) => {
            (StatusCode::OK, [(header::CONTENT_TYPE, content_type)], buffer).into_response()
        }
        Err(e) => error_response(&e),
    }
}

/// Health check
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::auth::{TokenAuthenticator, AUTH_TOKEN_HEADER};
    use crate::store::{FileStore, MemoryStore};
    use assert_matches::assert_matches;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::json;
    use tower::ServiceExt;

    fn router_with(store: Arc<MemoryStore>, authenticator: Arc<dyn Authenticator>) -> Router {
        let ctx = EngineContext::new(store, "/redfish/v1/");
        let registry = ResourceTypeRegistry::with_builtin().unwrap();
        RestRouter::new(&ctx, &registry)
            .with_authenticator(authenticator)
            .build()
            .unwrap()
    }

    fn router() -> (Router, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (router_with(store.clone(), Arc::new(AllowAll)), store)
    }

    async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let body = match body {
            Some(value) => Body::from(serde_json::to_vec(&value).unwrap()),
            None => Body::empty(),
        };
        let request = Request::builder().method(method).uri(uri).body(body).unwrap();
        let response = router.clone().oneshot(request).await.unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    #[test]
    fn test_relative_path() {
        assert_eq!(relative_path("/redfish/v1/", "/redfish/v1"), Some(""));
        assert_eq!(relative_path("/redfish/v1/", "/redfish/v1/"), Some(""));
        assert_eq!(
            relative_path("/redfish/v1/", "/redfish/v1/Storage/S1/"),
            Some("Storage/S1")
        );
        assert_eq!(relative_path("/redfish/v1/", "/redfish/v10/Storage"), None);
    }

    #[test]
    fn test_decode_path() {
        let path = decode_path("Storage/S1/Volumes/Vol%20A").unwrap();
        assert_eq!(path.name(), Some("Vol A"));

        assert_matches!(
            decode_path("Storage/S1/Volumes/a%2Fb"),
            Err(Error::InvalidIdentifier { .. })
        );
        assert_matches!(
            decode_path("Storage/%2E%2E/Volumes"),
            Err(Error::InvalidIdentifier { .. })
        );
        assert_matches!(
            decode_path("Storage/S1/Volumes/%FF"),
            Err(Error::InvalidInput(_))
        );
    }

    #[tokio::test]
    async fn test_encoded_identifier_in_url() {
        let (router, _store) = router();

        let (status, created) =
            send(&router, "POST", "/redfish/v1/Storage/S1/Volumes/X%20Y", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(created["Id"], "X Y");
        assert_eq!(created["@odata.id"], "/redfish/v1/Storage/S1/Volumes/X Y");

        let (status, read) =
            send(&router, "GET", "/redfish/v1/Storage/S1/Volumes/X%20Y", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(read, created);
    }

    #[tokio::test]
    async fn test_body_identifier_with_space_is_readable() {
        let (router, _store) = router();
        let body = json!({"@odata.id": "/redfish/v1/Storage/S1/Volumes/Vol A"});

        let (status, created) =
            send(&router, "POST", "/redfish/v1/Storage/S1/Volumes", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(created["Id"], "Vol A");

        let (status, read) =
            send(&router, "GET", "/redfish/v1/Storage/S1/Volumes/Vol%20A", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(read["@odata.id"], "/redfish/v1/Storage/S1/Volumes/Vol A");
    }

    #[tokio::test]
    async fn test_index_file_identifier_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileStore::with_path(dir.path()).await.unwrap());
        let ctx = EngineContext::new(store, "/redfish/v1/");
        let registry = ResourceTypeRegistry::with_builtin().unwrap();
        let router = RestRouter::new(&ctx, &registry).build().unwrap();

        for method in ["POST", "GET"] {
            let (status, error) =
                send(&router, method, "/redfish/v1/Storage/S1/Volumes/index.json", None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(error["error"], "invalid_identifier");
        }
    }

    #[tokio::test]
    async fn test_post_to_new_collection() {
        let (router, _store) = router();

        let (status, created) = send(&router, "POST", "/redfish/v1/Storage/S1/Volumes", None).await;
        assert_eq!(status, StatusCode::OK);
        let id = created["Id"].as_str().unwrap();
        assert_eq!(id.len(), 5);

        let (status, collection) = send(&router, "GET", "/redfish/v1/Storage/S1/Volumes", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(collection["Members@odata.count"], 1);
        assert_eq!(collection["Members"][0]["@odata.id"], created["@odata.id"]);
    }

    #[tokio::test]
    async fn test_collection_typed_body_is_bad_request() {
        let (router, _store) = router();
        let body = json!({"@odata.type": "#VolumeCollection.VolumeCollection"});

        let (status, error) =
            send(&router, "POST", "/redfish/v1/Storage/S1/Volumes", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["error"], "invalid_input");
    }

    #[tokio::test]
    async fn test_duplicate_create_keeps_legacy_status() {
        let (router, _store) = router();
        let uri = "/redfish/v1/Storage/S1/Volumes/V1";

        let (status, _) = send(&router, "POST", uri, None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, error) = send(&router, "POST", uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(error["error"], "duplicate_member");
    }

    #[tokio::test]
    async fn test_instance_lifecycle() {
        let (router, _store) = router();
        let uri = "/redfish/v1/ResourceBlocks/RB1/NetworkInterfaces/NI1";

        let (status, created) = send(&router, "POST", uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(created["@odata.id"], uri);

        let (status, patched) =
            send(&router, "PATCH", uri, Some(json!({"Status": {"Health": "Critical"}}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(patched["Status"]["Health"], "Critical");
        assert_eq!(patched["Status"]["State"], "Enabled");

        let replacement = json!({"@odata.id": uri, "Name": "replaced"});
        let (status, replaced) = send(&router, "PUT", uri, Some(replacement.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(replaced, replacement);

        let (status, _) = send(&router, "DELETE", uri, None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, error) = send(&router, "GET", uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(error["error"], "not_found");

        let (_, collection) =
            send(&router, "GET", "/redfish/v1/ResourceBlocks/RB1/NetworkInterfaces", None).await;
        assert_eq!(collection["Members"], json!([]));
    }

    #[tokio::test]
    async fn test_bad_bodies() {
        let (router, _store) = router();
        let uri = "/redfish/v1/Storage/S1/Volumes/V1";
        send(&router, "POST", uri, None).await;

        let request = Request::builder()
            .method("PATCH")
            .uri(uri)
            .body(Body::from("{not json"))
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let (status, _) = send(&router, "PUT", uri, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&router, "PUT", uri, Some(json!([1, 2]))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_method_not_allowed_on_collection() {
        let (router, _store) = router();
        let (status, _) = send(&router, "DELETE", "/redfish/v1/Storage/S1/Volumes", None).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_static_fallback() {
        let (router, store) = router();
        store
            .write(&ResourcePath::root(), &json!({"@odata.id": "/redfish/v1/", "Id": "RootService"}))
            .await
            .unwrap();

        let (status, root) = send(&router, "GET", "/redfish/v1/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(root["Id"], "RootService");

        let (status, _) = send(&router, "GET", "/redfish/v1", None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(&router, "GET", "/redfish/v1/Chassis", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&router, "POST", "/redfish/v1/Chassis", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_traversal_is_rejected() {
        let (router, _store) = router();
        let (status, error) = send(&router, "GET", "/redfish/v1/Storage/../etc", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["error"], "invalid_identifier");
    }

    #[tokio::test]
    async fn test_token_authentication() {
        let store = Arc::new(MemoryStore::new());
        let router = router_with(store, Arc::new(TokenAuthenticator::new("secret")));
        let uri = "/redfish/v1/Storage/S1/Volumes";

        let (status, error) = send(&router, "POST", uri, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(error["message"], "Unauthorized");

        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(AUTH_TOKEN_HEADER, "secret")
            .body(Body::empty())
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_and_metrics() {
        let (router, _store) = router();
        send(&router, "POST", "/redfish/v1/Storage/S1/Volumes/V1", None).await;

        let request = Request::builder().uri("/healthz").body(Body::empty()).unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("redfish_emulator_requests_total"));
        assert!(text.contains(r#"resource="Volume""#));
    }
}
