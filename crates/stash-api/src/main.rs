//! stash-api - HTTP API server for the stash item repository

use std::net::SocketAddr;

use async_trait::async_trait;
use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use stash_core::{
    CategoryRepository, CreateItemRequest, DeleteItemsRequest, Item, ItemQuery, ItemRepository,
    SearchItemsRequest, SearchMyItemsRequest, UpdateItemRequest,
};
use stash_db::Database;

// =============================================================================
// REQUEST ID (UUIDv7)
// =============================================================================

/// Generates time-ordered UUIDv7 request correlation IDs.
///
/// UUIDv7 embeds a Unix timestamp, so IDs sort chronologically — useful for
/// log correlation when tracing a request across the api and db subsystems.
#[derive(Clone, Default)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

// =============================================================================
// STATE
// =============================================================================

/// Shared application state: the injected database context.
#[derive(Clone)]
struct AppState {
    db: Database,
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Parse allowed origins from a comma-separated environment variable.
///
/// # Environment Variable
/// `ALLOWED_ORIGINS` - Comma-separated list of origins to echo back on
/// cross-origin requests. Replaces the compiled-in frontend origin the
/// service used to carry; defaults to `http://localhost:3000` when unset.
fn parse_allowed_origins() -> Vec<HeaderValue> {
    let origins_str =
        std::env::var("ALLOWED_ORIGINS").unwrap_or_else(|_| "http://localhost:3000".to_string());

    let origins: Vec<HeaderValue> = origins_str
        .split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            match trimmed.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!("Invalid CORS origin '{}': {}", trimmed, e);
                    None
                }
            }
        })
        .collect();

    if origins.is_empty() {
        return vec![HeaderValue::from_static("http://localhost:3000")];
    }
    origins
}

/// CORS layer echoing a configured origin with credentials.
///
/// Applied to the whole router so every response — success, error, and
/// preflight — carries the headers browser clients need to read bodies.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(parse_allowed_origins()))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}

// =============================================================================
// ROUTER
// =============================================================================

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check).options(preflight))
        .route(
            "/items",
            post(create_item)
                .put(update_item)
                .delete(delete_items)
                .options(preflight),
        )
        .route("/items/search", post(search_items).options(preflight))
        .route("/items/mine", post(search_my_items).options(preflight))
        .route("/categories", get(list_categories).options(preflight))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(cors_layer())
        // Attachments travel inline as base64 text
        .layer(RequestBodyLimitLayer::new(32 * 1024 * 1024)) // 32 MB
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with configurable output
    //
    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   RUST_LOG    - standard env filter (default: "stash_api=debug,tower_http=debug")
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "stash_api=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(env_filter);
    if log_format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    // Get configuration from environment
    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/stash".to_string());
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .unwrap_or(8080);

    // Connect to database; failure here is fatal to the process
    info!("Connecting to database...");
    let db = Database::connect(&database_url).await?;
    info!("Database connected");

    // Run pending database migrations on startup
    info!("Running database migrations...");
    db.migrate().await?;
    info!("Database migrations complete");

    let app = build_router(AppState { db });

    // Start server
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// =============================================================================
// HANDLERS
// =============================================================================

/// Liveness probe.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Plain OPTIONS on any route answers 200 with an empty body; the CORS
/// layer adds the preflight headers.
async fn preflight() -> StatusCode {
    StatusCode::OK
}

/// Create an item. Returns the generated id.
async fn create_item(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateItemRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = state.db.items.insert(req).await?;
    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id }))))
}

/// Search all items with optional filters.
async fn search_items(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SearchItemsRequest>,
) -> Result<Json<Vec<Item>>, ApiError> {
    let items = state.db.items.search(ItemQuery::from_search(req)).await?;
    Ok(Json(items))
}

/// Search only the caller's items.
async fn search_my_items(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SearchMyItemsRequest>,
) -> Result<Json<Vec<Item>>, ApiError> {
    let items = state.db.items.search(ItemQuery::from_mine(req)).await?;
    Ok(Json(items))
}

/// Overwrite an item's mutable fields. Updating an id that no longer
/// exists still answers success (the repository's documented no-op).
async fn update_item(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<UpdateItemRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state.db.items.update(req).await?;
    Ok(Json(serde_json::json!({ "message": "item updated" })))
}

/// Delete a batch of items by id.
async fn delete_items(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<DeleteItemsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state.db.items.delete_batch(&req.item_ids).await?;
    Ok(Json(serde_json::json!({ "message": "items deleted" })))
}

/// List all category names.
async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<String>>, ApiError> {
    let names = state.db.categories.list_names().await?;
    Ok(Json(names))
}

// =============================================================================
// ERROR HANDLING
// =============================================================================

#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    Internal(stash_core::Error),
}

impl From<stash_core::Error> for ApiError {
    fn from(err: stash_core::Error) -> Self {
        match err {
            stash_core::Error::Validation(msg) => ApiError::BadRequest(msg),
            stash_core::Error::Decode(msg) => ApiError::BadRequest(msg),
            other => ApiError::Internal(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => {
                warn!(subsystem = "api", error = %msg, "Rejected request");
                (StatusCode::BAD_REQUEST, msg)
            }
            ApiError::Internal(err) => {
                error!(subsystem = "api", error = %err, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

/// Json extractor whose every rejection is a 400.
///
/// axum's stock `Json` answers type mismatches with 422 and a missing
/// content type with 415; the wire contract here is a single 400 for any
/// undecodable body.
struct ApiJson<T>(T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(ApiError::BadRequest(rejection.body_text())),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use tower::ServiceExt;

    /// Router over a lazy pool: no PostgreSQL is contacted unless a
    /// request actually reaches the store.
    fn test_app() -> Router {
        let db = Database::connect_lazy("postgres://localhost/stash_router_test")
            .expect("lazy pool should build without a server");
        build_router(AppState { db })
    }

    fn json_request(method: &str, uri: &str, body: &str) -> Request {
        axum::http::Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ORIGIN, "http://localhost:3000")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_returns_ok() {
        let response = test_app()
            .oneshot(
                axum::http::Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_options_answers_200_with_cors_headers() {
        for uri in ["/items", "/items/search", "/items/mine", "/categories"] {
            let response = test_app()
                .oneshot(
                    axum::http::Request::builder()
                        .method("OPTIONS")
                        .uri(uri)
                        .header(header::ORIGIN, "http://localhost:3000")
                        .header("Access-Control-Request-Method", "POST")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK, "OPTIONS {}", uri);
            assert_eq!(
                response
                    .headers()
                    .get("access-control-allow-origin")
                    .and_then(|v| v.to_str().ok()),
                Some("http://localhost:3000")
            );
            assert_eq!(
                response
                    .headers()
                    .get("access-control-allow-credentials")
                    .and_then(|v| v.to_str().ok()),
                Some("true")
            );
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            assert!(bytes.is_empty());
        }
    }

    #[tokio::test]
    async fn test_options_without_preflight_headers_still_succeeds() {
        let response = test_app()
            .oneshot(
                axum::http::Request::builder()
                    .method("OPTIONS")
                    .uri("/items")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_wrong_method_answers_405() {
        let response = test_app()
            .oneshot(
                axum::http::Request::builder()
                    .method("GET")
                    .uri("/items")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_malformed_json_answers_400() {
        let response = test_app()
            .oneshot(json_request("POST", "/items", "{not json"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_create_with_missing_required_field_answers_400() {
        // No DB is reachable; validation must reject before any store call.
        let response = test_app()
            .oneshot(json_request(
                "POST",
                "/items",
                r#"{"title":"t","category":"c","createdBy":"a@example.com"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        let msg = body["error"].as_str().unwrap();
        assert!(msg.contains("chapter"), "{}", msg);
    }

    #[tokio::test]
    async fn test_create_with_malformed_file_answers_400() {
        let response = test_app()
            .oneshot(json_request(
                "POST",
                "/items",
                r#"{"title":"t","category":"c","chapter":"1",
                    "createdBy":"a@example.com","file":"%%% not base64"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("base64"));
    }

    #[tokio::test]
    async fn test_error_responses_carry_cors_headers() {
        let response = test_app()
            .oneshot(json_request("POST", "/items", r#"{"title":""}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response
                .headers()
                .get("access-control-allow-origin")
                .and_then(|v| v.to_str().ok()),
            Some("http://localhost:3000")
        );
    }

    #[tokio::test]
    async fn test_update_with_missing_required_field_answers_400() {
        let response = test_app()
            .oneshot(json_request(
                "PUT",
                "/items",
                r#"{"id":"01ARZ3NDEKTSV4RRFFQ69G5FAV","title":"t","category":"",
                    "chapter":"1","createdBy":"a@example.com"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_delete_empty_batch_answers_success_message() {
        // An empty batch never touches the store.
        let response = test_app()
            .oneshot(json_request("DELETE", "/items", r#"{"itemIds":[]}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["message"], "items deleted");
    }

    #[tokio::test]
    async fn test_unknown_route_answers_404() {
        let response = test_app()
            .oneshot(
                axum::http::Request::builder()
                    .uri("/nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_parse_allowed_origins_defaults_when_unset() {
        // The test process does not set ALLOWED_ORIGINS.
        let origins = parse_allowed_origins();
        assert_eq!(origins, vec![HeaderValue::from_static("http://localhost:3000")]);
    }
}
