//! REST facade over the dispatcher (only available with the `http` feature).
//!
//! Routes:
//! - `GET /health`, `GET /metrics`
//! - `GET /api/info`, `GET /api/info/connection`
//! - `GET /api/tools/list`, `POST /api/tools/call`, `GET /api/tools/call/{toolName}`
//! - `GET /api/tools/connection-test`
//! - `GET /{resource}/list`, `GET /{resource}/get`
//! - `GET|POST /exec/{name}`
//!
//! Query-string values go through the ordered text trial; JSON bodies use
//! JSON coercion.

use crate::coercion::ToolArguments;
use crate::config::ConnectionSummary;
use crate::constants::{DEFAULT_HTTP_HOST, DEFAULT_HTTP_PORT, DEFAULT_MAX_BODY_SIZE};
use crate::database::Gateway;
use crate::dispatcher::Dispatcher;
use crate::error::{ErrorCategory, ServerError};
use crate::resources::{ResourceAction, ResourceApi};
use crate::shutdown::SharedShutdownController;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

/// HTTP transport configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Host to bind to.
    pub host: String,

    /// Port to listen on.
    pub port: u16,

    /// Enable permissive CORS.
    pub enable_cors: bool,

    /// Enable request tracing via tower-http TraceLayer.
    pub enable_tracing: bool,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HTTP_HOST.to_string(),
            port: DEFAULT_HTTP_PORT,
            enable_cors: true,
            enable_tracing: true,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }
}

impl HttpConfig {
    /// Create configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("MSSQL_HTTP_HOST") {
            config.host = host;
        }

        if let Ok(port) = std::env::var("MSSQL_HTTP_PORT") {
            if let Ok(p) = port.parse() {
                config.port = p;
            }
        }

        if let Ok(cors) = std::env::var("MSSQL_HTTP_CORS") {
            config.enable_cors = cors.to_lowercase() == "true" || cors == "1";
        }

        if let Ok(tracing) = std::env::var("MSSQL_HTTP_TRACING") {
            config.enable_tracing = tracing.to_lowercase() == "true" || tracing == "1";
        }

        if let Ok(max_body) = std::env::var("MSSQL_HTTP_MAX_BODY") {
            if let Ok(m) = max_body.parse() {
                config.max_body_size = m;
            }
        }

        config
    }
}

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub resources: ResourceApi,
    pub gateway: Arc<dyn Gateway>,
    pub connection: Arc<ConnectionSummary>,
}

impl AppState {
    pub fn new(
        dispatcher: Dispatcher,
        resources: ResourceApi,
        gateway: Arc<dyn Gateway>,
        connection: ConnectionSummary,
    ) -> Self {
        Self {
            dispatcher,
            resources,
            gateway,
            connection: Arc::new(connection),
        }
    }
}

fn status_for(category: ErrorCategory) -> StatusCode {
    match category {
        ErrorCategory::InvalidRequest => StatusCode::BAD_REQUEST,
        ErrorCategory::MethodNotFound => StatusCode::NOT_FOUND,
        ErrorCategory::UpstreamError | ErrorCategory::InternalError => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let category = self.category();
        warn!("HTTP request failed: {}", self.wire_message());
        (
            status_for(category),
            Json(json!({ "error": self.to_string(), "type": category.as_str() })),
        )
            .into_response()
    }
}

/// Body of `POST /api/tools/call`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallRequest {
    #[serde(default, alias = "ToolName", alias = "name")]
    pub tool_name: String,

    #[serde(default, alias = "Arguments")]
    pub arguments: Option<Value>,
}

/// Envelope returned by the generic tool API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResponse {
    pub success: bool,
    pub result: Option<Value>,
    pub error_message: Option<String>,
    pub execution_time_ms: u64,
}

/// Build the router with all routes and configured layers.
pub fn build_router(state: AppState, config: &HttpConfig) -> Router {
    let mut router = Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/info", get(info_handler))
        .route("/api/info/connection", get(connection_info_handler))
        .route("/api/tools/list", get(tools_list_handler))
        .route("/api/tools/call", post(tools_call_handler))
        .route("/api/tools/call/{tool_name}", get(tools_call_get_handler))
        .route("/api/tools/connection-test", get(connection_test_handler))
        .route("/exec/{name}", get(exec_handler).post(exec_handler))
        .route("/{resource}/{action}", get(resource_handler))
        .layer(DefaultBodyLimit::max(config.max_body_size))
        .with_state(state);

    if config.enable_cors {
        router = router.layer(CorsLayer::permissive());
    }

    if config.enable_tracing {
        router = router.layer(TraceLayer::new_for_http());
    }

    router
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.dispatcher.metrics().snapshot())
}

async fn info_handler() -> impl IntoResponse {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "description": env!("CARGO_PKG_DESCRIPTION"),
        "endpoints": {
            "health": "/health",
            "metrics": "/metrics",
            "toolsList": "/api/tools/list",
            "callTool": "/api/tools/call",
            "connectionTest": "/api/tools/connection-test",
            "resourceList": "/{resource}/list",
            "resourceGet": "/{resource}/get",
            "exec": "/exec/{name}",
        }
    }))
}

async fn connection_info_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.connection.as_ref().clone())
}

async fn tools_list_handler(State(state): State<AppState>) -> Response {
    match state.dispatcher.list_tools().await {
        Ok(list) => Json(list).into_response(),
        Err(e) => {
            warn!("Error getting tools list: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

fn tool_name_required() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": "ToolName is required" })),
    )
        .into_response()
}

/// Run a tool call and wrap the outcome in the response envelope.
async fn run_tool(
    dispatcher: &Dispatcher,
    name: &str,
    args: Result<ToolArguments, ServerError>,
) -> Response {
    let start = Instant::now();
    let outcome = match args {
        Ok(args) => dispatcher.call_tool(name, args).await,
        Err(e) => Err(e),
    };
    let execution_time_ms = start.elapsed().as_millis() as u64;

    match outcome {
        Ok(result) => Json(ToolCallResponse {
            success: true,
            result: Some(result),
            error_message: None,
            execution_time_ms,
        })
        .into_response(),
        Err(e) => {
            warn!("Error calling tool {}: {}", name, e);
            failure_envelope(e, execution_time_ms)
        }
    }
}

fn failure_envelope(error: ServerError, execution_time_ms: u64) -> Response {
    (
        status_for(error.category()),
        Json(ToolCallResponse {
            success: false,
            result: None,
            error_message: Some(error.wire_message()),
            execution_time_ms,
        }),
    )
        .into_response()
}

/// Parse the `POST /api/tools/call` body. An empty body is an empty request.
fn parse_tool_call_request(body: &[u8]) -> Result<ToolCallRequest, ServerError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ToolCallRequest::default());
    }
    serde_json::from_slice(body).map_err(|e| {
        ServerError::invalid_input(format!("request body is not a valid tool call: {}", e))
    })
}

async fn tools_call_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let request = match parse_tool_call_request(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!("Rejected tool call body: {}", e);
            return failure_envelope(e, 0);
        }
    };

    if request.tool_name.trim().is_empty() {
        return tool_name_required();
    }

    let args = ToolArguments::from_optional(request.arguments.as_ref());
    run_tool(&state.dispatcher, &request.tool_name, args).await
}

async fn tools_call_get_handler(
    State(state): State<AppState>,
    Path(tool_name): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    if tool_name.trim().is_empty() {
        return tool_name_required();
    }

    let args = ToolArguments::from_query_pairs(pairs.into_iter().filter(|(k, _)| k != "toolName"));
    run_tool(&state.dispatcher, &tool_name, args).await
}

async fn connection_test_handler(State(state): State<AppState>) -> Response {
    let timestamp = chrono::Utc::now().to_rfc3339();
    match state.gateway.ping().await {
        Ok(()) => Json(json!({ "status": "connected", "timestamp": timestamp })).into_response(),
        Err(e) => {
            warn!("Connection test failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "disconnected", "timestamp": timestamp })),
            )
                .into_response()
        }
    }
}

async fn resource_handler(
    State(state): State<AppState>,
    Path((resource, action)): Path<(String, String)>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Value>, Response> {
    let action: ResourceAction = action.parse().map_err(|_| {
        (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": format!("Unknown action '{}' for resource '{}'", action, resource),
                "type": "NotFound",
            })),
        )
            .into_response()
    })?;

    let args = ToolArguments::from_query_pairs(pairs).map_err(IntoResponse::into_response)?;
    state
        .resources
        .read(&resource, action, &args)
        .await
        .map(Json)
        .map_err(IntoResponse::into_response)
}

async fn exec_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
    body: Bytes,
) -> Result<Json<Value>, ServerError> {
    let mut args = ToolArguments::from_query_pairs(pairs)?;

    if !body.iter().all(u8::is_ascii_whitespace) {
        match serde_json::from_slice::<Value>(&body) {
            Ok(Value::Object(map)) => args.merge_json(&map)?,
            Ok(_) => {
                return Err(ServerError::invalid_input(
                    "request body must be a JSON object",
                ))
            }
            Err(e) => {
                return Err(ServerError::invalid_input(format!(
                    "request body is not valid JSON: {}",
                    e
                )))
            }
        }
    }

    state.resources.exec(&name, &args).await.map(Json)
}

/// Start the HTTP server with graceful shutdown support.
pub async fn start_http_server_with_shutdown(
    state: AppState,
    config: HttpConfig,
    shutdown_controller: Option<SharedShutdownController>,
) -> Result<(), anyhow::Error> {
    let app = build_router(state, &config);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("HTTP server listening on http://{}", addr);
    info!("Tools endpoint: http://{}/api/tools/list", addr);
    info!("Health endpoint: http://{}/health", addr);
    if config.enable_tracing {
        info!("Request tracing enabled");
    }

    if let Some(controller) = shutdown_controller {
        let mut shutdown_signal = controller.signal();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown_signal.recv().await;
                info!("HTTP server received shutdown signal");
            })
            .await?;
    } else {
        axum::serve(listener, app).await?;
    }

    Ok(())
}
