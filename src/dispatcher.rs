//! Request dispatcher.
//!
//! Routes a method name and its params to `initialize`, `ping`, `tools/list`
//! or `tools/call`, and converts every failure into a structured error. The
//! dispatcher holds no per-request state; transports share one instance.

use crate::catalog::{ToolCatalog, ToolList};
use crate::coercion::ToolArguments;
use crate::constants::{PROTOCOL_VERSION, SERVER_NAME, SERVER_VERSION};
use crate::error::ServerError;
use crate::protocol::{Request, Response};
use crate::telemetry::{generate_short_correlation_id, ServerMetrics};
use futures_util::FutureExt;
use serde_json::{json, Value};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info_span, warn, Instrument};

/// Name and version reported by `initialize`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerIdentity {
    pub name: String,
    pub version: String,
}

impl Default for ServerIdentity {
    fn default() -> Self {
        Self {
            name: SERVER_NAME.to_string(),
            version: SERVER_VERSION.to_string(),
        }
    }
}

/// Transport-agnostic request dispatcher.
#[derive(Clone)]
pub struct Dispatcher {
    catalog: Arc<dyn ToolCatalog>,
    identity: ServerIdentity,
    metrics: Arc<ServerMetrics>,
}

impl Dispatcher {
    pub fn new(catalog: Arc<dyn ToolCatalog>) -> Self {
        Self {
            catalog,
            identity: ServerIdentity::default(),
            metrics: Arc::new(ServerMetrics::new()),
        }
    }

    pub fn with_identity(mut self, identity: ServerIdentity) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<ServerMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<ServerMetrics> {
        &self.metrics
    }

    /// Fixed capability and version descriptor.
    pub fn initialize(&self) -> Value {
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "serverInfo": {
                "name": self.identity.name,
                "version": self.identity.version,
            },
            "capabilities": {
                "tools": {}
            }
        })
    }

    /// Current catalog snapshot.
    pub async fn list_tools(&self) -> Result<ToolList, ServerError> {
        self.catalog.list_tools().await
    }

    /// Call a tool with already-coerced arguments.
    pub async fn call_tool(&self, name: &str, args: ToolArguments) -> Result<Value, ServerError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServerError::invalid_input("Tool name is required"));
        }

        debug!("Calling tool {} ({})", name, args);
        let start = Instant::now();
        let result = self.catalog.call_tool(name, args).await;
        self.metrics
            .record_tool_call(result.is_ok(), start.elapsed());
        result
    }

    /// `tools/call` params: `{"name": string, "arguments"?: object}`.
    async fn call_tool_params(&self, params: Option<&Value>) -> Result<Value, ServerError> {
        let params = match params {
            Some(Value::Object(params)) => params,
            Some(Value::Null) | None => {
                return Err(ServerError::invalid_input("empty params for tools/call"))
            }
            Some(_) => {
                return Err(ServerError::invalid_input(
                    "params for tools/call must be an object",
                ))
            }
        };

        let name = match params.get("name") {
            Some(Value::String(name)) if !name.trim().is_empty() => name,
            Some(Value::String(_)) | Some(Value::Null) | None => {
                return Err(ServerError::invalid_input("Tool name is required"))
            }
            Some(_) => return Err(ServerError::invalid_input("Tool name must be a string")),
        };

        let args = ToolArguments::from_optional(params.get("arguments"))?;
        self.call_tool(name, args).await
    }

    /// Route one method. Panics inside a method become internal errors.
    pub async fn dispatch(&self, method: &str, params: Option<&Value>) -> Result<Value, ServerError> {
        let routed = async {
            match method {
                "initialize" => Ok(self.initialize()),
                "ping" => Ok(json!({})),
                "tools/list" => {
                    let list = self.list_tools().await?;
                    serde_json::to_value(list).map_err(|e| ServerError::internal(e.to_string()))
                }
                "tools/call" => self.call_tool_params(params).await,
                other => Err(ServerError::method_not_found(other)),
            }
        };

        match AssertUnwindSafe(routed).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => {
                let detail = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "panic".to_string());
                Err(ServerError::internal(format!("{} panicked: {}", method, detail)))
            }
        }
    }

    /// Handle one decoded request. Notifications produce no response.
    pub async fn handle(&self, request: Request) -> Option<Response> {
        let notification = request.is_notification();
        self.metrics.record_request(notification);

        let span = info_span!(
            "request",
            correlation_id = %generate_short_correlation_id(),
            method = %request.method,
        );

        async move {
            let result = self.dispatch(&request.method, request.params.as_ref()).await;

            if let Err(err) = &result {
                self.metrics.record_error();
                warn!("{} failed: {}", request.method, err.wire_message());
            }

            match request.id {
                Some(id) => Some(Response::from_result(id, result)),
                None => {
                    debug!("Notification handled; no response");
                    None
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Handle one raw protocol line.
    ///
    /// Blank lines and lines that are not JSON carry no usable id and get no
    /// response. A JSON object that is not a valid request is answered with
    /// InvalidRequest when it has an id.
    pub async fn handle_line(&self, line: &str) -> Option<Response> {
        let line = line.trim_start_matches('\u{feff}').trim();
        if line.is_empty() {
            return None;
        }

        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                warn!("Discarding unparseable line: {}", e);
                return None;
            }
        };

        let id = value.get("id").cloned().filter(|id| !id.is_null());

        match serde_json::from_value::<Request>(value) {
            Ok(request) => self.handle(request).await,
            Err(e) => {
                self.metrics.record_error();
                warn!("Invalid request: {}", e);
                id.map(|id| {
                    Response::failure(
                        id,
                        &ServerError::invalid_input(format!("invalid request: {}", e)),
                    )
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{StaticCatalog, ToolHandler, ToolInfo};
    use async_trait::async_trait;

    struct Panics;

    #[async_trait]
    impl ToolHandler for Panics {
        fn info(&self) -> ToolInfo {
            ToolInfo::new("boom", "", json!({"type": "object"}))
        }

        async fn call(&self, _args: ToolArguments) -> Result<Value, ServerError> {
            panic!("tool exploded")
        }
    }

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(Arc::new(StaticCatalog::new().with_tool(Arc::new(Panics))))
    }

    #[tokio::test]
    async fn test_initialize_descriptor() {
        let dispatcher = dispatcher().with_identity(ServerIdentity {
            name: "gw".to_string(),
            version: "9.9.9".to_string(),
        });

        let result = dispatcher.dispatch("initialize", None).await.unwrap();
        assert_eq!(result["protocolVersion"], json!("2024-11-05"));
        assert_eq!(result["serverInfo"]["name"], json!("gw"));
        assert_eq!(result["capabilities"]["tools"], json!({}));
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let err = dispatcher().dispatch("foo/bar", None).await.unwrap_err();
        assert!(matches!(err, ServerError::MethodNotFound(_)));
    }

    #[tokio::test]
    async fn test_panic_becomes_internal_error() {
        let params = json!({"name": "boom"});
        let err = dispatcher()
            .dispatch("tools/call", Some(&params))
            .await
            .unwrap_err();

        assert!(matches!(err, ServerError::Internal(_)));
        assert!(err.to_string().contains("tool exploded"));
    }

    #[tokio::test]
    async fn test_call_params_validation() {
        let dispatcher = dispatcher();

        for params in [
            None,
            Some(json!(null)),
            Some(json!([1])),
            Some(json!({})),
            Some(json!({"name": ""})),
            Some(json!({"name": 5})),
            Some(json!({"name": "boom", "arguments": [1, 2]})),
        ] {
            let err = dispatcher
                .dispatch("tools/call", params.as_ref())
                .await
                .unwrap_err();
            assert!(matches!(err, ServerError::InvalidInput(_)), "{:?}", params);
        }
    }

    #[tokio::test]
    async fn test_handle_line_edge_cases() {
        let dispatcher = dispatcher();

        assert!(dispatcher.handle_line("").await.is_none());
        assert!(dispatcher.handle_line("not json").await.is_none());
        assert!(dispatcher.handle_line(r#"{"id": 1}"#).await.is_some());
        assert!(dispatcher.handle_line(r#"{"params": {}}"#).await.is_none());

        let response = dispatcher
            .handle_line("\u{feff}{\"jsonrpc\":\"2.0\",\"id\":3,\"method\":\"ping\"}")
            .await
            .unwrap();
        assert_eq!(response.result(), Some(&json!({})));
    }

    #[tokio::test]
    async fn test_metrics_count_requests() {
        let dispatcher = dispatcher();
        dispatcher
            .handle_line(r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#)
            .await;
        dispatcher
            .handle_line(r#"{"jsonrpc":"2.0","method":"nope"}"#)
            .await;

        let snapshot = dispatcher.metrics().snapshot();
        assert_eq!(snapshot.requests_total, 1);
        assert_eq!(snapshot.notifications_total, 1);
        assert_eq!(snapshot.errors_total, 1);
    }
}
