//! End-to-end tests of the stdio protocol over in-memory streams.
//!
//! A scripted gateway stands in for SQL Server and records every call it
//! receives, so tests can assert both the wire output and what reached the
//! backend.

use async_trait::async_trait;
use mssql_tool_gateway::catalog::{DynamicCatalog, StaticCatalog, ToolCatalog};
use mssql_tool_gateway::coercion::{SqlParam, ToolArguments};
use mssql_tool_gateway::database::{Gateway, ProcedureOutput, RowSet};
use mssql_tool_gateway::security::QualifiedName;
use mssql_tool_gateway::tools::ExecutionPlanTool;
use mssql_tool_gateway::transport::stdio::serve;
use mssql_tool_gateway::{Dispatcher, ServerError};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// One recorded backend call.
#[derive(Debug, Clone)]
struct Call {
    object: String,
    args: ToolArguments,
}

#[derive(Default)]
struct ScriptedGateway {
    tool_list: Option<String>,
    procedure_payload: Option<String>,
    plan: Option<String>,
    fail_with: Mutex<Option<ServerError>>,
    calls: Mutex<Vec<Call>>,
    count: AtomicUsize,
}

impl ScriptedGateway {
    fn record(&self, object: String, args: &ToolArguments) -> Result<(), ServerError> {
        self.count.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push(Call {
            object,
            args: args.clone(),
        });
        match self.fail_with.lock().unwrap().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn call_count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    fn last_call(&self) -> Call {
        self.calls.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl Gateway for ScriptedGateway {
    async fn query_rows(
        &self,
        function: &QualifiedName,
        args: &ToolArguments,
    ) -> Result<RowSet, ServerError> {
        self.record(function.to_string(), args)?;
        Ok(RowSet::default())
    }

    async fn query_scalar(
        &self,
        function: &QualifiedName,
        args: &ToolArguments,
    ) -> Result<Option<String>, ServerError> {
        self.record(function.to_string(), args)?;
        Ok(self.tool_list.clone())
    }

    async fn call_procedure(
        &self,
        procedure: &QualifiedName,
        args: &ToolArguments,
        _output: ProcedureOutput,
    ) -> Result<Option<String>, ServerError> {
        self.record(procedure.to_string(), args)?;
        Ok(self.procedure_payload.clone())
    }

    async fn explain(&self, query: &str) -> Result<Option<String>, ServerError> {
        self.record(format!("explain {}", query), &ToolArguments::new())?;
        Ok(self.plan.clone())
    }

    async fn ping(&self) -> Result<(), ServerError> {
        Ok(())
    }
}

fn dynamic(gateway: &Arc<ScriptedGateway>) -> Dispatcher {
    let catalog: Arc<dyn ToolCatalog> = Arc::new(DynamicCatalog::new(gateway.clone(), "mcp"));
    Dispatcher::new(catalog)
}

/// Feed `lines` through the stdio loop and return the parsed output lines.
async fn run(dispatcher: &Dispatcher, lines: &[Value]) -> Vec<Value> {
    let input: String = lines.iter().map(|l| format!("{}\n", l)).collect();
    run_raw(dispatcher, &input).await
}

async fn run_raw(dispatcher: &Dispatcher, input: &str) -> Vec<Value> {
    let mut output = Vec::new();
    serve(dispatcher, input.as_bytes(), &mut output, None)
        .await
        .expect("stdio loop failed");

    String::from_utf8(output)
        .expect("output is UTF-8")
        .lines()
        .map(|line| serde_json::from_str(line).expect("each output line is one JSON object"))
        .collect()
}

fn has_exactly_one_outcome(response: &Value) -> bool {
    let object = response.as_object().unwrap();
    object.contains_key("result") != object.contains_key("error")
}

#[tokio::test]
async fn notifications_never_produce_output() {
    let gateway = Arc::new(ScriptedGateway::default());
    let dispatcher = dynamic(&gateway);

    let output = run(
        &dispatcher,
        &[
            json!({"jsonrpc": "2.0", "method": "initialize"}),
            json!({"jsonrpc": "2.0", "method": "foo/bar", "id": null}),
            json!({"jsonrpc": "2.0", "method": "tools/call", "params": {}}),
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
        ],
    )
    .await;

    assert!(output.is_empty());
}

#[tokio::test]
async fn notifications_still_run_for_side_effects() {
    let gateway = Arc::new(ScriptedGateway {
        procedure_payload: Some("{}".to_string()),
        ..Default::default()
    });
    let dispatcher = dynamic(&gateway);

    let output = run(
        &dispatcher,
        &[json!({"jsonrpc": "2.0", "method": "tools/call", "params": {"name": "Audit"}})],
    )
    .await;

    assert!(output.is_empty());
    assert_eq!(gateway.call_count(), 1);
}

#[tokio::test]
async fn every_response_has_exactly_one_outcome() {
    let gateway = Arc::new(ScriptedGateway {
        tool_list: Some(r#"{"tools": []}"#.to_string()),
        procedure_payload: Some(r#"{"ok": true}"#.to_string()),
        ..Default::default()
    });
    let dispatcher = dynamic(&gateway);

    let output = run(
        &dispatcher,
        &[
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"}),
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
            json!({"jsonrpc": "2.0", "id": 3, "method": "tools/call", "params": {"name": "A"}}),
            json!({"jsonrpc": "2.0", "id": 4, "method": "tools/call", "params": {}}),
            json!({"jsonrpc": "2.0", "id": 5, "method": "foo/bar"}),
            json!({"jsonrpc": "2.0", "id": 6, "method": "ping"}),
        ],
    )
    .await;

    assert_eq!(output.len(), 6);
    for (i, response) in output.iter().enumerate() {
        assert!(has_exactly_one_outcome(response), "{}", response);
        assert_eq!(response["id"], json!(i + 1));
        assert_eq!(response["jsonrpc"], json!("2.0"));
    }
}

#[tokio::test]
async fn unknown_method_is_method_not_found() {
    let dispatcher = dynamic(&Arc::new(ScriptedGateway::default()));

    let output = run(
        &dispatcher,
        &[json!({"jsonrpc": "2.0", "id": "x", "method": "foo/bar"})],
    )
    .await;

    assert_eq!(output[0]["id"], json!("x"));
    assert_eq!(output[0]["error"]["code"], json!(-32601));
    assert_eq!(output[0]["error"]["message"], json!("unknown method: foo/bar"));
}

#[tokio::test]
async fn initialize_descriptor() {
    let dispatcher = dynamic(&Arc::new(ScriptedGateway::default()));

    let output = run(
        &dispatcher,
        &[json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}})],
    )
    .await;

    let result = &output[0]["result"];
    assert_eq!(result["protocolVersion"], json!("2024-11-05"));
    assert_eq!(result["serverInfo"]["name"], json!("mssql-tool-gateway"));
    assert_eq!(result["capabilities"], json!({"tools": {}}));
}

#[tokio::test]
async fn missing_tool_name_never_reaches_backend() {
    let gateway = Arc::new(ScriptedGateway::default());
    let dispatcher = dynamic(&gateway);

    let output = run(
        &dispatcher,
        &[
            json!({"jsonrpc": "2.0", "id": 1, "method": "tools/call", "params": {"arguments": {"a": 1}}}),
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/call"}),
            json!({"jsonrpc": "2.0", "id": 3, "method": "tools/call", "params": {"name": "  "}}),
        ],
    )
    .await;

    assert_eq!(output.len(), 3);
    for response in &output {
        assert_eq!(response["error"]["code"], json!(-32600));
        assert_eq!(response["error"]["data"]["category"], json!("InvalidRequest"));
    }
    assert_eq!(gateway.call_count(), 0);
}

#[tokio::test]
async fn arguments_are_coerced_by_json_kind() {
    let gateway = Arc::new(ScriptedGateway {
        procedure_payload: Some(r#"{"done": 1}"#.to_string()),
        ..Default::default()
    });
    let dispatcher = dynamic(&gateway);

    let output = run(
        &dispatcher,
        &[json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": {
                "name": "GetThing",
                "arguments": {"n": 3, "flag": true, "label": "x", "note": null}
            }
        })],
    )
    .await;

    assert_eq!(output[0]["result"], json!({"done": 1}));

    let call = gateway.last_call();
    assert_eq!(call.object, "[mcp].[GetThing]");
    assert_eq!(call.args.get("n"), Some(&SqlParam::Decimal(Decimal::from(3))));
    assert_eq!(call.args.get("flag"), Some(&SqlParam::Bool(true)));
    assert_eq!(call.args.get("label"), Some(&SqlParam::Text("x".to_string())));
    assert_eq!(call.args.get("note"), Some(&SqlParam::Null));
}

#[tokio::test]
async fn empty_payload_becomes_empty_object() {
    let gateway = Arc::new(ScriptedGateway::default());
    let dispatcher = dynamic(&gateway);

    let output = run(
        &dispatcher,
        &[json!({"jsonrpc": "2.0", "id": 1, "method": "tools/call", "params": {"name": "Quiet"}})],
    )
    .await;

    assert_eq!(output[0]["result"], json!({}));
}

#[tokio::test]
async fn malformed_payload_is_upstream_error() {
    let gateway = Arc::new(ScriptedGateway {
        procedure_payload: Some("not json".to_string()),
        tool_list: Some("<tools/>".to_string()),
        ..Default::default()
    });
    let dispatcher = dynamic(&gateway);

    let output = run(
        &dispatcher,
        &[
            json!({"jsonrpc": "2.0", "id": 1, "method": "tools/call", "params": {"name": "Bad"}}),
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
        ],
    )
    .await;

    for response in &output {
        assert_eq!(response["error"]["code"], json!(-32603));
        assert_eq!(response["error"]["data"]["category"], json!("UpstreamError"));
        assert!(response["error"]["message"]
            .as_str()
            .unwrap()
            .starts_with("UpstreamError: "));
    }
}

#[tokio::test]
async fn backend_failure_is_reported_once() {
    let gateway = Arc::new(ScriptedGateway::default());
    *gateway.fail_with.lock().unwrap() = Some(ServerError::object_not_found(
        "Stored procedure",
        "mcp.Nope",
    ));
    let dispatcher = dynamic(&gateway);

    let output = run(
        &dispatcher,
        &[json!({"jsonrpc": "2.0", "id": 9, "method": "tools/call", "params": {"name": "Nope"}})],
    )
    .await;

    assert_eq!(output[0]["error"]["code"], json!(-32603));
    assert_eq!(gateway.call_count(), 1);
}

#[tokio::test]
async fn dynamic_list_is_refetched_every_time() {
    let gateway = Arc::new(ScriptedGateway {
        tool_list: Some(
            r#"{"tools": [{"name": "GetCustomer", "description": "By id"}]}"#.to_string(),
        ),
        ..Default::default()
    });
    let dispatcher = dynamic(&gateway);

    let output = run(
        &dispatcher,
        &[
            json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}),
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
        ],
    )
    .await;

    assert_eq!(gateway.call_count(), 2);
    assert_eq!(gateway.last_call().object, "[mcp].[ToolsList]");

    let tool = &output[0]["result"]["tools"][0];
    assert_eq!(tool["name"], json!("GetCustomer"));
    assert_eq!(tool["inputSchema"], json!({"type": "object", "properties": {}}));
}

#[tokio::test]
async fn invalid_tool_name_is_rejected_before_backend() {
    let gateway = Arc::new(ScriptedGateway::default());
    let dispatcher = dynamic(&gateway);

    let output = run(
        &dispatcher,
        &[json!({
            "jsonrpc": "2.0", "id": 1, "method": "tools/call",
            "params": {"name": "x; DROP TABLE users--"}
        })],
    )
    .await;

    assert_eq!(output[0]["error"]["code"], json!(-32600));
    assert_eq!(gateway.call_count(), 0);
}

#[tokio::test]
async fn static_catalog_rejects_unknown_tools() {
    let gateway = Arc::new(ScriptedGateway {
        plan: Some("<ShowPlanXML/>".to_string()),
        ..Default::default()
    });
    let catalog = StaticCatalog::new().with_tool(Arc::new(ExecutionPlanTool::new(gateway.clone())));
    let dispatcher = Dispatcher::new(Arc::new(catalog));

    let output = run(
        &dispatcher,
        &[
            json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}),
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/call", "params": {"name": "Other"}}),
            json!({
                "jsonrpc": "2.0", "id": 3, "method": "tools/call",
                "params": {
                    "name": "ShowEstimatedExecutionPlan",
                    "arguments": {"query": "SET SHOWPLAN_XML ON\nGO\nSELECT 1"}
                }
            }),
        ],
    )
    .await;

    assert_eq!(
        output[0]["result"]["tools"][0]["name"],
        json!("ShowEstimatedExecutionPlan")
    );
    assert_eq!(output[1]["error"]["code"], json!(-32600));
    assert_eq!(
        output[2]["result"],
        json!({"content": [{"type": "text", "text": "<ShowPlanXML/>"}]})
    );
    assert_eq!(gateway.last_call().object, "explain SELECT 1");
}

#[tokio::test]
async fn garbage_lines_are_skipped() {
    let dispatcher = dynamic(&Arc::new(ScriptedGateway::default()));

    let output = run_raw(
        &dispatcher,
        "{not json\n\n   \n[1,2,3]\n{\"jsonrpc\":\"2.0\",\"id\":7,\"method\":\"ping\"}\n",
    )
    .await;

    assert_eq!(output, vec![json!({"jsonrpc": "2.0", "id": 7, "result": {}})]);
}

#[tokio::test]
async fn request_without_method_is_invalid_request() {
    let dispatcher = dynamic(&Arc::new(ScriptedGateway::default()));

    let output = run(&dispatcher, &[json!({"jsonrpc": "2.0", "id": 4, "params": {}})]).await;

    assert_eq!(output[0]["id"], json!(4));
    assert_eq!(output[0]["error"]["code"], json!(-32600));
}

#[tokio::test]
async fn structured_arguments_pass_as_json_text() {
    let gateway = Arc::new(ScriptedGateway::default());
    let dispatcher = dynamic(&gateway);

    run(
        &dispatcher,
        &[json!({
            "jsonrpc": "2.0", "id": 1, "method": "tools/call",
            "params": {"name": "Bulk", "arguments": {"items": [1, 2], "filter": {"a": "b"}}}
        })],
    )
    .await;

    let call = gateway.last_call();
    assert_eq!(call.args.text("items"), Some("[1,2]"));
    assert_eq!(call.args.text("filter"), Some(r#"{"a":"b"}"#));
}
