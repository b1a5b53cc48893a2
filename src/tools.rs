//! In-process tools served by a static catalog.
//!
//! - `ShowEstimatedExecutionPlan`: compile a query under `SHOWPLAN_XML` and
//!   return the estimated plan without running it

mod inputs;

pub use inputs::*;

use crate::catalog::{ToolHandler, ToolInfo};
use crate::coercion::{SqlParam, ToolArguments};
use crate::constants::{EXECUTION_PLAN_TOOL, NO_PLAN_MESSAGE};
use crate::database::auth::truncate_for_log;
use crate::database::Gateway;
use crate::error::ServerError;
use crate::security::sanitize_query;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

/// Wrap text as MCP tool content.
pub fn text_content(text: impl Into<String>) -> Value {
    json!({ "content": [{ "type": "text", "text": text.into() }] })
}

/// Returns the estimated execution plan for a query.
pub struct ExecutionPlanTool {
    gateway: Arc<dyn Gateway>,
}

impl ExecutionPlanTool {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl ToolHandler for ExecutionPlanTool {
    fn info(&self) -> ToolInfo {
        let schema = serde_json::to_value(schemars::schema_for!(ExplainPlanInput))
            .unwrap_or_else(|_| json!({ "type": "object" }));

        ToolInfo::new(
            EXECUTION_PLAN_TOOL,
            "Returns the estimated execution plan (SHOWPLAN XML) for a SQL query without executing it.",
            schema,
        )
    }

    async fn call(&self, args: ToolArguments) -> Result<Value, ServerError> {
        let query = match args.get("query") {
            Some(SqlParam::Text(query)) => query.as_str(),
            _ => return Err(ServerError::invalid_input("Missing 'query' argument")),
        };

        if query.trim().is_empty() {
            return Err(ServerError::invalid_input("Query cannot be empty"));
        }

        let sanitized = sanitize_query(query);
        if sanitized.is_empty() {
            return Err(ServerError::invalid_input(
                "Query contains only SHOWPLAN directives or batch separators",
            ));
        }

        debug!("Explaining query: {}", truncate_for_log(&sanitized, 100));

        let plan = self.gateway.explain(&sanitized).await?;
        Ok(text_content(
            plan.unwrap_or_else(|| NO_PLAN_MESSAGE.to_string()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{ProcedureOutput, RowSet};
    use crate::security::QualifiedName;
    use std::sync::Mutex;

    #[derive(Default)]
    struct PlanGateway {
        plan: Option<String>,
        explained: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Gateway for PlanGateway {
        async fn query_rows(
            &self,
            _function: &QualifiedName,
            _args: &ToolArguments,
        ) -> Result<RowSet, ServerError> {
            unreachable!("plan tool never lists rows")
        }

        async fn query_scalar(
            &self,
            _function: &QualifiedName,
            _args: &ToolArguments,
        ) -> Result<Option<String>, ServerError> {
            unreachable!("plan tool never calls functions")
        }

        async fn call_procedure(
            &self,
            _procedure: &QualifiedName,
            _args: &ToolArguments,
            _output: ProcedureOutput,
        ) -> Result<Option<String>, ServerError> {
            unreachable!("plan tool never calls procedures")
        }

        async fn explain(&self, query: &str) -> Result<Option<String>, ServerError> {
            self.explained.lock().unwrap().push(query.to_string());
            Ok(self.plan.clone())
        }

        async fn ping(&self) -> Result<(), ServerError> {
            Ok(())
        }
    }

    fn query_args(query: &str) -> ToolArguments {
        let mut args = ToolArguments::new();
        args.set("query", SqlParam::Text(query.to_string()));
        args
    }

    #[test]
    fn test_info() {
        let tool = ExecutionPlanTool::new(Arc::new(PlanGateway::default()));
        let info = tool.info();

        assert_eq!(info.name, "ShowEstimatedExecutionPlan");
        assert_eq!(info.input_schema["required"], json!(["query"]));
    }

    #[tokio::test]
    async fn test_sanitized_query_reaches_backend() {
        let gateway = Arc::new(PlanGateway {
            plan: Some("<ShowPlanXML/>".to_string()),
            ..Default::default()
        });
        let tool = ExecutionPlanTool::new(gateway.clone());

        let result = tool
            .call(query_args("SET SHOWPLAN_XML ON\nGO\nSELECT 1\nGO\n"))
            .await
            .unwrap();

        assert_eq!(result, text_content("<ShowPlanXML/>"));
        assert_eq!(*gateway.explained.lock().unwrap(), vec!["SELECT 1"]);
    }

    #[tokio::test]
    async fn test_missing_plan_row() {
        let tool = ExecutionPlanTool::new(Arc::new(PlanGateway::default()));
        let result = tool.call(query_args("SELECT 1")).await.unwrap();
        assert_eq!(result["content"][0]["text"], json!(NO_PLAN_MESSAGE));
    }

    #[tokio::test]
    async fn test_rejected_queries_skip_backend() {
        let gateway = Arc::new(PlanGateway::default());
        let tool = ExecutionPlanTool::new(gateway.clone());

        for args in [
            ToolArguments::new(),
            query_args("   "),
            query_args("SET SHOWPLAN_XML ON;\nGO"),
        ] {
            let err = tool.call(args).await.unwrap_err();
            assert!(matches!(err, ServerError::InvalidInput(_)));
        }

        let mut numeric = ToolArguments::new();
        numeric.set("query", SqlParam::Int(1));
        assert!(tool.call(numeric).await.is_err());

        assert!(gateway.explained.lock().unwrap().is_empty());
    }
}
