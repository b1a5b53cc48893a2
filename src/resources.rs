//! REST resources backed by objects in the API schema.
//!
//! ## Routes
//!
//! - `/{resource}/list` - set-returning function `<schema>.<resource>List`
//! - `/{resource}/get` - scalar function `<schema>.<resource>Get`
//! - `/exec/{name}` - procedure `<schema>.<name>` with an `@response` output
//!
//! Payloads that are not valid JSON are wrapped as `{"result": text}`.

use crate::coercion::{decode_lenient_payload, ToolArguments};
use crate::constants::RESPONSE_OUTPUT_PARAMETER;
use crate::database::{Gateway, ProcedureOutput};
use crate::error::ServerError;
use crate::security::QualifiedName;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// The read shape requested for a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceAction {
    List,
    Get,
}

impl ResourceAction {
    /// Suffix appended to the resource name to find its function.
    pub fn suffix(&self) -> &'static str {
        match self {
            ResourceAction::List => "List",
            ResourceAction::Get => "Get",
        }
    }
}

impl FromStr for ResourceAction {
    type Err = ServerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "list" => Ok(ResourceAction::List),
            "get" => Ok(ResourceAction::Get),
            other => Err(ServerError::object_not_found("Action", other)),
        }
    }
}

impl fmt::Display for ResourceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceAction::List => write!(f, "list"),
            ResourceAction::Get => write!(f, "get"),
        }
    }
}

/// Calls into the API schema on behalf of the HTTP facade.
#[derive(Clone)]
pub struct ResourceApi {
    gateway: Arc<dyn Gateway>,
    schema: String,
}

impl ResourceApi {
    pub fn new(gateway: Arc<dyn Gateway>, schema: impl Into<String>) -> Self {
        Self {
            gateway,
            schema: schema.into(),
        }
    }

    fn object(&self, resource: &str, action: ResourceAction) -> Result<QualifiedName, ServerError> {
        QualifiedName::new(&self.schema, &format!("{}{}", resource, action.suffix()))
    }

    /// Rows of `<schema>.<resource>List(args...)` as `{data, count}`.
    pub async fn list(&self, resource: &str, args: &ToolArguments) -> Result<Value, ServerError> {
        let function = self.object(resource, ResourceAction::List)?;
        debug!("Listing {} with {}", function, args);
        let rows = self.gateway.query_rows(&function, args).await?;
        Ok(rows.to_json())
    }

    /// JSON text returned by `<schema>.<resource>Get(args...)`.
    pub async fn get(&self, resource: &str, args: &ToolArguments) -> Result<Value, ServerError> {
        let function = self.object(resource, ResourceAction::Get)?;
        debug!("Reading {} with {}", function, args);
        let cell = self.gateway.query_scalar(&function, args).await?;
        Ok(decode_lenient_payload(cell))
    }

    /// Run either read shape.
    pub async fn read(
        &self,
        resource: &str,
        action: ResourceAction,
        args: &ToolArguments,
    ) -> Result<Value, ServerError> {
        match action {
            ResourceAction::List => self.list(resource, args).await,
            ResourceAction::Get => self.get(resource, args).await,
        }
    }

    /// Output payload of `<schema>.<name>` called with `@response OUTPUT`.
    pub async fn exec(&self, name: &str, args: &ToolArguments) -> Result<Value, ServerError> {
        let procedure = QualifiedName::new(&self.schema, name)?;
        debug!("Executing {} with {}", procedure, args);
        let cell = self
            .gateway
            .call_procedure(
                &procedure,
                args,
                ProcedureOutput::OutputParameter(RESPONSE_OUTPUT_PARAMETER.to_string()),
            )
            .await?;
        Ok(decode_lenient_payload(cell))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coercion::SqlParam;
    use crate::database::{RowSet, SqlValue};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
        cell: Option<String>,
    }

    #[async_trait]
    impl Gateway for Recorder {
        async fn query_rows(
            &self,
            function: &QualifiedName,
            args: &ToolArguments,
        ) -> Result<RowSet, ServerError> {
            self.calls.lock().unwrap().push(format!("rows {} {}", function, args));
            let mut rows = RowSet::new(vec!["id".to_string(), "name".to_string()]);
            rows.push(vec![SqlValue::I32(1), SqlValue::String("a".to_string())]);
            Ok(rows)
        }

        async fn query_scalar(
            &self,
            function: &QualifiedName,
            args: &ToolArguments,
        ) -> Result<Option<String>, ServerError> {
            self.calls.lock().unwrap().push(format!("scalar {} {}", function, args));
            Ok(self.cell.clone())
        }

        async fn call_procedure(
            &self,
            procedure: &QualifiedName,
            args: &ToolArguments,
            output: ProcedureOutput,
        ) -> Result<Option<String>, ServerError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("proc {} {} {:?}", procedure, args, output));
            Ok(self.cell.clone())
        }

        async fn explain(&self, _query: &str) -> Result<Option<String>, ServerError> {
            unreachable!()
        }

        async fn ping(&self) -> Result<(), ServerError> {
            Ok(())
        }
    }

    #[test]
    fn test_action_parse() {
        assert_eq!("list".parse::<ResourceAction>().unwrap(), ResourceAction::List);
        assert_eq!("GET".parse::<ResourceAction>().unwrap(), ResourceAction::Get);
        assert!(matches!(
            "delete".parse::<ResourceAction>(),
            Err(ServerError::ObjectNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_materializes_rows() {
        let gateway = Arc::new(Recorder::default());
        let api = ResourceApi::new(gateway.clone(), "api");

        let mut args = ToolArguments::new();
        args.set("top", SqlParam::Int(5));
        let value = api.list("users", &args).await.unwrap();

        assert_eq!(value, json!({"data": [{"id": 1, "name": "a"}], "count": 1}));
        assert_eq!(
            gateway.calls.lock().unwrap()[0],
            "rows [api].[usersList] @top=5"
        );
    }

    #[tokio::test]
    async fn test_get_wraps_non_json() {
        let api = ResourceApi::new(
            Arc::new(Recorder {
                cell: Some("plain text".to_string()),
                ..Default::default()
            }),
            "api",
        );

        let value = api
            .read("users", ResourceAction::Get, &ToolArguments::new())
            .await
            .unwrap();
        assert_eq!(value, json!({"result": "plain text"}));
    }

    #[tokio::test]
    async fn test_exec_uses_response_output() {
        let gateway = Arc::new(Recorder {
            cell: Some(r#"{"ok":true}"#.to_string()),
            ..Default::default()
        });
        let api = ResourceApi::new(gateway.clone(), "api");

        let value = api.exec("orderCreate", &ToolArguments::new()).await.unwrap();
        assert_eq!(value, json!({"ok": true}));
        assert!(gateway.calls.lock().unwrap()[0].contains("OutputParameter(\"response\")"));
    }

    #[tokio::test]
    async fn test_exec_absent_output_is_empty_object() {
        let api = ResourceApi::new(Arc::new(Recorder::default()), "api");
        let value = api.exec("noop", &ToolArguments::new()).await.unwrap();
        assert_eq!(value, json!({}));
    }

    #[tokio::test]
    async fn test_invalid_resource_name() {
        let gateway = Arc::new(Recorder::default());
        let api = ResourceApi::new(gateway.clone(), "api");

        assert!(api.list("users;--", &ToolArguments::new()).await.is_err());
        assert!(gateway.calls.lock().unwrap().is_empty());
    }
}
