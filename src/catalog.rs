//! Tool catalogs.
//!
//! The dispatcher only sees [`ToolCatalog`]. A [`StaticCatalog`] holds a fixed
//! set of in-process [`ToolHandler`]s; a [`DynamicCatalog`] asks the backend
//! on every call, so catalog changes show up without a restart.

use crate::coercion::{decode_json_payload, ToolArguments};
use crate::config::{CatalogMode, Config};
use crate::constants::TOOLS_LIST_FUNCTION;
use crate::database::{Gateway, ProcedureOutput};
use crate::error::ServerError;
use crate::security::QualifiedName;
use crate::tools::ExecutionPlanTool;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::debug;

/// One tool as advertised by `tools/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,

    #[serde(rename = "inputSchema", default = "empty_object_schema")]
    pub input_schema: Value,

    /// Any other members the backend attached (annotations, titles...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ToolInfo {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            extra: Map::new(),
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn empty_object_schema() -> Value {
    json!({ "type": "object", "properties": {} })
}

/// A catalog snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ToolList {
    pub tools: Vec<ToolInfo>,
}

/// Parse a tool list payload: `{"tools": [...]}`, a bare array, or `{}`.
pub fn parse_tool_list(payload: Value) -> Result<ToolList, ServerError> {
    let tools = match payload {
        Value::Array(items) => Value::Array(items),
        Value::Object(mut object) => match object.remove("tools") {
            Some(tools) => tools,
            None if object.is_empty() => return Ok(ToolList::default()),
            None => {
                return Err(ServerError::malformed(
                    "tool list payload has no 'tools' member",
                ))
            }
        },
        other => {
            return Err(ServerError::malformed(format!(
                "tool list payload must be an object or array, got {}",
                other
            )))
        }
    };

    let tools: Vec<ToolInfo> = serde_json::from_value(tools)
        .map_err(|e| ServerError::malformed(format!("invalid tool descriptor: {}", e)))?;
    Ok(ToolList { tools })
}

/// Source of tools the dispatcher can route calls to.
#[async_trait]
pub trait ToolCatalog: Send + Sync {
    /// The current catalog snapshot.
    async fn list_tools(&self) -> Result<ToolList, ServerError>;

    /// Invoke a tool by name.
    async fn call_tool(&self, name: &str, args: ToolArguments) -> Result<Value, ServerError>;
}

/// An in-process tool.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn info(&self) -> ToolInfo;

    async fn call(&self, args: ToolArguments) -> Result<Value, ServerError>;
}

/// A fixed tool set declared at startup.
#[derive(Default, Clone)]
pub struct StaticCatalog {
    tools: Vec<Arc<dyn ToolHandler>>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tool(mut self, tool: Arc<dyn ToolHandler>) -> Self {
        self.tools.push(tool);
        self
    }

    fn find(&self, name: &str) -> Option<&Arc<dyn ToolHandler>> {
        self.tools.iter().find(|t| t.info().name == name)
    }
}

#[async_trait]
impl ToolCatalog for StaticCatalog {
    async fn list_tools(&self) -> Result<ToolList, ServerError> {
        Ok(ToolList {
            tools: self.tools.iter().map(|t| t.info()).collect(),
        })
    }

    async fn call_tool(&self, name: &str, args: ToolArguments) -> Result<Value, ServerError> {
        match self.find(name) {
            Some(tool) => tool.call(args).await,
            None => Err(ServerError::UnknownTool(name.to_string())),
        }
    }
}

/// Tools defined in the database: listed by `<schema>.ToolsList()` and
/// called as procedures `<schema>.<name>`.
#[derive(Clone)]
pub struct DynamicCatalog {
    gateway: Arc<dyn Gateway>,
    schema: String,
}

impl DynamicCatalog {
    pub fn new(gateway: Arc<dyn Gateway>, schema: impl Into<String>) -> Self {
        Self {
            gateway,
            schema: schema.into(),
        }
    }
}

#[async_trait]
impl ToolCatalog for DynamicCatalog {
    async fn list_tools(&self) -> Result<ToolList, ServerError> {
        let function = QualifiedName::new(&self.schema, TOOLS_LIST_FUNCTION)?;
        let cell = self
            .gateway
            .query_scalar(&function, &ToolArguments::new())
            .await?;
        let list = parse_tool_list(decode_json_payload(cell)?)?;
        debug!("Backend advertised {} tools", list.tools.len());
        Ok(list)
    }

    async fn call_tool(&self, name: &str, args: ToolArguments) -> Result<Value, ServerError> {
        let procedure = QualifiedName::new(&self.schema, name)?;
        debug!("Calling {} with {}", procedure, args);
        let cell = self
            .gateway
            .call_procedure(&procedure, &args, ProcedureOutput::FirstColumn)
            .await?;
        decode_json_payload(cell)
    }
}

/// Build the catalog the configuration asks for.
pub fn catalog_from_config(config: &Config, gateway: Arc<dyn Gateway>) -> Arc<dyn ToolCatalog> {
    match config.catalog.mode {
        CatalogMode::Dynamic => Arc::new(DynamicCatalog::new(
            gateway,
            config.catalog.tool_schema.clone(),
        )),
        CatalogMode::ExecutionPlan => {
            Arc::new(StaticCatalog::new().with_tool(Arc::new(ExecutionPlanTool::new(gateway))))
        }
    }
}
