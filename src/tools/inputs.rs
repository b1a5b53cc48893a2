//! Tool input types with JSON Schema generation.

use schemars::JsonSchema;
use serde::Deserialize;

/// Input for the `ShowEstimatedExecutionPlan` tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExplainPlanInput {
    /// The SQL query to explain.
    #[schemars(description = "SQL query to analyze. It is compiled, not executed.")]
    pub query: String,
}
