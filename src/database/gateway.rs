//! Backend gateway: the four call shapes the dispatcher needs.
//!
//! [`SqlServerGateway`] opens a new connection for every call and drops it
//! before returning, so calls share no session state and the gateway can be
//! used from many tasks at once. Each call, connection included, is bounded
//! by the configured command timeout.

use super::auth::{create_connection, truncate_for_log};
use super::explain::with_explain_mode;
use super::rows::{collect_first_cells, collect_rows, RowSet};
use crate::coercion::ToolArguments;
use crate::config::{DatabaseConfig, QueryConfig};
use crate::constants::LOG_QUERY_TRUNCATE_LENGTH;
use crate::error::ServerError;
use crate::security::QualifiedName;
use async_trait::async_trait;
use std::future::Future;
use std::time::{Duration, Instant};
use tiberius::ToSql;
use tracing::debug;

/// Where a procedure's result payload comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcedureOutput {
    /// First column of the first row the procedure selects.
    FirstColumn,
    /// An `NVARCHAR(MAX) OUTPUT` parameter with this name.
    OutputParameter(String),
}

/// Backend operations, independent of how connections are obtained.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Set-returning function call: `SELECT * FROM f(args...)`.
    async fn query_rows(
        &self,
        function: &QualifiedName,
        args: &ToolArguments,
    ) -> Result<RowSet, ServerError>;

    /// Scalar function call: `SELECT f(args...)`.
    async fn query_scalar(
        &self,
        function: &QualifiedName,
        args: &ToolArguments,
    ) -> Result<Option<String>, ServerError>;

    /// Procedure call with named arguments, returning its text payload.
    async fn call_procedure(
        &self,
        procedure: &QualifiedName,
        args: &ToolArguments,
        output: ProcedureOutput,
    ) -> Result<Option<String>, ServerError>;

    /// Estimated plan for arbitrary query text.
    async fn explain(&self, query: &str) -> Result<Option<String>, ServerError>;

    /// Open a connection and run a trivial query.
    async fn ping(&self) -> Result<(), ServerError>;
}

/// Text of a set-returning call. Arguments bind positionally.
pub fn set_returning_sql(function: &QualifiedName, args: &ToolArguments) -> String {
    format!("SELECT * FROM {}({})", function, positional_list(args))
}

/// Text of a scalar call. Arguments bind positionally.
pub fn scalar_sql(function: &QualifiedName, args: &ToolArguments) -> String {
    format!("SELECT {}({})", function, positional_list(args))
}

/// Text of a procedure call. Arguments bind by name.
pub fn procedure_sql(
    procedure: &QualifiedName,
    args: &ToolArguments,
    output: &ProcedureOutput,
) -> Result<String, ServerError> {
    let mut assignments: Vec<String> = args
        .iter()
        .enumerate()
        .map(|(i, p)| format!("@{} = @P{}", p.name, i + 1))
        .collect();

    match output {
        ProcedureOutput::FirstColumn => Ok(join_exec(procedure, &assignments)),
        ProcedureOutput::OutputParameter(name) => {
            if args.get(name).is_some() {
                return Err(ServerError::invalid_input(format!(
                    "Argument '{}' is reserved for the procedure response",
                    name
                )));
            }
            assignments.push(format!("@{0} = @{0} OUTPUT", name));
            Ok(format!(
                "DECLARE @{0} NVARCHAR(MAX); {1}; SELECT @{0} AS [{0}];",
                name,
                join_exec(procedure, &assignments)
            ))
        }
    }
}

fn join_exec(procedure: &QualifiedName, assignments: &[String]) -> String {
    if assignments.is_empty() {
        format!("EXEC {}", procedure)
    } else {
        format!("EXEC {} {}", procedure, assignments.join(", "))
    }
}

fn positional_list(args: &ToolArguments) -> String {
    (1..=args.len())
        .map(|i| format!("@P{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

fn bind_list(args: &ToolArguments) -> Vec<&dyn ToSql> {
    args.iter().map(|p| &p.value as &dyn ToSql).collect()
}

/// Gateway over a live SQL Server.
#[derive(Debug, Clone)]
pub struct SqlServerGateway {
    database: DatabaseConfig,
    query: QueryConfig,
}

impl SqlServerGateway {
    pub fn new(database: DatabaseConfig, query: QueryConfig) -> Self {
        Self { database, query }
    }

    pub fn command_timeout(&self) -> Duration {
        self.query.command_timeout
    }

    async fn bounded<T, F>(&self, sql: &str, call: F) -> Result<T, ServerError>
    where
        F: Future<Output = Result<T, ServerError>> + Send,
    {
        let start = Instant::now();
        debug!("Executing: {}", truncate_for_log(sql, LOG_QUERY_TRUNCATE_LENGTH));

        let result = match tokio::time::timeout(self.query.command_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ServerError::timeout(self.query.command_timeout.as_secs())),
        };

        debug!(
            "Completed in {} ms ({})",
            start.elapsed().as_millis(),
            if result.is_ok() { "ok" } else { "failed" }
        );
        result
    }

    async fn first_cells(
        &self,
        sql: &str,
        args: &ToolArguments,
    ) -> Result<Vec<Option<String>>, ServerError> {
        self.bounded(sql, async {
            let mut conn = create_connection(&self.database).await?;
            let params = bind_list(args);
            let stream = conn.query(sql, &params).await?;
            collect_first_cells(stream).await
        })
        .await
    }
}

#[async_trait]
impl Gateway for SqlServerGateway {
    async fn query_rows(
        &self,
        function: &QualifiedName,
        args: &ToolArguments,
    ) -> Result<RowSet, ServerError> {
        let sql = set_returning_sql(function, args);
        let max_rows = self.query.max_result_rows;

        self.bounded(&sql, async {
            let mut conn = create_connection(&self.database).await?;
            let params = bind_list(args);
            let stream = conn.query(sql.as_str(), &params).await?;
            collect_rows(stream, max_rows).await
        })
        .await
    }

    async fn query_scalar(
        &self,
        function: &QualifiedName,
        args: &ToolArguments,
    ) -> Result<Option<String>, ServerError> {
        let sql = scalar_sql(function, args);
        let cells = self.first_cells(&sql, args).await?;
        Ok(cells.into_iter().next().flatten())
    }

    async fn call_procedure(
        &self,
        procedure: &QualifiedName,
        args: &ToolArguments,
        output: ProcedureOutput,
    ) -> Result<Option<String>, ServerError> {
        let sql = procedure_sql(procedure, args, &output)?;
        let cells = self.first_cells(&sql, args).await?;

        // The output parameter is selected last, after anything the
        // procedure itself returned.
        let payload = match output {
            ProcedureOutput::FirstColumn => cells.into_iter().next(),
            ProcedureOutput::OutputParameter(_) => cells.into_iter().last(),
        };
        Ok(payload.flatten())
    }

    async fn explain(&self, query: &str) -> Result<Option<String>, ServerError> {
        self.bounded(query, async {
            let mut conn = create_connection(&self.database).await?;
            with_explain_mode(&mut conn, query).await
        })
        .await
    }

    async fn ping(&self) -> Result<(), ServerError> {
        self.bounded("SELECT 1", async {
            let mut conn = create_connection(&self.database).await?;
            conn.simple_query("SELECT 1").await?.into_results().await?;
            Ok(())
        })
        .await
    }
}
