//! Configuration management for the tool gateway.
//!
//! Configuration is loaded from environment variables following the 12-factor app pattern.

use crate::constants::{
    DEFAULT_API_SCHEMA, DEFAULT_COMMAND_TIMEOUT, DEFAULT_COMMAND_TIMEOUT_SECS,
    DEFAULT_CONNECTION_TIMEOUT, DEFAULT_CONNECTION_TIMEOUT_SECS, DEFAULT_MAX_RESULT_ROWS,
    DEFAULT_TOOL_SCHEMA, SERVER_NAME,
};
use crate::error::ServerError;
use crate::security::validate_identifier;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection configuration
    pub database: DatabaseConfig,

    /// Which tool catalog to serve and where its objects live
    pub catalog: CatalogConfig,

    /// Per-call execution limits
    pub query: QueryConfig,
}

/// Database connection configuration.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// SQL Server hostname or IP address
    pub host: String,

    /// SQL Server port (default: 1433)
    pub port: u16,

    /// Initial catalog
    pub database: String,

    /// Authentication configuration
    pub auth: AuthConfig,

    /// Enable TLS encryption
    pub encrypt: bool,

    /// Trust server certificate (for self-signed certs)
    pub trust_server_certificate: bool,

    /// Application name sent to SQL Server
    pub application_name: String,

    /// Bound on TCP connect plus login
    pub connect_timeout: Duration,
}

/// Authentication configuration.
#[derive(Clone)]
pub enum AuthConfig {
    /// SQL Server authentication (username/password)
    SqlServer { username: String, password: String },

    /// Windows authentication (Integrated Security)
    #[cfg(windows)]
    Integrated,
}

impl AuthConfig {
    /// Human-readable authentication kind, safe to expose.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthConfig::SqlServer { .. } => "SqlServer",
            #[cfg(windows)]
            AuthConfig::Integrated => "Integrated",
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthConfig::SqlServer { username, .. } => f
                .debug_struct("SqlServer")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            #[cfg(windows)]
            AuthConfig::Integrated => f.write_str("Integrated"),
        }
    }
}

/// Which tool catalog the dispatcher serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CatalogMode {
    /// Tools are stored procedures listed by a backend function.
    #[default]
    Dynamic,

    /// The fixed execution-plan tool.
    ExecutionPlan,
}

/// Error returned when parsing a catalog mode fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseCatalogModeError(String);

impl fmt::Display for ParseCatalogModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid catalog mode: '{}'", self.0)
    }
}

impl std::error::Error for ParseCatalogModeError {}

impl FromStr for CatalogMode {
    type Err = ParseCatalogModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dynamic" | "procedures" => Ok(CatalogMode::Dynamic),
            "plan" | "explain" | "execution-plan" => Ok(CatalogMode::ExecutionPlan),
            _ => Err(ParseCatalogModeError(s.to_string())),
        }
    }
}

impl fmt::Display for CatalogMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogMode::Dynamic => write!(f, "dynamic"),
            CatalogMode::ExecutionPlan => write!(f, "plan"),
        }
    }
}

/// Catalog configuration.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub mode: CatalogMode,

    /// Schema holding tool procedures and `ToolsList()`
    pub tool_schema: String,

    /// Schema holding REST resources
    pub api_schema: String,
}

/// Query execution configuration.
#[derive(Debug, Clone)]
pub struct QueryConfig {
    /// Upper bound on one backend call
    pub command_timeout: Duration,

    /// Maximum rows materialized from a row set
    pub max_result_rows: usize,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `MSSQL_HOST`: SQL Server hostname (default: localhost)
    /// - `MSSQL_PORT`: Port number (default: 1433)
    /// - `MSSQL_DATABASE`: Database name (default: master)
    /// - `MSSQL_USER` / `MSSQL_PASSWORD`: SQL authentication; when both are
    ///   absent, integrated security is used on Windows
    /// - `MSSQL_ENCRYPT`: Enable TLS (default: true)
    /// - `MSSQL_TRUST_CERT`: Trust server certificate (default: true)
    /// - `MSSQL_CONNECT_TIMEOUT`: Connection timeout in seconds (default: 30)
    /// - `MSSQL_COMMAND_TIMEOUT`: Per-call timeout in seconds (default: 180)
    /// - `MSSQL_MAX_ROWS`: Maximum result rows (default: 10000)
    /// - `MSSQL_CATALOG`: `dynamic` or `plan` (default: dynamic)
    /// - `MSSQL_TOOL_SCHEMA`: Tool schema (default: mcp)
    /// - `MSSQL_API_SCHEMA`: REST resource schema (default: api)
    pub fn from_env() -> Result<Self, ServerError> {
        let host = std::env::var("MSSQL_HOST").unwrap_or_else(|_| "localhost".to_string());

        let port = std::env::var("MSSQL_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(1433);

        let database = std::env::var("MSSQL_DATABASE")
            .ok()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| "master".to_string());

        let username = std::env::var("MSSQL_USER").ok();
        let password = std::env::var("MSSQL_PASSWORD").ok();

        let auth = match (username, password) {
            (Some(u), Some(p)) => AuthConfig::SqlServer {
                username: u,
                password: p,
            },
            (Some(_), None) => {
                return Err(ServerError::config(
                    "MSSQL_PASSWORD is required when MSSQL_USER is set",
                ))
            }
            (None, Some(_)) => {
                return Err(ServerError::config(
                    "MSSQL_USER is required when MSSQL_PASSWORD is set",
                ))
            }
            (None, None) => integrated_auth()?,
        };

        let encrypt = std::env::var("MSSQL_ENCRYPT")
            .map(|v| v.to_lowercase() == "true" || v == "1")
            .unwrap_or(true);

        let trust_server_certificate = std::env::var("MSSQL_TRUST_CERT")
            .map(|v| v.to_lowercase() == "true" || v == "1")
            .unwrap_or(true);

        let connect_timeout_secs = std::env::var("MSSQL_CONNECT_TIMEOUT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_CONNECTION_TIMEOUT_SECS);

        let command_timeout_secs = std::env::var("MSSQL_COMMAND_TIMEOUT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_COMMAND_TIMEOUT_SECS);

        let max_result_rows = std::env::var("MSSQL_MAX_ROWS")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_MAX_RESULT_ROWS);

        let mode = match std::env::var("MSSQL_CATALOG") {
            Ok(raw) => raw
                .parse()
                .map_err(|e: ParseCatalogModeError| ServerError::config(e.to_string()))?,
            Err(_) => CatalogMode::default(),
        };

        let tool_schema = schema_from_env("MSSQL_TOOL_SCHEMA", DEFAULT_TOOL_SCHEMA)?;
        let api_schema = schema_from_env("MSSQL_API_SCHEMA", DEFAULT_API_SCHEMA)?;

        Ok(Config {
            database: DatabaseConfig {
                host,
                port,
                database,
                auth,
                encrypt,
                trust_server_certificate,
                application_name: SERVER_NAME.to_string(),
                connect_timeout: Duration::from_secs(connect_timeout_secs),
            },
            catalog: CatalogConfig {
                mode,
                tool_schema,
                api_schema,
            },
            query: QueryConfig {
                command_timeout: Duration::from_secs(command_timeout_secs),
                max_result_rows,
            },
        })
    }
}

#[cfg(windows)]
fn integrated_auth() -> Result<AuthConfig, ServerError> {
    Ok(AuthConfig::Integrated)
}

#[cfg(not(windows))]
fn integrated_auth() -> Result<AuthConfig, ServerError> {
    Err(ServerError::config(
        "Authentication required: set MSSQL_USER and MSSQL_PASSWORD \
         (integrated security is only available on Windows)",
    ))
}

fn schema_from_env(var: &str, default: &str) -> Result<String, ServerError> {
    let schema = std::env::var(var).unwrap_or_else(|_| default.to_string());
    validate_identifier(&schema)
        .map_err(|e| ServerError::config(format!("{} is not a valid schema name: {}", var, e)))?;
    Ok(schema)
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            mode: CatalogMode::Dynamic,
            tool_schema: DEFAULT_TOOL_SCHEMA.to_string(),
            api_schema: DEFAULT_API_SCHEMA.to_string(),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            max_result_rows: DEFAULT_MAX_RESULT_ROWS,
        }
    }
}

impl DatabaseConfig {
    /// Configuration for a local server with SQL authentication.
    pub fn local(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1433,
            database: "master".to_string(),
            auth: AuthConfig::SqlServer {
                username: username.into(),
                password: password.into(),
            },
            encrypt: false,
            trust_server_certificate: true,
            application_name: SERVER_NAME.to_string(),
            connect_timeout: DEFAULT_CONNECTION_TIMEOUT,
        }
    }

    /// Non-secret view of the connection settings.
    pub fn summary(&self) -> ConnectionSummary {
        ConnectionSummary {
            server: format!("{}:{}", self.host, self.port),
            database: self.database.clone(),
            authentication_type: self.auth.kind(),
            encrypted: self.encrypt,
            trust_server_certificate: self.trust_server_certificate,
        }
    }
}

/// Connection settings safe to report to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSummary {
    pub server: String,
    pub database: String,
    pub authentication_type: &'static str,
    pub encrypted: bool,
    pub trust_server_certificate: bool,
}
