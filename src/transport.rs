//! Transport layer.
//!
//! Supports two transport mechanisms:
//! - stdio: line-delimited JSON-RPC on standard input/output (default)
//! - http: REST facade over the same dispatcher
//!
//! The HTTP transport is optional and requires the `http` feature flag.

#[cfg(feature = "http")]
pub mod http;
pub mod stdio;

/// Transport configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Transport type to use.
    pub transport_type: TransportType,

    /// HTTP server configuration (only used for HTTP transport).
    #[cfg(feature = "http")]
    pub http: http::HttpConfig,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            transport_type: TransportType::Stdio,
            #[cfg(feature = "http")]
            http: http::HttpConfig::default(),
        }
    }
}

impl TransportConfig {
    /// Read `MSSQL_TRANSPORT` and, for HTTP, the `MSSQL_HTTP_*` variables.
    pub fn from_env() -> Result<Self, ParseTransportTypeError> {
        let transport_type = match std::env::var("MSSQL_TRANSPORT") {
            Ok(raw) if !raw.trim().is_empty() => raw.trim().parse()?,
            _ => TransportType::Stdio,
        };

        Ok(Self {
            transport_type,
            #[cfg(feature = "http")]
            http: http::HttpConfig::from_env(),
        })
    }
}

/// Available transport types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportType {
    /// Standard input/output transport (default).
    Stdio,

    /// REST facade over HTTP.
    #[cfg(feature = "http")]
    Http,
}

/// Error returned when parsing a transport type fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTransportTypeError(String);

impl std::fmt::Display for ParseTransportTypeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid transport type: '{}'", self.0)
    }
}

impl std::error::Error for ParseTransportTypeError {}

impl std::str::FromStr for TransportType {
    type Err = ParseTransportTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stdio" | "standard" | "io" => Ok(TransportType::Stdio),
            #[cfg(feature = "http")]
            "http" | "rest" | "web" => Ok(TransportType::Http),
            _ => Err(ParseTransportTypeError(s.to_string())),
        }
    }
}

impl std::fmt::Display for TransportType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportType::Stdio => write!(f, "stdio"),
            #[cfg(feature = "http")]
            TransportType::Http => write!(f, "http"),
        }
    }
}
