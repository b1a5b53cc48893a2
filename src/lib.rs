//! # MSSQL Tool Gateway
//!
//! Exposes SQL Server procedures and functions as callable tools over
//! line-delimited JSON-RPC on stdio, and as a REST facade over HTTP.
//!
//! ## Architecture
//!
//! Transport → [`Dispatcher`] → [`catalog::ToolCatalog`] →
//! [`database::Gateway`]. Arguments pass through [`coercion`] on the way in
//! and backend payloads on the way out.
//!
//! Two catalogs are available:
//! - dynamic: tools are listed by `mcp.ToolsList()` and called as procedures
//! - execution plan: a single `ShowEstimatedExecutionPlan` tool

pub mod catalog;
pub mod coercion;
pub mod config;
pub mod constants;
pub mod database;
pub mod dispatcher;
pub mod error;
pub mod protocol;
pub mod resources;
pub mod security;
pub mod shutdown;
pub mod telemetry;
pub mod tools;
pub mod transport;

pub use config::Config;
pub use dispatcher::Dispatcher;
pub use error::ServerError;
