//! MSSQL Tool Gateway entry point.
//!
//! Serves line-delimited JSON-RPC on stdio by default; set
//! `MSSQL_TRANSPORT=http` for the REST facade.

use anyhow::Result;
use mssql_tool_gateway::catalog::catalog_from_config;
use mssql_tool_gateway::database::{Gateway, SqlServerGateway};
use mssql_tool_gateway::shutdown::{install_signal_handlers, new_shutdown_controller};
use mssql_tool_gateway::transport::{stdio, TransportConfig, TransportType};
use mssql_tool_gateway::{Config, Dispatcher};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging to stderr (stdout is reserved for JSON-RPC)
    init_logging();

    let version = env!("CARGO_PKG_VERSION");
    eprintln!("MSSQL Tool Gateway v{version} starting...");

    std::panic::set_hook(Box::new(|info| {
        eprintln!("[PANIC] {}", info);
    }));

    let config = Config::from_env()?;
    let transport = TransportConfig::from_env()?;
    eprintln!(
        "Catalog: {}, transport: {}, server: {}:{}",
        config.catalog.mode, transport.transport_type, config.database.host, config.database.port
    );

    let shutdown_controller = new_shutdown_controller();
    install_signal_handlers(shutdown_controller.clone()).await;

    let gateway: Arc<dyn Gateway> = Arc::new(SqlServerGateway::new(
        config.database.clone(),
        config.query.clone(),
    ));
    let catalog = catalog_from_config(&config, gateway.clone());
    let dispatcher = Dispatcher::new(catalog);

    match transport.transport_type {
        TransportType::Stdio => {
            eprintln!("Ready to accept requests on stdin...");
            stdio::serve_stdio(&dispatcher, Some(shutdown_controller.signal())).await?;
        }
        #[cfg(feature = "http")]
        TransportType::Http => {
            use mssql_tool_gateway::resources::ResourceApi;
            use mssql_tool_gateway::transport::http::{start_http_server_with_shutdown, AppState};

            let resources = ResourceApi::new(gateway.clone(), config.catalog.api_schema.clone());
            let state = AppState::new(dispatcher, resources, gateway, config.database.summary());
            start_http_server_with_shutdown(state, transport.http, Some(shutdown_controller))
                .await?;
        }
    }

    eprintln!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing subscriber with stderr output.
///
/// Logs MUST go to stderr because stdout is used for JSON-RPC communication.
fn init_logging() {
    let filter = std::env::var("RUST_LOG")
        .map(EnvFilter::new)
        .unwrap_or_else(|_| EnvFilter::new("warn,mssql_tool_gateway=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}
