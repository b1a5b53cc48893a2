//! Connection setup for SQL Server.
//!
//! Supports SQL Server authentication (username/password) everywhere and
//! integrated security on Windows.

use crate::config::{AuthConfig, DatabaseConfig};
use crate::error::ServerError;
use tiberius::{AuthMethod, Client, Config, EncryptionLevel};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::debug;

/// Type alias for a raw tiberius connection.
pub type RawConnection = Client<Compat<TcpStream>>;

/// Configure the tiberius authentication method.
pub fn configure_auth(config: &mut Config, auth: &AuthConfig) {
    match auth {
        AuthConfig::SqlServer { username, password } => {
            config.authentication(AuthMethod::sql_server(username, password));
        }
        #[cfg(windows)]
        AuthConfig::Integrated => {
            config.authentication(AuthMethod::Integrated);
        }
    }
}

/// Create a tiberius Config from DatabaseConfig, including authentication.
pub fn create_config(db_config: &DatabaseConfig) -> Config {
    let mut config = Config::new();

    config.host(&db_config.host);
    config.port(db_config.port);
    config.database(&db_config.database);

    if db_config.encrypt {
        config.encryption(EncryptionLevel::Required);
    } else {
        config.encryption(EncryptionLevel::Off);
    }

    if db_config.trust_server_certificate {
        config.trust_cert();
    }

    config.application_name(&db_config.application_name);
    configure_auth(&mut config, &db_config.auth);

    config
}

/// Open a fresh connection: TCP connect, then TDS login.
///
/// Both steps together are bounded by `connect_timeout`.
pub async fn create_connection(db_config: &DatabaseConfig) -> Result<RawConnection, ServerError> {
    let timeout = db_config.connect_timeout;

    match tokio::time::timeout(timeout, connect(db_config)).await {
        Ok(result) => result,
        Err(_) => Err(ServerError::connection(format!(
            "Timed out after {} seconds connecting to {}:{}",
            timeout.as_secs(),
            db_config.host,
            db_config.port
        ))),
    }
}

async fn connect(db_config: &DatabaseConfig) -> Result<RawConnection, ServerError> {
    let config = create_config(db_config);

    let address = format!("{}:{}", db_config.host, db_config.port);
    debug!("Creating connection to {}", address);

    let tcp = TcpStream::connect(&address).await.map_err(|e| {
        ServerError::connection_with_source(format!("Failed to connect to {}", address), e)
    })?;

    tcp.set_nodelay(true)
        .map_err(|e| ServerError::connection(format!("Failed to set TCP_NODELAY: {}", e)))?;

    // Login errors carry SQL Server error numbers; keep their mapping.
    let client = Client::connect(config, tcp.compat_write())
        .await
        .map_err(ServerError::from)?;

    debug!("Connection established");
    Ok(client)
}

/// Truncate a string for logging, respecting character boundaries.
pub fn truncate_for_log(s: &str, max_len: usize) -> String {
    match s.char_indices().nth(max_len) {
        None => s.to_string(),
        Some((idx, _)) => format!("{}...", &s[..idx]),
    }
}
