//! Estimated execution plans via `SET SHOWPLAN_XML`.
//!
//! SHOWPLAN is session state. [`with_explain_mode`] brackets the query with
//! the ON/OFF toggles and always attempts the OFF toggle, whatever happened
//! to the query. If the whole future is dropped mid-call, the revert never
//! runs; the session is owned by that call alone and is closed with it, so
//! the mode cannot leak into other work.

use super::auth::RawConnection;
use super::types::TypeMapper;
use crate::error::ServerError;
use async_trait::async_trait;
use tracing::{debug, warn};

const SHOWPLAN_ON: &str = "SET SHOWPLAN_XML ON";
const SHOWPLAN_OFF: &str = "SET SHOWPLAN_XML OFF";

/// The two session operations explain mode needs.
#[async_trait]
pub trait ExplainSession: Send {
    /// Run a batch and discard its output.
    async fn execute_batch(&mut self, sql: &str) -> Result<(), ServerError>;

    /// Run a batch and return the first column of its first row.
    async fn first_text(&mut self, sql: &str) -> Result<Option<String>, ServerError>;
}

#[async_trait]
impl ExplainSession for RawConnection {
    async fn execute_batch(&mut self, sql: &str) -> Result<(), ServerError> {
        self.simple_query(sql).await?.into_results().await?;
        Ok(())
    }

    async fn first_text(&mut self, sql: &str) -> Result<Option<String>, ServerError> {
        let row = self.simple_query(sql).await?.into_row().await?;
        Ok(row.and_then(|r| TypeMapper::extract_column(&r, 0).into_payload()))
    }
}

/// Enter explain mode, fetch the plan for `query`, and leave explain mode.
///
/// A failed revert after a failed query is logged and dropped so the query's
/// own error is the one returned. A failed revert after a successful query is
/// returned, since the session state is then unknown.
pub async fn with_explain_mode<S>(session: &mut S, query: &str) -> Result<Option<String>, ServerError>
where
    S: ExplainSession + ?Sized,
{
    session.execute_batch(SHOWPLAN_ON).await?;
    debug!("Explain mode on");

    let outcome = session.first_text(query).await;
    let revert = session.execute_batch(SHOWPLAN_OFF).await;

    match (outcome, revert) {
        (Ok(plan), Ok(())) => Ok(plan),
        (Ok(_), Err(revert_err)) => Err(revert_err),
        (Err(primary), Ok(())) => Err(primary),
        (Err(primary), Err(revert_err)) => {
            warn!(
                "Suppressed failure leaving explain mode ({}); returning query error",
                revert_err
            );
            Err(primary)
        }
    }
}
