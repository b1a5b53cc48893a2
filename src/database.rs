//! Database connectivity and backend calls.

pub mod auth;
pub mod explain;
mod gateway;
mod rows;
pub mod types;

pub use explain::{with_explain_mode, ExplainSession};
pub use gateway::{
    procedure_sql, scalar_sql, set_returning_sql, Gateway, ProcedureOutput, SqlServerGateway,
};
pub use rows::RowSet;
pub use types::{SqlValue, TypeMapper};
