//! JSON-RPC 2.0 envelope types.
//!
//! A request whose `id` is absent or `null` is a notification. A response
//! always carries exactly one of `result` or `error`; [`Outcome`] makes the
//! other combinations unrepresentable.

use crate::constants::JSONRPC_VERSION;
use crate::error::ServerError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// An incoming request or notification.
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    /// Informational only.
    #[serde(default)]
    pub jsonrpc: Option<String>,

    pub method: String,

    #[serde(default)]
    pub params: Option<Value>,

    /// `None` for both an absent and a `null` id.
    #[serde(default)]
    pub id: Option<Value>,
}

impl Request {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// Structured error member of a response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl From<&ServerError> for RpcError {
    fn from(err: &ServerError) -> Self {
        let category = err.category();
        let mut data = json!({ "category": category.as_str() });
        if let Some(suggestion) = err.suggestion() {
            data["suggestion"] = Value::from(suggestion);
        }

        Self {
            code: category.code(),
            message: err.wire_message(),
            data: Some(data),
        }
    }
}

/// Either a result or an error, never both.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Result(Value),
    Error(RpcError),
}

/// A response to one non-notification request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl Response {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            outcome: Outcome::Result(result),
        }
    }

    pub fn failure(id: Value, err: &ServerError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            outcome: Outcome::Error(RpcError::from(err)),
        }
    }

    pub fn from_result(id: Value, result: Result<Value, ServerError>) -> Self {
        match result {
            Ok(value) => Self::success(id, value),
            Err(err) => Self::failure(id, &err),
        }
    }

    pub fn result(&self) -> Option<&Value> {
        match &self.outcome {
            Outcome::Result(value) => Some(value),
            Outcome::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&RpcError> {
        match &self.outcome {
            Outcome::Result(_) => None,
            Outcome::Error(err) => Some(err),
        }
    }
}
