//! JSON-RPC 2.0 framing.

use reelforge_error::{CatalogError, CatalogErrorKind};
use serde::Serialize;
use serde_json::Value;

pub(crate) const PROTOCOL_VERSION: &str = "2024-11-05";

#[derive(Debug, Serialize)]
pub(crate) struct Request<'a> {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
    method: &'a str,
    #[serde(skip_serializing_if = "Value::is_null")]
    params: Value,
}

impl<'a> Request<'a> {
    pub(crate) fn call(id: u64, method: &'a str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id: Some(id),
            method,
            params,
        }
    }

    pub(crate) fn notification(method: &'a str) -> Self {
        Self {
            jsonrpc: "2.0",
            id: None,
            method,
            params: Value::Null,
        }
    }

    /// One line of the wire format, newline included.
    pub(crate) fn to_line(&self) -> Result<String, CatalogError> {
        let mut line = serde_json::to_string(self)
            .map_err(|e| CatalogError::new(CatalogErrorKind::Protocol(e.to_string())))?;
        line.push('\n');
        Ok(line)
    }
}

/// What an incoming line turned out to be.
#[derive(Debug)]
pub(crate) enum Incoming {
    /// Reply to one of our calls
    Response { id: u64, outcome: Result<Value, CatalogError> },
    /// Server-to-client request we do not serve
    Request { id: Value, method: String },
    /// Notification or anything else without an id
    Other,
}

pub(crate) fn classify(line: &str) -> Result<Incoming, CatalogError> {
    let message: Value = serde_json::from_str(line).map_err(|e| {
        CatalogError::new(CatalogErrorKind::Protocol(format!("invalid JSON from catalog: {}", e)))
    })?;

    let id = message.get("id").filter(|id| !id.is_null()).cloned();
    if let Some(method) = message.get("method").and_then(Value::as_str) {
        return Ok(match id {
            Some(id) => Incoming::Request {
                id,
                method: method.to_string(),
            },
            None => Incoming::Other,
        });
    }
    let Some(id) = id.as_ref().and_then(Value::as_u64) else {
        return Ok(Incoming::Other);
    };

    let outcome = match message.get("error") {
        Some(error) => Err(CatalogError::new(CatalogErrorKind::Rpc {
            code: error.get("code").and_then(Value::as_i64).unwrap_or(-32603),
            message: error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string(),
        })),
        None => Ok(message.get("result").cloned().unwrap_or(Value::Null)),
    };
    Ok(Incoming::Response { id, outcome })
}

pub(crate) fn method_not_found(id: Value) -> Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": -32601, "message": "method not found" }
    })
}
