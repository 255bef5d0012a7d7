//! Response envelope `{ success, data?, error?, details? }`

use crate::error::FieldError;
use crate::{Result, SyncError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Envelope every API response is wrapped in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T = Value> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            details: None,
        }
    }

    pub fn failure(error: impl Into<String>, details: Option<Value>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            details,
        }
    }
}

/// Turn a status code and decoded body into the caller-facing result.
///
/// Success yields the envelope's `data` (or the whole body when the server
/// did not wrap it). Anything else becomes a structured error.
pub fn interpret(status: u16, body: Value) -> Result<Value> {
    let success_flag = body.get("success").and_then(Value::as_bool);

    if (200..300).contains(&status) {
        return match success_flag {
            Some(false) => Err(server_error(status, &body)),
            Some(true) => Ok(body.get("data").cloned().unwrap_or(Value::Null)),
            None => Ok(body),
        };
    }

    if matches!(status, 400 | 422) {
        if let Some(fields) = body.get("details").and_then(field_errors) {
            return Err(SyncError::Validation {
                status,
                error: error_message(status, &body),
                fields,
            });
        }
    }

    Err(server_error(status, &body))
}

fn server_error(status: u16, body: &Value) -> SyncError {
    SyncError::Server {
        status,
        error: error_message(status, body),
        details: body.get("details").filter(|d| !d.is_null()).cloned(),
    }
}

fn error_message(status: u16, body: &Value) -> String {
    match body.get("error") {
        Some(Value::String(message)) => message.clone(),
        Some(Value::Object(obj)) => obj
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| Value::Object(obj.clone()).to_string()),
        _ => match body {
            Value::String(text) if !text.is_empty() => text.clone(),
            _ => reqwest::StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or("Unknown error")
                .to_string(),
        },
    }
}

/// Extract field-level errors from `details`.
///
/// Accepts `{ "field": "message" | ["messages"] }` or
/// `[{ "field": ..., "message": ... }]`. Returns `None` when nothing is field-shaped.
pub fn field_errors(details: &Value) -> Option<Vec<FieldError>> {
    let fields: Vec<FieldError> = match details {
        Value::Object(map) => map
            .iter()
            .map(|(field, message)| FieldError {
                field: field.clone(),
                message: flatten_message(message),
            })
            .collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| {
                Some(FieldError {
                    field: item.get("field")?.as_str()?.to_string(),
                    message: item.get("message").map(flatten_message).unwrap_or_default(),
                })
            })
            .collect(),
        _ => Vec::new(),
    };

    if fields.is_empty() {
        None
    } else {
        Some(fields)
    }
}

fn flatten_message(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(flatten_message)
            .collect::<Vec<_>>()
            .join("; "),
        other => other.to_string(),
    }
}
