//! JSON-RPC protocol types for the geometry server

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::GeoError;

/// JSON-RPC Request format
#[derive(Debug, Deserialize)]
pub struct Request {
    pub id: Option<serde_json::Value>,
    pub method: String,
    pub params: Option<serde_json::Value>,
}

/// JSON-RPC Response format
#[derive(Debug, Serialize)]
pub struct Response {
    pub id: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorResponse>,
}

/// JSON-RPC Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: i32,
    pub message: String,
}

impl Response {
    /// Create a success response with a JSON value
    pub fn success(id: Option<serde_json::Value>, result: serde_json::Value) -> Self {
        Response {
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response
    pub fn error(id: Option<serde_json::Value>, code: i32, message: String) -> Self {
        Response {
            id,
            result: None,
            error: Some(ErrorResponse { code, message }),
        }
    }

    /// Turn a handler outcome into a response, picking the error code from the error chain
    pub fn from_result(id: Option<serde_json::Value>, result: anyhow::Result<serde_json::Value>) -> Self {
        match result {
            Ok(value) => Response::success(id, value),
            Err(err) => Response::error(id, error_code(&err), format!("{:#}", err)),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Standard JSON-RPC error codes
pub mod error_codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;

    // Custom error codes
    pub const NO_LAYOUT_LOADED: i32 = 2;
    pub const LAYER_NOT_FOUND: i32 = 3;
    pub const LOAD_FAILED: i32 = 4;
    pub const INVALID_ARGUMENT: i32 = 5;
    pub const OPERAND_MISMATCH: i32 = 6;
}

/// Request-level failures that are not geometry errors
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid params: expected {0}")]
    InvalidParams(String),
    #[error("No layout loaded. Call Load first.")]
    NoLayoutLoaded,
    #[error("Method not found: {0}")]
    MethodNotFound(String),
}

/// Maps an error chain to the numeric code reported to the client
pub fn error_code(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<ServerError>() {
            return match e {
                ServerError::InvalidParams(_) => error_codes::INVALID_PARAMS,
                ServerError::NoLayoutLoaded => error_codes::NO_LAYOUT_LOADED,
                ServerError::MethodNotFound(_) => error_codes::METHOD_NOT_FOUND,
            };
        }
        if let Some(e) = cause.downcast_ref::<GeoError>() {
            return match e {
                GeoError::UnknownLayer(_) | GeoError::UnknownCell(_) => error_codes::LAYER_NOT_FOUND,
                GeoError::NegativeGrid(_) | GeoError::InvalidDistance(_) | GeoError::MissingOperand(_) => {
                    error_codes::INVALID_ARGUMENT
                }
                GeoError::DbuMismatch(..) | GeoError::LayoutMismatch(_) => error_codes::OPERAND_MISMATCH,
                GeoError::Document(_) | GeoError::Io(_) | GeoError::CycleDetected(_) | GeoError::InvalidCellIndex(_) => {
                    error_codes::LOAD_FAILED
                }
            };
        }
    }
    error_codes::INTERNAL_ERROR
}

/// Decode request params, reporting the expected shape on failure
pub fn parse_params<T: DeserializeOwned>(params: Option<serde_json::Value>, expected: &str) -> anyhow::Result<T> {
    let value = params.unwrap_or(serde_json::Value::Null);
    serde_json::from_value(value).map_err(|e| {
        log::debug!("[Server] Params rejected: {}", e);
        ServerError::InvalidParams(expected.to_string()).into()
    })
}
