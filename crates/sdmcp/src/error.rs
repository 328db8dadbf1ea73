//! Error taxonomy for tool calls.
//!
//! Handlers return [`ToolError`]; the dispatcher turns it into an
//! [`ErrorEnvelope`] before anything reaches the transport.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// One violated constraint in a tool's arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// JSON pointer to the offending value (`/steps`, `/images/0`).
    pub path: String,
    pub message: String,
}

/// The three ways a call to the WebUI can fail.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("no response: {message}")]
    NoResponse { message: String, timed_out: bool },

    #[error("request failed: {0}")]
    Request(String),
}

impl RemoteError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, RemoteError::NoResponse { timed_out: true, .. })
    }
}

/// Every failure a tool call can end with.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Invalid arguments: {}", join_violations(.violations))]
    Validation { violations: Vec<Violation> },

    #[error("Stable Diffusion WebUI returned HTTP {status}: {body}")]
    RemoteStatus { status: u16, body: String },

    #[error("{message}")]
    RemoteUnreachable {
        message: String,
        model_may_be_loading: bool,
    },

    #[error("Request to Stable Diffusion WebUI failed: {0}")]
    RemoteRequest(String),

    #[error("{0}")]
    EmptyResult(String),

    #[error("No valid images to upscale: {0}")]
    NoValidImages(String),

    #[error("Failed to {action} {path}: {source}")]
    Filesystem {
        action: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Unknown tool: {0}")]
    UnknownTool(String),
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| format!("{}: {}", v.path, v.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<RemoteError> for ToolError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Status { status, body } => ToolError::RemoteStatus { status, body },
            RemoteError::NoResponse { message, .. } => ToolError::RemoteUnreachable {
                message: format!("No response from Stable Diffusion WebUI: {}", message),
                model_may_be_loading: false,
            },
            RemoteError::Request(message) => ToolError::RemoteRequest(message),
        }
    }
}

impl ToolError {
    pub fn filesystem(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ToolError::Filesystem {
            action,
            path: path.into(),
            source,
        }
    }

    pub fn validation(path: impl Into<String>, message: impl Into<String>) -> Self {
        ToolError::Validation {
            violations: vec![Violation {
                path: path.into(),
                message: message.into(),
            }],
        }
    }

    /// Stable machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::Validation { .. } => "validation_error",
            ToolError::RemoteStatus { .. } => "remote_status_error",
            ToolError::RemoteUnreachable { .. } => "remote_unreachable_error",
            ToolError::RemoteRequest(_) => "remote_request_error",
            ToolError::EmptyResult(_) => "empty_result_error",
            ToolError::NoValidImages(_) => "no_valid_images_error",
            ToolError::Filesystem { .. } => "filesystem_error",
            ToolError::UnknownTool(_) => "unknown_tool",
        }
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            kind: self.kind(),
            message: self.to_string(),
            status: match self {
                ToolError::RemoteStatus { status, .. } => Some(*status),
                _ => None,
            },
            model_may_be_loading: match self {
                ToolError::RemoteUnreachable {
                    model_may_be_loading: true,
                    ..
                } => Some(true),
                _ => None,
            },
            violations: match self {
                ToolError::Validation { violations } => violations.clone(),
                _ => Vec::new(),
            },
        }
    }
}

/// The single error shape returned to clients.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub kind: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_may_be_loading: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<Violation>,
}
