//! sdmcp - Stable Diffusion WebUI tools over MCP
//!
//! This library provides:
//! - `dispatch`: tool routing, validation and error envelopes (JSON boundary)
//! - `handler`: rmcp `ServerHandler` implementation
//! - `stdio`: MCP stdio transport
//! - `tools`: the tool handlers (generate, upscale, catalog)
//! - `sdapi`: WebUI HTTP client
//! - `upload`: optional image host
//! - `files`, `metadata`: output files and PNG parameter embedding

pub mod dispatch;
pub mod error;
pub mod files;
pub mod handler;
pub mod metadata;
pub mod schemas;
pub mod sdapi;
pub mod service;
pub mod stdio;
pub mod telemetry;
pub mod tools;
pub mod tools_registry;
pub mod upload;
pub mod validate;

pub use dispatch::Dispatcher;
pub use error::{ErrorEnvelope, RemoteError, ToolError, Violation};
pub use service::SdService;
pub use tools::ResultEntry;
