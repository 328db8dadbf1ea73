//! Stdio MCP transport.
//!
//! JSON-RPC over stdin/stdout. Runs until the client closes stdin or the
//! process receives Ctrl-C.

use std::sync::Arc;

use anyhow::{Context, Result};
use rmcp::{service::QuitReason, transport::stdio, ServiceExt};
use tracing::info;

use crate::dispatch::Dispatcher;
use crate::handler::SdHandler;

/// Serve MCP over stdio until EOF or interrupt.
pub async fn run(dispatcher: Arc<Dispatcher>) -> Result<()> {
    let handler = SdHandler::new(dispatcher);

    // Serve via stdio - rmcp handles JSON-RPC framing
    let service = handler
        .serve(stdio())
        .await
        .context("Failed to start stdio MCP service")?;

    info!("Stdio MCP server running");

    let token = service.cancellation_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, closing transport");
            token.cancel();
        }
    });

    let reason = service
        .waiting()
        .await
        .context("Stdio MCP service task failed")?;
    interrupt.abort();

    match reason {
        QuitReason::JoinError(e) => {
            return Err(e).context("Stdio MCP service task failed");
        }
        QuitReason::Cancelled => info!("Stdio MCP server cancelled"),
        QuitReason::Closed => info!("Stdio MCP server closed"),
    }

    info!("Stdio MCP server shutdown");
    Ok(())
}
