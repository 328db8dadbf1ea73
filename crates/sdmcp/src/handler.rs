//! rmcp `ServerHandler` for sdmcp.
//!
//! Thin adapter: tool listing and calls go straight to the [`Dispatcher`].

use std::sync::Arc;

use rmcp::{
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult,
        PaginatedRequestParam, ServerCapabilities, ServerInfo,
    },
    service::RequestContext,
    ErrorData as McpError, RoleServer, ServerHandler,
};
use tracing::debug;

use crate::dispatch::Dispatcher;

const INSTRUCTIONS: &str = "Stable Diffusion WebUI tools.\n\n\
    - generate_sd_image: text-to-image; returns saved paths, optional public URLs and parameters\n\
    - upscale_sd_images: upscale local files or http(s) URLs\n\
    - get_sd_models / set_sd_model: list and switch checkpoints (switching can take minutes)\n\
    - get_sd_samplers, get_sd_upscalers, get_sd_loras: discover valid option values\n\n\
    Failures return a JSON object with `kind` and `message`.";

#[derive(Clone)]
pub struct SdHandler {
    dispatcher: Arc<Dispatcher>,
}

impl SdHandler {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }
}

impl ServerHandler for SdHandler {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "sdmcp".to_string(),
                title: Some("Stable Diffusion WebUI MCP".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: None,
            },
            instructions: Some(INSTRUCTIONS.to_string()),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        let tools = self.dispatcher.tools();
        debug!(count = tools.len(), "listing tools");
        Ok(ListToolsResult::with_all_items(tools))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        Ok(self
            .dispatcher
            .call(&request.name, request.arguments)
            .await)
    }
}
