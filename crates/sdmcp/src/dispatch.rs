//! Tool call routing.
//!
//! This is the JSON boundary. MCP hands us a tool name and a JSON object;
//! we validate against the tool's schema, deserialize into typed args, run
//! the handler, and render either the result or an error envelope as text.

use anyhow::Result;
use rmcp::model::{CallToolResult, Content, JsonObject, Tool};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, info_span, warn, Instrument};

use crate::error::ToolError;
use crate::service::SdService;
use crate::tools::catalog::SetModelArgs;
use crate::tools::generate::GenerateImageArgs;
use crate::tools::upscale::UpscaleImagesArgs;
use crate::tools_registry::{self as registry, ToolDef};
use crate::validate::Validator;

#[derive(Debug)]
pub struct Dispatcher {
    service: SdService,
    defs: Vec<ToolDef>,
    validator: Validator,
}

fn render<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

impl Dispatcher {
    pub fn new(service: SdService) -> Result<Self> {
        let defs = registry::tool_defs(&service.config().upscale);
        let validator = Validator::new(&defs)?;
        Ok(Self {
            service,
            defs,
            validator,
        })
    }

    pub fn tools(&self) -> Vec<Tool> {
        self.defs.iter().map(ToolDef::to_tool).collect()
    }

    /// Run one tool and return its JSON result as text.
    pub async fn dispatch(&self, name: &str, args: Value) -> Result<String, ToolError> {
        match name {
            registry::GENERATE_IMAGE => {
                let args: GenerateImageArgs = self.validator.parse(name, args)?;
                Ok(render(&self.service.generate_image(args).await?))
            }
            registry::GET_MODELS => {
                self.validator.parse::<Value>(name, args)?;
                Ok(render(&self.service.list_models().await?))
            }
            registry::SET_MODEL => {
                let args: SetModelArgs = self.validator.parse(name, args)?;
                Ok(render(&self.service.set_model(args).await?))
            }
            registry::GET_UPSCALERS => {
                self.validator.parse::<Value>(name, args)?;
                Ok(render(&self.service.list_upscalers().await?))
            }
            registry::GET_SAMPLERS => {
                self.validator.parse::<Value>(name, args)?;
                Ok(render(&self.service.list_samplers().await?))
            }
            registry::GET_LORAS => {
                self.validator.parse::<Value>(name, args)?;
                Ok(render(&self.service.list_loras().await?))
            }
            registry::UPSCALE_IMAGES => {
                let args: UpscaleImagesArgs = self.validator.parse(name, args)?;
                Ok(render(&self.service.upscale_images(args).await?))
            }
            _ => Err(ToolError::UnknownTool(name.to_string())),
        }
    }

    /// Run one tool and fold any failure into an error envelope.
    ///
    /// Always returns a `CallToolResult`; failures set `isError` and carry
    /// the envelope as JSON text.
    pub async fn call(&self, name: &str, arguments: Option<JsonObject>) -> CallToolResult {
        let span = info_span!("tool_call", tool = %name);
        async {
            let args = Value::Object(arguments.unwrap_or_default());
            match self.dispatch(name, args).await {
                Ok(text) => {
                    info!("tool call succeeded");
                    CallToolResult::success(vec![Content::text(text)])
                }
                Err(err) => {
                    warn!(kind = err.kind(), error = %err, "tool call failed");
                    CallToolResult::error(vec![Content::text(render(&err.envelope()))])
                }
            }
        }
        .instrument(span)
        .await
    }
}
