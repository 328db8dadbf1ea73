//! Model, upscaler, sampler and LoRA listings, plus checkpoint switching.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::{RemoteError, ToolError};
use crate::sdapi::{self, timeout_from_ms};
use crate::service::SdService;

#[derive(Debug, Clone, Deserialize)]
pub struct SetModelArgs {
    pub model_name: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SetModelResult {
    pub success: bool,
    pub model: String,
}

/// Entries are projected to a single string field. Anything missing or
/// blank is dropped instead of surfacing as null.
#[derive(Debug, Deserialize)]
struct Named {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

impl SdService {
    /// Checkpoint titles, usable as `model_name` for `set_sd_model`.
    pub async fn list_models(&self) -> Result<Vec<String>, ToolError> {
        let entries: Vec<Named> = self.api.get_json(sdapi::SD_MODELS).await?;
        Ok(entries.into_iter().filter_map(|e| non_blank(e.title)).collect())
    }

    pub async fn list_upscalers(&self) -> Result<Vec<String>, ToolError> {
        let entries: Vec<Named> = self.api.get_json(sdapi::UPSCALERS).await?;
        Ok(entries.into_iter().filter_map(|e| non_blank(e.name)).collect())
    }

    pub async fn list_samplers(&self) -> Result<Vec<String>, ToolError> {
        let entries: Vec<Named> = self.api.get_json(sdapi::SAMPLERS).await?;
        Ok(entries.into_iter().filter_map(|e| non_blank(e.name)).collect())
    }

    /// Full LoRA entries as the WebUI reports them.
    pub async fn list_loras(&self) -> Result<Vec<Value>, ToolError> {
        let body: Value = self.api.get_json(sdapi::LORAS).await?;
        match body {
            Value::Array(items) => Ok(items),
            other => {
                warn!(body = %other, "loras response is not a list, returning none");
                Ok(Vec::new())
            }
        }
    }

    /// Switch the active checkpoint. Uses the longer model-switch timeout
    /// (0 waits indefinitely); a timeout here usually means the WebUI is
    /// still loading the model.
    pub async fn set_model(&self, args: SetModelArgs) -> Result<SetModelResult, ToolError> {
        let timeout = timeout_from_ms(self.config.webui.model_switch_timeout_ms);
        info!(model = %args.model_name, ?timeout, "switching checkpoint");

        let body = json!({ "sd_model_checkpoint": args.model_name });
        match self.api.post(sdapi::OPTIONS, &body, timeout).await {
            Ok(_) => {
                info!(model = %args.model_name, "checkpoint switched");
                Ok(SetModelResult {
                    success: true,
                    model: args.model_name,
                })
            }
            Err(e) if e.is_timeout() => Err(ToolError::RemoteUnreachable {
                message: "Request timed out while setting model. The model might still be loading in the background.".to_string(),
                model_may_be_loading: true,
            }),
            Err(RemoteError::NoResponse { message, .. }) => Err(ToolError::RemoteUnreachable {
                message: format!("No response from Stable Diffusion WebUI while setting model: {}", message),
                model_may_be_loading: false,
            }),
            Err(e) => Err(e.into()),
        }
    }
}
