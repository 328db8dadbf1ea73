//! The tool catalog published over MCP.

use std::sync::Arc;

use rmcp::model::Tool;
use sdconf::UpscaleDefaults;
use serde_json::Value;

use crate::schemas;

pub const GENERATE_IMAGE: &str = "generate_sd_image";
pub const GET_MODELS: &str = "get_sd_models";
pub const SET_MODEL: &str = "set_sd_model";
pub const GET_UPSCALERS: &str = "get_sd_upscalers";
pub const GET_SAMPLERS: &str = "get_sd_samplers";
pub const GET_LORAS: &str = "get_sd_loras";
pub const UPSCALE_IMAGES: &str = "upscale_sd_images";

/// Name, description and input schema of one tool.
#[derive(Debug, Clone)]
pub struct ToolDef {
    pub name: &'static str,
    pub description: &'static str,
    pub schema: Value,
}

impl ToolDef {
    pub fn to_tool(&self) -> Tool {
        let schema = match &self.schema {
            Value::Object(map) => map.clone(),
            _ => serde_json::Map::new(),
        };
        Tool::new(self.name, self.description, Arc::new(schema))
    }
}

/// All tools, in listing order.
pub fn tool_defs(upscale: &UpscaleDefaults) -> Vec<ToolDef> {
    vec![
        ToolDef {
            name: GENERATE_IMAGE,
            description: "Generate images from a text prompt with Stable Diffusion. \
                Returns the saved file path, public URL (if upload is configured) and \
                generation parameters for every image.",
            schema: schemas::generate_image_schema(),
        },
        ToolDef {
            name: GET_MODELS,
            description: "List available Stable Diffusion checkpoint titles",
            schema: schemas::empty_schema(),
        },
        ToolDef {
            name: SET_MODEL,
            description: "Set the active Stable Diffusion checkpoint. Loading can take minutes.",
            schema: schemas::set_model_schema(),
        },
        ToolDef {
            name: GET_UPSCALERS,
            description: "List available upscaler names",
            schema: schemas::empty_schema(),
        },
        ToolDef {
            name: GET_SAMPLERS,
            description: "List available sampler names",
            schema: schemas::empty_schema(),
        },
        ToolDef {
            name: GET_LORAS,
            description: "List available LoRA models with their metadata",
            schema: schemas::empty_schema(),
        },
        ToolDef {
            name: UPSCALE_IMAGES,
            description: "Upscale one or more images (local paths or http(s) URLs) with the \
                WebUI extras upscalers. Face restoration is always disabled.",
            schema: schemas::upscale_images_schema(upscale),
        },
    ]
}
