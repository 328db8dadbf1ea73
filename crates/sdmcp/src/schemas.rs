//! Input schemas for every tool.
//!
//! Hand-written JSON Schema (draft 7). The same objects are published in
//! `tools/list` and compiled by the validator, so they cannot drift apart.

use sdconf::UpscaleDefaults;
use serde_json::{json, Value};

use crate::tools::generate::DEFAULT_NEGATIVE_PROMPT;

// ============================================================================
// Generation
// ============================================================================

pub fn generate_image_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "prompt": {
                "type": "string",
                "minLength": 1,
                "description": "The prompt describing the desired image"
            },
            "negative_prompt": {
                "type": "string",
                "description": format!(
                    "Things to exclude from the image. Omit to use the default list ({}); pass an empty string for none",
                    DEFAULT_NEGATIVE_PROMPT
                )
            },
            "steps": {
                "type": "integer",
                "minimum": 1,
                "maximum": 150,
                "description": "Number of sampling steps (default: 20)"
            },
            "width": {
                "type": "integer",
                "minimum": 512,
                "maximum": 2048,
                "description": "Image width in pixels (default: 1024)"
            },
            "height": {
                "type": "integer",
                "minimum": 512,
                "maximum": 2048,
                "description": "Image height in pixels (default: 1024)"
            },
            "cfg_scale": {
                "type": "number",
                "minimum": 1,
                "maximum": 30,
                "description": "CFG scale (default: 3.5)"
            },
            "sampler_name": {
                "type": "string",
                "description": "Sampler name (default: Euler a)"
            },
            "scheduler_name": {
                "type": "string",
                "description": "Scheduler name (default: Automatic)"
            },
            "seed": {
                "type": "integer",
                "minimum": -1,
                "description": "Random seed, -1 lets the server pick (default: -1)"
            },
            "batch_size": {
                "type": "integer",
                "minimum": 1,
                "maximum": 4,
                "description": "Number of images to generate (default: 1)"
            },
            "restore_faces": {
                "type": "boolean",
                "description": "Enable face restoration (default: false)"
            },
            "tiling": {
                "type": "boolean",
                "description": "Generate tileable images (default: false)"
            },
            "distilled_cfg_scale": {
                "type": "number",
                "minimum": 1,
                "maximum": 30,
                "description": "Distilled CFG scale for Flux models (default: 3.5)"
            },
            "output_path": {
                "type": "string",
                "description": "Directory to save images in (default: configured output directory)"
            }
        },
        "required": ["prompt"]
    })
}

// ============================================================================
// Catalog and model selection
// ============================================================================

pub fn empty_schema() -> Value {
    json!({
        "type": "object",
        "properties": {}
    })
}

pub fn set_model_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "model_name": {
                "type": "string",
                "minLength": 1,
                "description": "Checkpoint title as returned by get_sd_models"
            }
        },
        "required": ["model_name"]
    })
}

// ============================================================================
// Upscaling
// ============================================================================

pub fn upscale_images_schema(defaults: &UpscaleDefaults) -> Value {
    json!({
        "type": "object",
        "properties": {
            "images": {
                "type": "array",
                "minItems": 1,
                "items": { "type": "string", "minLength": 1 },
                "description": "Local file paths or http(s) URLs of images to upscale"
            },
            "resize_mode": {
                "type": "integer",
                "enum": [0, 1],
                "description": format!(
                    "0 = scale by multiplier, 1 = scale to width/height (default: {})",
                    defaults.resize_mode
                )
            },
            "upscaling_resize": {
                "type": "number",
                "minimum": 1,
                "description": format!("Upscale multiplier for mode 0 (default: {})", defaults.multiplier)
            },
            "upscaling_resize_w": {
                "type": "integer",
                "minimum": 1,
                "description": format!("Target width for mode 1 (default: {})", defaults.width)
            },
            "upscaling_resize_h": {
                "type": "integer",
                "minimum": 1,
                "description": format!("Target height for mode 1 (default: {})", defaults.height)
            },
            "upscaler_1": {
                "type": "string",
                "description": format!("Primary upscaler (default: {})", defaults.upscaler_1)
            },
            "upscaler_2": {
                "type": "string",
                "description": format!("Secondary upscaler (default: {})", defaults.upscaler_2)
            },
            "output_path": {
                "type": "string",
                "description": "Directory to save images in (default: configured output directory)"
            }
        },
        "required": ["images"]
    })
}
