//! Configuration sections.
//!
//! Every field has a compiled default so a missing file or a partial
//! file still yields a complete configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Stable Diffusion WebUI connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebuiConfig {
    /// Base URL of the WebUI API.
    /// Default: http://127.0.0.1:7860
    pub url: String,

    /// Basic auth username. Auth is only sent when this is set.
    pub auth_user: Option<String>,

    /// Basic auth password.
    pub auth_pass: Option<String>,

    /// Timeout for ordinary requests in milliseconds (0 disables it).
    /// Default: 300000
    pub request_timeout_ms: u64,

    /// Timeout for switching the active checkpoint. Loading a model can
    /// take minutes, so this is longer than the request timeout.
    /// Default: 600000
    pub model_switch_timeout_ms: u64,
}

impl Default for WebuiConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:7860".to_string(),
            auth_user: None,
            auth_pass: None,
            request_timeout_ms: 300_000,
            model_switch_timeout_ms: 600_000,
        }
    }
}

/// Where images are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Default output directory for generated and upscaled images.
    /// Default: ./output
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./output"),
        }
    }
}

impl OutputConfig {
    /// Scratch directory for downloaded inputs.
    pub fn scratch_dir(&self) -> PathBuf {
        self.dir.join("tmp")
    }
}

/// Defaults for `upscale_sd_images` arguments the caller leaves out.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpscaleDefaults {
    /// 0 = scale by multiplier, 1 = scale to dimensions.
    pub resize_mode: u8,
    pub multiplier: f64,
    pub width: u32,
    pub height: u32,
    pub upscaler_1: String,
    pub upscaler_2: String,
}

impl Default for UpscaleDefaults {
    fn default() -> Self {
        Self {
            resize_mode: 0,
            multiplier: 2.0,
            width: 1024,
            height: 1024,
            upscaler_1: "R-ESRGAN 4x+".to_string(),
            upscaler_2: "None".to_string(),
        }
    }
}

/// Optional image host that republishes results under a public URL.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub url: Option<String>,
    pub api_key: Option<String>,
}

impl UploadConfig {
    /// Upload is active only when both the endpoint and the key are present.
    pub fn enabled(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        present(&self.url) && present(&self.api_key)
    }
}

/// Logging and OpenTelemetry export.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// OTLP gRPC endpoint. When unset, logs only go to stderr.
    pub otlp_endpoint: Option<String>,

    /// Default log filter when RUST_LOG is not set.
    /// Default: info
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            otlp_endpoint: None,
            log_level: "info".to_string(),
        }
    }
}
