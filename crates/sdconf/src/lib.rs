//! Layered configuration for sdmcp.
//!
//! Values are resolved once at startup and then shared read-only.
//!
//! # Load Order
//!
//! Later layers win:
//! 1. Compiled defaults
//! 2. `/etc/sdmcp/config.toml` (system)
//! 3. `~/.config/sdmcp/config.toml` (user)
//! 4. `./sdmcp.toml`, or the file passed with `--config`
//! 5. Environment variables (`SD_WEBUI_URL`, `SD_OUTPUT_DIR`, ...)
//! 6. CLI overrides (`-e KEY VALUE` and typed flags)
//!
//! # Example Config
//!
//! ```toml
//! [webui]
//! url = "http://gpu-box:7860"
//! auth_user = "sd"
//! auth_pass = "secret"
//! request_timeout_ms = 300000
//! model_switch_timeout_ms = 600000
//!
//! [output]
//! dir = "~/Pictures/sd"
//!
//! [upscale]
//! resize_mode = 0
//! multiplier = 2.0
//! upscaler_1 = "R-ESRGAN 4x+"
//!
//! [upload]
//! url = "https://img.example.com/upload"
//! api_key = "abc123"
//!
//! [telemetry]
//! otlp_endpoint = "127.0.0.1:4317"
//! log_level = "info"
//! ```

pub mod loader;
pub mod settings;

pub use loader::{apply_env_overrides, apply_override, expand_path, ConfigSources};
pub use settings::{OutputConfig, TelemetryConfig, UploadConfig, UpscaleDefaults, WebuiConfig};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value:?} ({message})")]
    InvalidValue {
        key: String,
        value: String,
        message: String,
    },

    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    #[error("SD_WEBUI_URL is required but empty")]
    MissingUrl,

    #[error("SD_WEBUI_URL is not a valid http(s) URL: {url} ({message})")]
    InvalidUrl { url: String, message: String },
}

/// Complete sdmcp configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SdConfig {
    pub webui: WebuiConfig,
    pub output: OutputConfig,
    pub upscale: UpscaleDefaults,
    pub upload: UploadConfig,
    pub telemetry: TelemetryConfig,
}

impl SdConfig {
    /// Load from files and the process environment, without CLI overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None, &[])?;
        Ok(config)
    }

    /// Load configuration from all layers and report where values came from.
    ///
    /// `cli_overrides` are `(KEY, VALUE)` pairs using the same keys as the
    /// environment. Unlike the environment layer, an unknown key here is an
    /// error because it was typed explicitly.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
        cli_overrides: &[(String, String)],
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();

        let files = loader::discover_config_files_with_override(config_path);
        let mut config = loader::load_files(&files)?;
        sources.files = files;

        let env_vars = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)));
        loader::apply_env_overrides(&mut config, env_vars, &mut sources)?;

        for (key, value) in cli_overrides {
            if !loader::apply_override(&mut config, key, value)? {
                return Err(ConfigError::UnknownKey(key.clone()));
            }
            sources.cli_overrides.push(key.clone());
        }

        config.validate()?;
        Ok((config, sources))
    }

    /// Check the settings the server cannot start without.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let raw = self.webui.url.trim();
        if raw.is_empty() {
            return Err(ConfigError::MissingUrl);
        }
        let parsed = url::Url::parse(raw).map_err(|e| ConfigError::InvalidUrl {
            url: raw.to_string(),
            message: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl {
                url: raw.to_string(),
                message: format!("unsupported scheme {}", parsed.scheme()),
            });
        }
        Ok(())
    }

    /// Render the effective configuration as TOML with secrets redacted.
    pub fn to_toml(&self) -> String {
        let mut output = String::new();
        let opt = |key: &str, v: &Option<String>, secret: bool| match v {
            Some(_) if secret => format!("{} = \"********\"\n", key),
            Some(s) => format!("{} = {:?}\n", key, s),
            None => format!("# {} =\n", key),
        };

        output.push_str("# sdmcp configuration\n\n");

        output.push_str("[webui]\n");
        output.push_str(&format!("url = {:?}\n", self.webui.url));
        output.push_str(&opt("auth_user", &self.webui.auth_user, false));
        output.push_str(&opt("auth_pass", &self.webui.auth_pass, true));
        output.push_str(&format!(
            "request_timeout_ms = {}\n",
            self.webui.request_timeout_ms
        ));
        output.push_str(&format!(
            "model_switch_timeout_ms = {}\n",
            self.webui.model_switch_timeout_ms
        ));

        output.push_str("\n[output]\n");
        output.push_str(&format!("dir = {:?}\n", self.output.dir.display().to_string()));

        output.push_str("\n[upscale]\n");
        output.push_str(&format!("resize_mode = {}\n", self.upscale.resize_mode));
        output.push_str(&format!("multiplier = {:?}\n", self.upscale.multiplier));
        output.push_str(&format!("width = {}\n", self.upscale.width));
        output.push_str(&format!("height = {}\n", self.upscale.height));
        output.push_str(&format!("upscaler_1 = {:?}\n", self.upscale.upscaler_1));
        output.push_str(&format!("upscaler_2 = {:?}\n", self.upscale.upscaler_2));

        output.push_str("\n[upload]\n");
        output.push_str(&opt("url", &self.upload.url, false));
        output.push_str(&opt("api_key", &self.upload.api_key, true));

        output.push_str("\n[telemetry]\n");
        output.push_str(&opt("otlp_endpoint", &self.telemetry.otlp_endpoint, false));
        output.push_str(&format!("log_level = {:?}\n", self.telemetry.log_level));

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SdConfig::default();
        assert_eq!(config.webui.url, "http://127.0.0.1:7860");
        assert_eq!(config.webui.request_timeout_ms, 300_000);
        assert!(config.webui.model_switch_timeout_ms > config.webui.request_timeout_ms);
        assert_eq!(config.output.dir, PathBuf::from("./output"));
        assert_eq!(config.output.scratch_dir(), PathBuf::from("./output/tmp"));
        assert_eq!(config.upscale.upscaler_1, "R-ESRGAN 4x+");
        assert_eq!(config.upscale.upscaler_2, "None");
        assert!(!config.upload.enabled());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_blank_url() {
        let mut config = SdConfig::default();
        config.webui.url = "   ".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::MissingUrl)));
    }

    #[test]
    fn test_validate_rejects_non_http_url() {
        let mut config = SdConfig::default();
        config.webui.url = "ftp://example.com".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidUrl { .. })));

        config.webui.url = "not a url".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidUrl { .. })));
    }

    #[test]
    fn test_upload_enabled_requires_both_values() {
        let mut upload = UploadConfig::default();
        upload.url = Some("https://img.example.com/upload".to_string());
        assert!(!upload.enabled());
        upload.api_key = Some("  ".to_string());
        assert!(!upload.enabled());
        upload.api_key = Some("key".to_string());
        assert!(upload.enabled());
    }

    #[test]
    fn test_to_toml_redacts_secrets() {
        let mut config = SdConfig::default();
        config.webui.auth_pass = Some("hunter2".to_string());
        config.upload.api_key = Some("topsecret".to_string());
        let rendered = config.to_toml();
        assert!(rendered.contains("[webui]"));
        assert!(rendered.contains("[upscale]"));
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("topsecret"));
    }
}
