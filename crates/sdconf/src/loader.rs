//! Config file discovery, loading, and environment variable overlay.

use crate::{ConfigError, SdConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
    /// Keys set from the command line
    pub cli_overrides: Vec<String>,
}

/// Discover config files in standard locations.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Discover config files, optionally with a CLI override path.
///
/// System and user files are only returned when they exist. A CLI path
/// replaces `./sdmcp.toml` and is returned even if missing, so that loading
/// reports the bad path instead of quietly ignoring it.
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/sdmcp/config.toml");
    if system.exists() {
        files.push(system);
    }

    // User config (XDG_CONFIG_HOME or ~/.config)
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("sdmcp/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        files.push(path.to_path_buf());
        return files;
    }

    let local = PathBuf::from("sdmcp.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Load and merge config files in order, later files winning per key.
pub fn load_files(paths: &[PathBuf]) -> Result<SdConfig, ConfigError> {
    let mut merged = toml::Table::new();
    for path in paths {
        let table = read_table(path)?;
        merge_tables(&mut merged, table);
    }

    let mut config: SdConfig =
        toml::Value::Table(merged)
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::Parse {
                path: paths.last().cloned().unwrap_or_default(),
                message: e.to_string(),
            })?;

    config.output.dir = expand_path(&config.output.dir.to_string_lossy());
    Ok(config)
}

/// Load config from a single TOML file.
pub fn load_from_file(path: &Path) -> Result<SdConfig, ConfigError> {
    load_files(&[path.to_path_buf()])
}

fn read_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    contents
        .parse::<toml::Table>()
        .map_err(|e: toml::de::Error| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

/// Deep-merge `overlay` into `base`. Nested tables merge key by key,
/// everything else is replaced.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Apply one `KEY=VALUE` override.
///
/// Returns `Ok(false)` if the key is not a configuration key. Numeric keys
/// with unparseable values fail rather than falling back to the default.
pub fn apply_override(config: &mut SdConfig, key: &str, value: &str) -> Result<bool, ConfigError> {
    let value = value.trim();
    let optional = |v: &str| {
        if v.is_empty() {
            None
        } else {
            Some(v.to_string())
        }
    };

    match key {
        "SD_WEBUI_URL" => config.webui.url = value.to_string(),
        "SD_AUTH_USER" => config.webui.auth_user = optional(value),
        "SD_AUTH_PASS" => config.webui.auth_pass = optional(value),
        "REQUEST_TIMEOUT" => config.webui.request_timeout_ms = parse_number(key, value)?,
        "SD_MODEL_SWITCH_TIMEOUT" => {
            config.webui.model_switch_timeout_ms = parse_number(key, value)?
        }
        "SD_OUTPUT_DIR" => config.output.dir = expand_path(value),
        "SD_RESIZE_MODE" => {
            let mode: u8 = parse_number(key, value)?;
            if mode > 1 {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: value.to_string(),
                    message: "expected 0 (multiplier) or 1 (dimensions)".to_string(),
                });
            }
            config.upscale.resize_mode = mode;
        }
        "SD_UPSCALE_MULTIPLIER" => config.upscale.multiplier = parse_number(key, value)?,
        "SD_UPSCALE_WIDTH" => config.upscale.width = parse_number(key, value)?,
        "SD_UPSCALE_HEIGHT" => config.upscale.height = parse_number(key, value)?,
        "SD_UPSCALER_1" => config.upscale.upscaler_1 = value.to_string(),
        "SD_UPSCALER_2" => config.upscale.upscaler_2 = value.to_string(),
        "CF_IMGBED_UPLOAD_URL" => config.upload.url = optional(value),
        "CF_IMGBED_API_KEY" => config.upload.api_key = optional(value),
        "SDMCP_LOG_LEVEL" => config.telemetry.log_level = value.to_string(),
        "OTEL_EXPORTER_OTLP_ENDPOINT" => config.telemetry.otlp_endpoint = optional(value),
        _ => return Ok(false),
    }
    Ok(true)
}

fn parse_number<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        message: e.to_string(),
    })
}

/// Apply environment variable overrides to config.
///
/// Takes the variables as an iterator so callers decide the source;
/// production passes `std::env::vars()`. Empty values count as unset.
pub fn apply_env_overrides<I>(
    config: &mut SdConfig,
    vars: I,
    sources: &mut ConfigSources,
) -> Result<(), ConfigError>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut vars: Vec<(String, String)> = vars
        .into_iter()
        .filter(|(_, value)| !value.trim().is_empty())
        .collect();
    vars.sort();

    for (key, value) in vars {
        if apply_override(config, &key, &value)? {
            sources.env_overrides.push(key);
        }
    }
    Ok(())
}

/// Expand ~ and environment variables in a path.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            return home.join(stripped);
        }
    } else if let Some(stripped) = path.strip_prefix('$') {
        // Handle $VAR/rest/of/path
        let (var_name, rest) = match stripped.find('/') {
            Some(pos) => (&stripped[..pos], Some(&stripped[pos + 1..])),
            None => (stripped, None),
        };
        if let Ok(var_value) = env::var(var_name) {
            let base = PathBuf::from(var_value);
            return match rest {
                Some(rest) => base.join(rest),
                None => base,
            };
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn write_toml(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_expand_path_tilde() {
        let expanded = expand_path("~/test/path");
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.to_string_lossy().contains("test/path"));
    }

    #[test]
    fn test_expand_path_absolute() {
        assert_eq!(expand_path("/absolute/path"), PathBuf::from("/absolute/path"));
        assert_eq!(expand_path("./output"), PathBuf::from("./output"));
    }

    #[test]
    fn test_discover_config_files() {
        // Just verify it doesn't panic
        let _files = discover_config_files();
    }

    #[test]
    fn test_cli_path_is_kept_even_if_missing() {
        let missing = Path::new("/definitely/not/here/sdmcp.toml");
        let files = discover_config_files_with_override(Some(missing));
        assert_eq!(files.last().map(PathBuf::as_path), Some(missing));

        let err = load_files(&files).unwrap_err();
        assert!(matches!(err, ConfigError::FileRead { .. }));
    }

    #[test]
    fn test_parse_partial_toml_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_toml(
            &dir,
            "partial.toml",
            r#"
[webui]
url = "http://gpu:7860"
"#,
        );

        let config = load_from_file(&path).unwrap();
        assert_eq!(config.webui.url, "http://gpu:7860");
        assert_eq!(config.webui.request_timeout_ms, 300_000);
        assert_eq!(config.upscale.upscaler_1, "R-ESRGAN 4x+");
    }

    #[test]
    fn test_later_files_win_per_key() {
        let dir = tempfile::tempdir().unwrap();
        let first = write_toml(
            &dir,
            "first.toml",
            r#"
[webui]
url = "http://first:7860"
auth_user = "alice"

[upscale]
width = 2048
"#,
        );
        let second = write_toml(
            &dir,
            "second.toml",
            r#"
[webui]
url = "http://second:7860"
"#,
        );

        let config = load_files(&[first, second]).unwrap();
        assert_eq!(config.webui.url, "http://second:7860");
        assert_eq!(config.webui.auth_user.as_deref(), Some("alice"));
        assert_eq!(config.upscale.width, 2048);
    }

    #[test]
    fn test_parse_error_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_toml(&dir, "broken.toml", "[webui\nurl = ");
        match load_from_file(&path) {
            Err(ConfigError::Parse { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_env_overrides_apply_and_record() {
        let mut config = SdConfig::default();
        let mut sources = ConfigSources::default();
        apply_env_overrides(
            &mut config,
            vars(&[
                ("SD_WEBUI_URL", "http://remote:7860"),
                ("REQUEST_TIMEOUT", "1000"),
                ("SD_UPSCALE_MULTIPLIER", "4"),
                ("SD_UPSCALER_2", "ESRGAN_4x"),
                ("CF_IMGBED_UPLOAD_URL", "https://img.example.com/upload"),
                ("CF_IMGBED_API_KEY", "key"),
                ("PATH", "/usr/bin"),
            ]),
            &mut sources,
        )
        .unwrap();

        assert_eq!(config.webui.url, "http://remote:7860");
        assert_eq!(config.webui.request_timeout_ms, 1000);
        assert_eq!(config.upscale.multiplier, 4.0);
        assert_eq!(config.upscale.upscaler_2, "ESRGAN_4x");
        assert!(config.upload.enabled());
        assert_eq!(sources.env_overrides.len(), 6);
        assert!(!sources.env_overrides.contains(&"PATH".to_string()));
    }

    #[test]
    fn test_empty_env_value_is_unset() {
        let mut config = SdConfig::default();
        let mut sources = ConfigSources::default();
        apply_env_overrides(&mut config, vars(&[("SD_WEBUI_URL", "")]), &mut sources).unwrap();
        assert_eq!(config.webui.url, "http://127.0.0.1:7860");
        assert!(sources.env_overrides.is_empty());
    }

    #[test]
    fn test_invalid_number_is_an_error() {
        let mut config = SdConfig::default();
        let err = apply_override(&mut config, "REQUEST_TIMEOUT", "soon").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "REQUEST_TIMEOUT"));

        let err = apply_override(&mut config, "SD_RESIZE_MODE", "2").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_unknown_key_is_reported() {
        let mut config = SdConfig::default();
        assert!(!apply_override(&mut config, "SOMETHING_ELSE", "1").unwrap());
    }

    #[test]
    fn test_cli_overrides_beat_env() {
        let mut config = SdConfig::default();
        let mut sources = ConfigSources::default();
        apply_env_overrides(
            &mut config,
            vars(&[("SD_OUTPUT_DIR", "/from/env")]),
            &mut sources,
        )
        .unwrap();
        apply_override(&mut config, "SD_OUTPUT_DIR", "/from/cli").unwrap();
        assert_eq!(config.output.dir, PathBuf::from("/from/cli"));
    }
}
