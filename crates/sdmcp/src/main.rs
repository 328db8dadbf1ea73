//! sdmcp - MCP stdio server for the Stable Diffusion WebUI API
//!
//! Subcommands:
//! - `sdmcp serve` - Serve tools over stdio (default)
//! - `sdmcp config` - Print the resolved configuration

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use sdconf::SdConfig;
use tracing::info;

use sdmcp::{stdio, telemetry, Dispatcher, SdService};

#[derive(Parser)]
#[command(name = "sdmcp")]
#[command(about = "MCP server exposing the Stable Diffusion WebUI API as tools")]
#[command(version)]
struct Cli {
    /// Config file (replaces ./sdmcp.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Stable Diffusion WebUI base URL
    #[arg(long, global = true)]
    webui_url: Option<String>,

    /// Default output directory for images
    #[arg(long, global = true)]
    output_dir: Option<String>,

    /// OTLP gRPC endpoint for OpenTelemetry (e.g., "localhost:4317")
    #[arg(long, global = true)]
    otlp_endpoint: Option<String>,

    /// Override a setting by its environment name, e.g. `-e SD_UPSCALER_1 ESRGAN_4x`
    #[arg(
        short = 'e',
        long = "env",
        num_args = 2,
        value_names = ["KEY", "VALUE"],
        action = ArgAction::Append,
        global = true
    )]
    env: Vec<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve MCP tools over stdin/stdout
    Serve,

    /// Print the resolved configuration and where it came from
    Config,
}

impl Cli {
    /// CLI settings as `(KEY, VALUE)` overrides, in increasing priority.
    fn overrides(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        if let Some(url) = &self.webui_url {
            out.push(("SD_WEBUI_URL".to_string(), url.clone()));
        }
        if let Some(dir) = &self.output_dir {
            out.push(("SD_OUTPUT_DIR".to_string(), dir.clone()));
        }
        if let Some(endpoint) = &self.otlp_endpoint {
            out.push(("OTEL_EXPORTER_OTLP_ENDPOINT".to_string(), endpoint.clone()));
        }
        for pair in self.env.chunks(2) {
            if let [key, value] = pair {
                out.push((key.clone(), value.clone()));
            }
        }
        out
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, sources) = SdConfig::load_with_sources_from(cli.config.as_deref(), &cli.overrides())
        .context("Failed to load configuration")?;

    if let Some(Commands::Config) = cli.command {
        print!("{}", config.to_toml());
        println!();
        for file in &sources.files {
            println!("# loaded: {}", file.display());
        }
        for key in &sources.env_overrides {
            println!("# env: {}", key);
        }
        for key in &sources.cli_overrides {
            println!("# cli: {}", key);
        }
        return Ok(());
    }

    let telemetry = telemetry::init(
        config.telemetry.otlp_endpoint.as_deref(),
        &config.telemetry.log_level,
    )?;

    info!(
        webui = %config.webui.url,
        output_dir = %config.output.dir.display(),
        upload = config.upload.enabled(),
        config_files = sources.files.len(),
        "Starting sdmcp"
    );

    let service = SdService::new(Arc::new(config))?;
    let dispatcher = Arc::new(Dispatcher::new(service).context("Failed to build tool registry")?);

    let result = stdio::run(dispatcher).await;
    telemetry.shutdown();
    result
}
