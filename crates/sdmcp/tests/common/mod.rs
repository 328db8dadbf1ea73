//! Shared fixtures for sdmcp integration tests.
//!
//! Each test gets its own wiremock server standing in for the WebUI and a
//! temp directory for output.

#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use sdconf::SdConfig;
use sdmcp::upload::ImageHost;
use sdmcp::{Dispatcher, SdService};
use serde_json::Value;
use tempfile::TempDir;
use wiremock::MockServer;

/// Records every publish call and answers with a fixed URL pattern.
#[derive(Debug, Default)]
pub struct RecordingHost {
    pub published: Mutex<Vec<(String, usize)>>,
}

#[async_trait]
impl ImageHost for RecordingHost {
    async fn publish(&self, bytes: Vec<u8>, filename: &str) -> Option<String> {
        if let Ok(mut published) = self.published.lock() {
            published.push((filename.to_string(), bytes.len()));
        }
        Some(format!("https://img.test/file/{}", filename))
    }
}

pub struct Harness {
    pub server: MockServer,
    pub output: TempDir,
    pub service: SdService,
    pub host: Arc<RecordingHost>,
}

impl Harness {
    pub async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    /// Start with a config tweak applied after the defaults.
    pub async fn start_with(tweak: impl FnOnce(&mut SdConfig)) -> Self {
        let server = MockServer::start().await;
        let output = TempDir::new().unwrap();

        let mut config = SdConfig::default();
        config.webui.url = server.uri();
        config.output.dir = output.path().to_path_buf();
        tweak(&mut config);

        let host = Arc::new(RecordingHost::default());
        let service = SdService::with_host(Arc::new(config), host.clone()).unwrap();
        Self {
            server,
            output,
            service,
            host,
        }
    }

    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(self.service.clone()).unwrap()
    }

    pub fn scratch_root(&self) -> std::path::PathBuf {
        self.output.path().join("tmp")
    }
}

fn chunk(kind: &[u8; 4], data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 12);
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(kind);
    out.extend_from_slice(data);
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(kind);
    hasher.update(data);
    out.extend_from_slice(&hasher.finalize().to_be_bytes());
    out
}

/// A valid 1x1 grayscale PNG.
pub fn tiny_png() -> Vec<u8> {
    let mut png = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    png.extend(chunk(b"IHDR", &[0, 0, 0, 1, 0, 0, 0, 1, 8, 0, 0, 0, 0]));
    png.extend(chunk(
        b"IDAT",
        &[0x78, 0x9c, 0x63, 0x60, 0x00, 0x00, 0x00, 0x02, 0x00, 0x01],
    ));
    png.extend(chunk(b"IEND", &[]));
    png
}

pub fn tiny_png_b64() -> String {
    BASE64.encode(tiny_png())
}

pub fn write_png(dir: &Path, name: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, tiny_png()).unwrap();
    path
}

/// Parse the text content of a tool result as JSON.
pub fn result_json(result: &rmcp::model::CallToolResult) -> Value {
    let wire = serde_json::to_value(result).unwrap();
    let text = wire["content"][0]["text"]
        .as_str()
        .expect("tool result has text content");
    serde_json::from_str(text).unwrap()
}

/// Whether the result is flagged as an error on the wire.
pub fn is_error(result: &rmcp::model::CallToolResult) -> bool {
    let wire = serde_json::to_value(result).unwrap();
    wire["isError"].as_bool().unwrap_or(false)
}

/// Files directly inside `dir`, ignoring subdirectories.
pub fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter(|e| e.path().is_file())
                .map(|e| e.file_name().to_string_lossy().to_string())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

/// Entries left under the scratch root, or empty when it does not exist.
pub fn scratch_entries(root: &Path) -> usize {
    std::fs::read_dir(root).map(|d| d.count()).unwrap_or(0)
}
