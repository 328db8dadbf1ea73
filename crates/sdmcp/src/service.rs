//! Shared state for tool handlers.

use std::sync::Arc;

use anyhow::{Context, Result};
use sdconf::SdConfig;

use crate::sdapi::SdApiClient;
use crate::upload::{self, ImageHost};

/// Everything a handler needs: read-only config, the WebUI client and the
/// image host. Cheap to clone.
#[derive(Clone)]
pub struct SdService {
    pub(crate) config: Arc<SdConfig>,
    pub(crate) api: SdApiClient,
    pub(crate) host: Arc<dyn ImageHost>,
}

impl SdService {
    /// Build from configuration, choosing the image host from `[upload]`.
    pub fn new(config: Arc<SdConfig>) -> Result<Self> {
        let host = upload::from_config(&config.upload);
        Self::with_host(config, host)
    }

    /// Build with an explicit image host.
    pub fn with_host(config: Arc<SdConfig>, host: Arc<dyn ImageHost>) -> Result<Self> {
        let api = SdApiClient::new(&config.webui).context("Failed to create WebUI client")?;
        Ok(Self { config, api, host })
    }

    pub fn config(&self) -> &SdConfig {
        &self.config
    }
}

impl std::fmt::Debug for SdService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SdService")
            .field("api", &self.api)
            .field("upload", &self.config.upload.enabled())
            .finish()
    }
}
