//! Optional republishing of result images to an image host.
//!
//! Upload is a post-step: it either yields a public URL or nothing.
//! Failures are logged here and never reach the caller.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{multipart, Client, Url};
use sdconf::UploadConfig;
use serde_json::Value;
use tracing::{debug, info, warn};

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Somewhere a finished image can be published.
#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Publish `bytes` as `filename` and return its public URL.
    async fn publish(&self, bytes: Vec<u8>, filename: &str) -> Option<String>;
}

/// Used when no upload endpoint is configured.
#[derive(Debug, Default)]
pub struct NoUpload;

#[async_trait]
impl ImageHost for NoUpload {
    async fn publish(&self, _bytes: Vec<u8>, _filename: &str) -> Option<String> {
        None
    }
}

/// CloudFlare ImgBed style host: multipart `file` field, `authCode` query
/// parameter, JSON array response with a relative `src`.
#[derive(Debug, Clone)]
pub struct ImgBedUploader {
    http: Client,
    endpoint: Url,
    api_key: String,
}

impl ImgBedUploader {
    pub fn new(endpoint: &str, api_key: &str) -> anyhow::Result<Self> {
        let endpoint = Url::parse(endpoint.trim())?;
        let http = Client::builder().timeout(UPLOAD_TIMEOUT).build()?;
        Ok(Self {
            http,
            endpoint,
            api_key: api_key.trim().to_string(),
        })
    }

    fn upload_url(&self) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("authCode", &self.api_key);
        url
    }

    /// Resolve a returned `src` against the endpoint's origin.
    fn public_url(&self, src: &str) -> Option<Url> {
        let mut origin = self.endpoint.clone();
        origin.set_path("/");
        origin.set_query(None);
        origin.set_fragment(None);
        origin.join(src).ok()
    }

    async fn try_publish(&self, bytes: Vec<u8>, filename: &str) -> Result<String, String> {
        let part = multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(content_type(filename))
            .map_err(|e| format!("invalid content type: {}", e))?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .http
            .post(self.upload_url())
            .multipart(form)
            .send()
            .await
            .map_err(|e| format!("request failed: {}", e))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("HTTP {}: {}", status.as_u16(), body.trim()));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| format!("malformed response: {}", e))?;
        let src = body
            .as_array()
            .and_then(|items| items.first())
            .and_then(|first| first.get("src"))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| format!("response has no src: {}", body))?;

        self.public_url(src)
            .map(String::from)
            .ok_or_else(|| format!("cannot resolve src {:?}", src))
    }
}

#[async_trait]
impl ImageHost for ImgBedUploader {
    async fn publish(&self, bytes: Vec<u8>, filename: &str) -> Option<String> {
        match self.try_publish(bytes, filename).await {
            Ok(url) => {
                info!(filename, url = %url, "uploaded image");
                Some(url)
            }
            Err(e) => {
                warn!(filename, error = %e, "image upload failed");
                None
            }
        }
    }
}

/// Pick the host for this configuration.
pub fn from_config(config: &UploadConfig) -> Arc<dyn ImageHost> {
    if !config.enabled() {
        debug!("image upload disabled");
        return Arc::new(NoUpload);
    }
    let url = config.url.as_deref().unwrap_or_default();
    let key = config.api_key.as_deref().unwrap_or_default();
    match ImgBedUploader::new(url, key) {
        Ok(uploader) => {
            info!(endpoint = %uploader.endpoint, "image upload enabled");
            Arc::new(uploader)
        }
        Err(e) => {
            warn!(url, error = %e, "invalid upload endpoint, image upload disabled");
            Arc::new(NoUpload)
        }
    }
}

fn content_type(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}
