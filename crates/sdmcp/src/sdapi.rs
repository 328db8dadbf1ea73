//! HTTP client for the Stable Diffusion WebUI API.
//!
//! One request per call, no retries. Failures come back as [`RemoteError`]
//! so every handler classifies them the same way.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::{Client, RequestBuilder};
use sdconf::WebuiConfig;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::RemoteError;

pub const TXT2IMG: &str = "/sdapi/v1/txt2img";
pub const PNG_INFO: &str = "/sdapi/v1/png-info";
pub const SD_MODELS: &str = "/sdapi/v1/sd-models";
pub const OPTIONS: &str = "/sdapi/v1/options";
pub const UPSCALERS: &str = "/sdapi/v1/upscalers";
pub const SAMPLERS: &str = "/sdapi/v1/samplers";
pub const LORAS: &str = "/sdapi/v1/loras";
pub const EXTRA_BATCH_IMAGES: &str = "/sdapi/v1/extra-batch-images";

/// Longest slice of an error body kept in messages.
const BODY_DIGEST_CHARS: usize = 500;

/// Reusable client bound to one WebUI instance.
#[derive(Clone)]
pub struct SdApiClient {
    http: Client,
    base_url: String,
    auth: Option<(String, Option<String>)>,
    /// Applied per request; `None` means no timeout.
    request_timeout: Option<Duration>,
}

impl std::fmt::Debug for SdApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SdApiClient")
            .field("base_url", &self.base_url)
            .field("auth", &self.auth.as_ref().map(|(user, _)| user))
            .finish()
    }
}

/// `None` when the configured value is 0.
pub fn timeout_from_ms(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

impl SdApiClient {
    pub fn new(config: &WebuiConfig) -> Result<Self, RemoteError> {
        // No client-wide timeout: each request sets its own
        let http = Client::builder()
            .build()
            .map_err(|e| RemoteError::Request(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.url.trim().trim_end_matches('/').to_string(),
            auth: config
                .auth_user
                .clone()
                .map(|user| (user, config.auth_pass.clone())),
            request_timeout: timeout_from_ms(config.request_timeout_ms),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout
    }

    fn request(&self, method: reqwest::Method, path: &str, timeout: Option<Duration>) -> RequestBuilder {
        let builder = with_timeout(
            self.http.request(method, format!("{}{}", self.base_url, path)),
            timeout,
        );
        match &self.auth {
            Some((user, pass)) => builder.basic_auth(user, pass.as_deref()),
            None => builder,
        }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, RemoteError> {
        debug!(path, "GET");
        let bytes = self
            .send(self.request(reqwest::Method::GET, path, self.request_timeout))
            .await?;
        parse_body(&bytes, path)
    }

    /// POST a JSON body under the configured request timeout.
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, RemoteError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let bytes = self.post(path, body, self.request_timeout).await?;
        parse_body(&bytes, path)
    }

    /// POST a JSON body with an explicit timeout (`None` waits indefinitely)
    /// and return the raw response body.
    pub async fn post<B>(
        &self,
        path: &str,
        body: &B,
        timeout: Option<Duration>,
    ) -> Result<Vec<u8>, RemoteError>
    where
        B: Serialize + ?Sized,
    {
        debug!(path, "POST");
        let builder = self.request(reqwest::Method::POST, path, timeout).json(body);
        self.send(builder).await
    }

    /// Fetch an arbitrary URL with the shared client. WebUI credentials are
    /// not attached.
    pub async fn download(&self, url: &str) -> Result<Vec<u8>, RemoteError> {
        debug!(url, "download");
        self.send(with_timeout(self.http.get(url), self.request_timeout))
            .await
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Vec<u8>, RemoteError> {
        let response = builder.send().await.map_err(classify)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body: digest(&body),
            });
        }
        let bytes = response.bytes().await.map_err(classify)?;
        Ok(bytes.to_vec())
    }
}

fn with_timeout(builder: RequestBuilder, timeout: Option<Duration>) -> RequestBuilder {
    match timeout {
        Some(timeout) => builder.timeout(timeout),
        None => builder,
    }
}

fn parse_body<T: DeserializeOwned>(bytes: &[u8], path: &str) -> Result<T, RemoteError> {
    serde_json::from_slice(bytes)
        .map_err(|e| RemoteError::Request(format!("malformed response from {}: {}", path, e)))
}

/// Sort a reqwest failure into one of the three remote failure shapes.
fn classify(err: reqwest::Error) -> RemoteError {
    if err.is_builder() {
        RemoteError::Request(err.to_string())
    } else if err.is_timeout() {
        RemoteError::NoResponse {
            message: err.to_string(),
            timed_out: true,
        }
    } else if err.is_connect() || err.is_request() || err.is_body() {
        RemoteError::NoResponse {
            message: err.to_string(),
            timed_out: false,
        }
    } else {
        RemoteError::Request(err.to_string())
    }
}

fn digest(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(BODY_DIGEST_CHARS) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

/// Images returned by txt2img and extra-batch-images.
#[derive(Debug, Default, Deserialize)]
pub struct ImagesResponse {
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PngInfoResponse {
    #[serde(default)]
    pub info: Option<String>,
}

/// Strip an optional `data:<mime>;base64,` prefix.
pub fn strip_data_url(data: &str) -> &str {
    if data.starts_with("data:") {
        if let Some((_, rest)) = data.split_once(',') {
            return rest;
        }
    }
    data
}

/// Decode image data as returned by the WebUI.
pub fn decode_image(data: &str) -> Result<Vec<u8>, base64::DecodeError> {
    BASE64.decode(strip_data_url(data).trim())
}

pub fn encode_image(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}
