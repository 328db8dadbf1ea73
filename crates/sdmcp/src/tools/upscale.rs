//! `upscale_sd_images`: resolve inputs, one extras batch call, save results.
//!
//! Inputs may be local paths or http(s) URLs. URLs are downloaded into a
//! per-call scratch directory that is removed however the call ends.
//! Unreadable inputs are skipped; the call only fails if none are left.

use std::path::{Path, PathBuf};

use futures::future::join_all;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::ToolError;
use crate::files::{self, ScratchDir};
use crate::sdapi::{self, ImagesResponse};
use crate::service::SdService;
use crate::tools::{integral_opt, ResultEntry};

#[derive(Debug, Clone, Deserialize)]
pub struct UpscaleImagesArgs {
    pub images: Vec<String>,
    #[serde(default, deserialize_with = "integral_opt")]
    pub resize_mode: Option<u8>,
    pub upscaling_resize: Option<f64>,
    #[serde(default, deserialize_with = "integral_opt")]
    pub upscaling_resize_w: Option<u32>,
    #[serde(default, deserialize_with = "integral_opt")]
    pub upscaling_resize_h: Option<u32>,
    pub upscaler_1: Option<String>,
    pub upscaler_2: Option<String>,
    pub output_path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UpscaleImage {
    pub data: String,
    pub name: String,
}

/// Body of `POST /sdapi/v1/extra-batch-images`. Face restoration is
/// always off.
#[derive(Debug, Serialize)]
pub struct UpscalePayload {
    pub resize_mode: u8,
    pub show_extras_results: bool,
    pub gfpgan_visibility: f64,
    pub codeformer_visibility: f64,
    pub codeformer_weight: f64,
    pub upscaling_resize: f64,
    pub upscaling_resize_w: u32,
    pub upscaling_resize_h: u32,
    pub upscaling_crop: bool,
    pub upscaler_1: String,
    pub upscaler_2: String,
    pub extras_upscaler_2_visibility: f64,
    pub upscale_first: bool,
    #[serde(rename = "imageList")]
    pub image_list: Vec<UpscaleImage>,
}

impl UpscalePayload {
    pub fn new(args: &UpscaleImagesArgs, defaults: &sdconf::UpscaleDefaults, images: Vec<UpscaleImage>) -> Self {
        Self {
            resize_mode: args.resize_mode.unwrap_or(defaults.resize_mode),
            show_extras_results: true,
            gfpgan_visibility: 0.0,
            codeformer_visibility: 0.0,
            codeformer_weight: 0.0,
            upscaling_resize: args.upscaling_resize.unwrap_or(defaults.multiplier),
            upscaling_resize_w: args.upscaling_resize_w.unwrap_or(defaults.width),
            upscaling_resize_h: args.upscaling_resize_h.unwrap_or(defaults.height),
            upscaling_crop: true,
            upscaler_1: args
                .upscaler_1
                .clone()
                .unwrap_or_else(|| defaults.upscaler_1.clone()),
            upscaler_2: args
                .upscaler_2
                .clone()
                .unwrap_or_else(|| defaults.upscaler_2.clone()),
            extras_upscaler_2_visibility: 0.0,
            upscale_first: false,
            image_list: images,
        }
    }
}

/// An input that was turned into a readable local file.
#[derive(Debug, Clone)]
struct ResolvedImage {
    path: PathBuf,
    /// Sanitized base name, sent to the WebUI and used for the output file.
    name: String,
}

fn is_remote(reference: &str) -> bool {
    let lower = reference.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Sanitized `(stem, extension)` of the file a URL points at. The
/// extension includes its dot and falls back to `.tmp`.
fn download_name(url: &str) -> (String, String) {
    let segment = Url::parse(url)
        .ok()
        .and_then(|u| {
            let last = u.path_segments()?.next_back()?.to_string();
            Some(last)
        })
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| files::base_name(url).to_string());

    let name = files::sanitize_filename(&segment);
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem.to_string(), format!(".{}", ext)),
        _ => (name, ".tmp".to_string()),
    }
}

impl SdService {
    pub async fn upscale_images(&self, args: UpscaleImagesArgs) -> Result<Vec<ResultEntry>, ToolError> {
        let output_dir = files::resolve_output_dir(args.output_path.as_deref(), &self.config.output.dir);
        files::ensure_dir(&output_dir).await?;

        let scratch = if args.images.iter().any(|r| is_remote(r)) {
            Some(ScratchDir::create(&self.config.output.scratch_dir(), "upscale").await?)
        } else {
            None
        };

        let result = self.upscale_resolved(&args, &output_dir, scratch.as_ref()).await;
        if let Some(scratch) = scratch {
            scratch.close().await;
        }
        result
    }

    async fn upscale_resolved(
        &self,
        args: &UpscaleImagesArgs,
        output_dir: &Path,
        scratch: Option<&ScratchDir>,
    ) -> Result<Vec<ResultEntry>, ToolError> {
        let resolved: Vec<ResolvedImage> = join_all(
            args.images
                .iter()
                .map(|reference| self.resolve_input(reference.trim(), scratch)),
        )
        .await
        .into_iter()
        .flatten()
        .collect();

        if resolved.is_empty() {
            return Err(ToolError::NoValidImages(format!(
                "none of the {} image reference(s) could be read or downloaded",
                args.images.len()
            )));
        }
        info!(
            requested = args.images.len(),
            resolved = resolved.len(),
            "upscaling"
        );

        let encoded = join_all(resolved.iter().map(|image| async move {
            let bytes = tokio::fs::read(&image.path)
                .await
                .map_err(|e| ToolError::filesystem("read", &image.path, e))?;
            Ok::<_, ToolError>(UpscaleImage {
                data: sdapi::encode_image(&bytes),
                name: image.name.clone(),
            })
        }))
        .await
        .into_iter()
        .collect::<Result<Vec<_>, _>>()?;

        let payload = UpscalePayload::new(args, &self.config.upscale, encoded);
        let response: ImagesResponse = self
            .api
            .post_json(sdapi::EXTRA_BATCH_IMAGES, &payload)
            .await?;
        if response.images.is_empty() {
            return Err(ToolError::EmptyResult("No images returned from upscale".to_string()));
        }
        if response.images.len() != resolved.len() {
            warn!(
                sent = resolved.len(),
                returned = response.images.len(),
                "upscale returned a different number of images, pairing by position"
            );
        }

        let mut results = Vec::with_capacity(response.images.len().min(resolved.len()));
        for (index, (image, input)) in response.images.iter().zip(&resolved).enumerate() {
            let bytes = sdapi::decode_image(image).map_err(|e| {
                ToolError::RemoteRequest(format!("Image {} in upscale response is not valid base64: {}", index, e))
            })?;

            let path = files::unique_path(output_dir, &format!("upscaled_{}", input.name)).await;
            files::write_file(&path, &bytes).await?;
            debug!(path = %path.display(), source = %input.path.display(), "saved upscaled image");

            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| format!("upscaled_{}", input.name));
            let url = self.host.publish(bytes, &filename).await;
            results.push(ResultEntry {
                path: path.display().to_string(),
                url,
                parameters: None,
            });
        }

        info!(count = results.len(), dir = %output_dir.display(), "upscale complete");
        Ok(results)
    }

    async fn resolve_input(&self, reference: &str, scratch: Option<&ScratchDir>) -> Option<ResolvedImage> {
        if is_remote(reference) {
            let scratch = scratch?;
            return self.download_input(reference, scratch.path()).await;
        }

        let path = PathBuf::from(reference);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Some(ResolvedImage {
                name: files::sanitize_filename(files::base_name(reference)),
                path,
            }),
            Ok(_) => {
                warn!(path = %path.display(), "not a regular file, skipping");
                None
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot access image, skipping");
                None
            }
        }
    }

    async fn download_input(&self, url: &str, scratch: &Path) -> Option<ResolvedImage> {
        let bytes = match self.api.download(url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(url, error = %e, "download failed, skipping");
                return None;
            }
        };

        let (stem, ext) = download_name(url);
        let path = scratch.join(format!("{}_{}{}", stem, Uuid::new_v4().simple(), ext));
        if let Err(e) = tokio::fs::write(&path, &bytes).await {
            warn!(url, path = %path.display(), error = %e, "could not store download, skipping");
            return None;
        }
        debug!(url, path = %path.display(), bytes = bytes.len(), "downloaded image");

        Some(ResolvedImage {
            path,
            name: format!("{}{}", stem, ext),
        })
    }
}
