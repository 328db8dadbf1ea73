//! `generate_sd_image`: txt2img plus per-image metadata, save and upload.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::ToolError;
use crate::files;
use crate::metadata;
use crate::sdapi::{self, ImagesResponse, PngInfoResponse};
use crate::service::SdService;
use crate::tools::{integral, ResultEntry};

/// Used when the caller omits `negative_prompt`. An explicit empty string
/// is sent as-is.
pub const DEFAULT_NEGATIVE_PROMPT: &str = "lowres, bad anatomy, bad hands, text, error, \
    missing fingers, extra digit, fewer digits, cropped, worst quality, low quality, \
    normal quality, jpeg artifacts, signature, watermark, username, blurry";

fn default_steps() -> u32 {
    20
}

fn default_dimension() -> u32 {
    1024
}

fn default_cfg_scale() -> f64 {
    3.5
}

fn default_sampler() -> String {
    "Euler a".to_string()
}

fn default_scheduler() -> String {
    "Automatic".to_string()
}

fn default_seed() -> i64 {
    -1
}

fn default_batch_size() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateImageArgs {
    pub prompt: String,
    #[serde(default)]
    pub negative_prompt: Option<String>,
    #[serde(default = "default_steps", deserialize_with = "integral")]
    pub steps: u32,
    #[serde(default = "default_dimension", deserialize_with = "integral")]
    pub width: u32,
    #[serde(default = "default_dimension", deserialize_with = "integral")]
    pub height: u32,
    #[serde(default = "default_cfg_scale")]
    pub cfg_scale: f64,
    #[serde(default = "default_sampler")]
    pub sampler_name: String,
    #[serde(default = "default_scheduler")]
    pub scheduler_name: String,
    #[serde(default = "default_seed", deserialize_with = "integral")]
    pub seed: i64,
    #[serde(default = "default_batch_size", deserialize_with = "integral")]
    pub batch_size: u32,
    #[serde(default)]
    pub restore_faces: bool,
    #[serde(default)]
    pub tiling: bool,
    #[serde(default = "default_cfg_scale")]
    pub distilled_cfg_scale: f64,
    #[serde(default)]
    pub output_path: Option<String>,
}

/// Body of `POST /sdapi/v1/txt2img`.
#[derive(Debug, Serialize)]
pub struct GenerationPayload<'a> {
    pub prompt: &'a str,
    pub negative_prompt: &'a str,
    pub steps: u32,
    pub width: u32,
    pub height: u32,
    pub cfg_scale: f64,
    pub sampler_name: &'a str,
    pub scheduler_name: &'a str,
    pub seed: i64,
    /// The tool's `batch_size`, sent as the number of sequential batches.
    pub n_iter: u32,
    pub restore_faces: bool,
    pub tiling: bool,
    pub distilled_cfg_scale: f64,
}

impl<'a> GenerationPayload<'a> {
    pub fn from_args(args: &'a GenerateImageArgs) -> Self {
        Self {
            prompt: &args.prompt,
            negative_prompt: args
                .negative_prompt
                .as_deref()
                .unwrap_or(DEFAULT_NEGATIVE_PROMPT),
            steps: args.steps,
            width: args.width,
            height: args.height,
            cfg_scale: args.cfg_scale,
            sampler_name: &args.sampler_name,
            scheduler_name: &args.scheduler_name,
            seed: args.seed,
            n_iter: args.batch_size,
            restore_faces: args.restore_faces,
            tiling: args.tiling,
            distilled_cfg_scale: args.distilled_cfg_scale,
        }
    }
}

impl SdService {
    pub async fn generate_image(&self, args: GenerateImageArgs) -> Result<Vec<ResultEntry>, ToolError> {
        let output_dir = files::resolve_output_dir(args.output_path.as_deref(), &self.config.output.dir);
        files::ensure_dir(&output_dir).await?;

        let payload = GenerationPayload::from_args(&args);
        info!(
            steps = payload.steps,
            width = payload.width,
            height = payload.height,
            n_iter = payload.n_iter,
            sampler = payload.sampler_name,
            "generating"
        );

        let response: ImagesResponse = self.api.post_json(sdapi::TXT2IMG, &payload).await?;
        if response.images.is_empty() {
            return Err(ToolError::EmptyResult("No images generated".to_string()));
        }

        let mut results = Vec::with_capacity(response.images.len());
        for (index, image) in response.images.iter().enumerate() {
            let data = sdapi::strip_data_url(image);
            let bytes = sdapi::decode_image(data).map_err(|e| {
                ToolError::RemoteRequest(format!("Image {} in txt2img response is not valid base64: {}", index, e))
            })?;

            let parameters = self.fetch_parameters(data).await;
            let bytes = match parameters.as_deref() {
                Some(text) => match metadata::embed_parameters(&bytes, text) {
                    Ok(with_text) => with_text,
                    Err(e) => {
                        warn!(index, error = %e, "could not embed generation parameters");
                        bytes
                    }
                },
                None => bytes,
            };

            let filename = format!("sd_{}.png", Uuid::new_v4());
            let path = output_dir.join(&filename);
            files::write_file(&path, &bytes).await?;
            debug!(path = %path.display(), bytes = bytes.len(), "saved image");

            let url = self.host.publish(bytes, &filename).await;
            results.push(ResultEntry {
                path: path.display().to_string(),
                url,
                parameters,
            });
        }

        info!(count = results.len(), dir = %output_dir.display(), "generation complete");
        Ok(results)
    }

    /// Ask the WebUI to describe an image. Best-effort: any failure or an
    /// empty answer yields `None`.
    async fn fetch_parameters(&self, data: &str) -> Option<String> {
        let body = json!({ "image": format!("data:image/png;base64,{}", data) });
        match self
            .api
            .post_json::<_, PngInfoResponse>(sdapi::PNG_INFO, &body)
            .await
        {
            Ok(info) => info.info.filter(|text| !text.trim().is_empty()),
            Err(e) => {
                warn!(error = %e, "png-info request failed, continuing without parameters");
                None
            }
        }
    }
}
