//! Identity-conditioned image generation with flux-lora.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{FalClient, FalFile};
use crate::error::{ProviderError, ProviderResult};
use crate::services::{FrameGenerator, FrameRequest, GeneratedImage};

pub const FLUX_LORA_MODEL: &str = "fal-ai/flux-lora";
pub const DEFAULT_IMAGE_SIZE: &str = "landscape_16_9";

#[derive(Debug, Deserialize)]
struct FluxResult {
    #[serde(default)]
    images: Vec<FalFile>,
}

#[async_trait]
impl FrameGenerator for FalClient {
    async fn generate_frame(&self, request: &FrameRequest) -> ProviderResult<GeneratedImage> {
        let arguments = json!({
            "prompt": request.prompt,
            "loras": request.loras,
            "embeddings": [],
            "image_size": request.image_size,
            "num_images": 1,
            "enable_safety_checker": false,
        });

        let result: FluxResult = self
            .run(FLUX_LORA_MODEL, &arguments, self.config().max_wait)
            .await?;

        result
            .images
            .into_iter()
            .next()
            .map(|image| GeneratedImage { url: image.url })
            .ok_or_else(|| ProviderError::invalid_response("flux-lora returned no images"))
    }
}
