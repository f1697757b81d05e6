//! Video backends hosted on fal (LTX and Luma ray-2).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use scast_models::VideoBackend;

use super::{FalClient, FalFile};
use crate::error::{ProviderError, ProviderResult};
use crate::services::{GeneratedVideo, SegmentRequest, VideoEngine};

pub const LTX_IMAGE_TO_VIDEO_MODEL: &str = "fal-ai/ltx-video/image-to-video";
pub const LUMA_IMAGE_TO_VIDEO_MODEL: &str = "fal-ai/luma-dream-machine/ray-2/image-to-video";

#[derive(Debug, Deserialize)]
struct VideoResult {
    video: Option<FalFile>,
}

/// Image-to-video engine running on fal.
pub struct FalVideoEngine {
    fal: FalClient,
    backend: VideoBackend,
}

impl FalVideoEngine {
    /// Engine for a fal-hosted backend.
    pub fn new(fal: FalClient, backend: VideoBackend) -> ProviderResult<Self> {
        match backend {
            VideoBackend::EngineB | VideoBackend::EngineC => Ok(Self { fal, backend }),
            other => Err(ProviderError::config(format!("{} is not served by fal", other))),
        }
    }

    fn model(&self) -> &'static str {
        match self.backend {
            VideoBackend::EngineC => LUMA_IMAGE_TO_VIDEO_MODEL,
            _ => LTX_IMAGE_TO_VIDEO_MODEL,
        }
    }

    fn arguments(&self, request: &SegmentRequest) -> Value {
        match self.backend {
            VideoBackend::EngineC => json!({
                "prompt": request.prompt,
                "image_url": request.image_url,
                "aspect_ratio": "16:9",
                "resolution": request.resolution.as_str(),
                "duration": format!("{}s", request.duration_seconds),
                "loop": false,
            }),
            // LTX renders a fixed-length clip from prompt and image
            _ => json!({
                "prompt": request.prompt,
                "image_url": request.image_url,
            }),
        }
    }
}

#[async_trait]
impl VideoEngine for FalVideoEngine {
    fn backend(&self) -> VideoBackend {
        self.backend
    }

    async fn generate_segment(&self, request: &SegmentRequest) -> ProviderResult<GeneratedVideo> {
        let result: VideoResult = self
            .fal
            .run(self.model(), &self.arguments(request), self.fal.config().max_wait)
            .await?;

        let video = result
            .video
            .ok_or_else(|| ProviderError::invalid_response("fal video result has no video"))?;

        Ok(GeneratedVideo {
            url: video.url,
            duration_seconds: request.duration_seconds,
        })
    }
}
