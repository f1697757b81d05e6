//! Identity model training with flux-lora-fast-training.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::{FalClient, FalFile};
use crate::error::{ProviderError, ProviderResult};
use crate::services::{IdentityTrainer, TrainedWeights, TrainingRequest};

pub const TRAINING_MODEL: &str = "fal-ai/flux-lora-fast-training";

#[derive(Debug, Deserialize)]
struct TrainingResult {
    diffusers_lora_file: Option<FalFile>,
    config_file: Option<FalFile>,
}

#[async_trait]
impl IdentityTrainer for FalClient {
    async fn train(&self, request: &TrainingRequest) -> ProviderResult<TrainedWeights> {
        info!(
            trigger_word = %request.trigger_word,
            role = %request.role,
            steps = request.steps,
            "Submitting identity training"
        );

        let arguments = json!({
            "images_data_url": request.images_archive_url,
            "trigger_word": request.trigger_word,
            "create_masks": request.create_masks,
            "steps": request.steps,
        });

        let result: TrainingResult = self
            .run(TRAINING_MODEL, &arguments, self.config().training_max_wait)
            .await?;

        let lora = result
            .diffusers_lora_file
            .ok_or_else(|| ProviderError::invalid_response("training result has no LoRA file"))?;

        Ok(TrainedWeights {
            lora_url: lora.url,
            config_url: result.config_file.map(|f| f.url),
        })
    }
}
