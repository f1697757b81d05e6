//! Identity training flow.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, info_span, Instrument};

use scast_models::{IdentityModel, IdentityRole};
use scast_providers::{IdentityTrainer, MediaStore, TrainingRequest};

use crate::calls::bounded;
use crate::error::{PipelineError, PipelineResult};
use crate::registry::{validate_trigger_word, IdentityRegistry};

/// Uploads an image archive, trains an identity model and registers it.
pub struct TrainingFlow {
    trainer: Arc<dyn IdentityTrainer>,
    store: Arc<dyn MediaStore>,
    steps: u32,
    create_masks: bool,
    upload_timeout: Duration,
    training_timeout: Duration,
}

impl TrainingFlow {
    pub fn new(trainer: Arc<dyn IdentityTrainer>, store: Arc<dyn MediaStore>) -> Self {
        Self {
            trainer,
            store,
            steps: 1000,
            create_masks: true,
            upload_timeout: Duration::from_secs(600),
            training_timeout: Duration::from_secs(7200),
        }
    }

    pub fn with_steps(mut self, steps: u32) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_create_masks(mut self, create_masks: bool) -> Self {
        self.create_masks = create_masks;
        self
    }

    pub fn with_upload_timeout(mut self, timeout: Duration) -> Self {
        self.upload_timeout = timeout;
        self
    }

    pub fn with_training_timeout(mut self, timeout: Duration) -> Self {
        self.training_timeout = timeout;
        self
    }

    /// Train a model from a zip archive of images and add it to `registry`.
    ///
    /// The trigger word is checked against the registry before anything is
    /// uploaded. Any remote failure is reported as `TrainingFailed` and
    /// leaves the registry unchanged.
    pub async fn train(
        &self,
        registry: &mut IdentityRegistry,
        archive: &Path,
        trigger_word: &str,
        role: IdentityRole,
    ) -> PipelineResult<IdentityModel> {
        validate_trigger_word(trigger_word)?;
        if registry.contains(role, trigger_word) {
            return Err(PipelineError::DuplicateIdentity {
                role,
                trigger_word: trigger_word.to_string(),
            });
        }

        let is_zip = archive
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("zip"))
            .unwrap_or(false);
        if !is_zip || !tokio::fs::try_exists(archive).await.unwrap_or(false) {
            return Err(PipelineError::invalid_request(format!(
                "image archive must be an existing .zip file: {}",
                archive.display()
            )));
        }

        let span = info_span!("train_identity", trigger_word = %trigger_word, role = %role);
        let weights = async {
            let archive_url = bounded(self.upload_timeout, self.store.upload(archive, "application/zip"))
                .await
                .map_err(|e| PipelineError::training_failed(format!("archive upload failed: {}", e)))?;
            info!("Uploaded training archive");

            let request = TrainingRequest {
                images_archive_url: archive_url,
                trigger_word: trigger_word.to_string(),
                role,
                steps: self.steps,
                create_masks: self.create_masks,
            };

            bounded(self.training_timeout, self.trainer.train(&request))
                .await
                .map_err(|e| PipelineError::training_failed(e.to_string()))
        }
        .instrument(span)
        .await?;

        let model = IdentityModel::new(trigger_word, role, weights.lora_url);
        registry.register(model.clone()).await?;

        info!(trigger_word = %trigger_word, role = %role, "Identity model trained");
        Ok(model)
    }
}
