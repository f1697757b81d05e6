//! First-frame stage.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use scast_models::{FirstFrame, IdentityRole, IdentitySelection, SceneDescriptor};
use scast_providers::fal::DEFAULT_IMAGE_SIZE;
use scast_providers::{FrameGenerator, FrameRequest, LoraWeight, MediaStore, ProviderResult};

use crate::calls::bounded;

const STYLE_PREFIX: &str = "pnt style";

/// Image prompt for a scene's first frame.
///
/// Trigger words take fixed positions: `<character> in a <environment>
/// with <object>`. A role that was not selected contributes nothing.
pub fn frame_prompt(scene: &SceneDescriptor, selection: &IdentitySelection) -> String {
    let mut subject = vec![STYLE_PREFIX.to_string()];
    if let Some(character) = selection.trigger_for(IdentityRole::Character) {
        subject.push(character.to_string());
    }
    if let Some(environment) = selection.trigger_for(IdentityRole::Environment) {
        subject.push(format!("in a {}", environment));
    }
    if let Some(object) = selection.trigger_for(IdentityRole::Object) {
        subject.push(format!("with {}", object));
    }

    format!(
        "{}. {}. {}. Camera: {}.",
        subject.join(" "),
        scene.environment_description.trim().trim_end_matches('.'),
        scene.movement_description.trim().trim_end_matches('.'),
        scene.camera_instruction.trim().trim_end_matches('.'),
    )
}

/// Renders one identity-conditioned first frame per scene.
pub struct FrameStage {
    generator: Arc<dyn FrameGenerator>,
    store: Arc<dyn MediaStore>,
    lora_scale: f64,
    call_timeout: Duration,
}

impl FrameStage {
    pub fn new(generator: Arc<dyn FrameGenerator>, store: Arc<dyn MediaStore>) -> Self {
        Self {
            generator,
            store,
            lora_scale: 1.0,
            call_timeout: Duration::from_secs(600),
        }
    }

    pub fn with_lora_scale(mut self, scale: f64) -> Self {
        self.lora_scale = scale;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Generate the first frame for `scene` and keep a local copy in `scene_dir`.
    pub async fn generate(
        &self,
        scene: &SceneDescriptor,
        selection: &IdentitySelection,
        scene_dir: &Path,
    ) -> ProviderResult<FirstFrame> {
        let used = selection.ordered();
        let request = FrameRequest {
            prompt: frame_prompt(scene, selection),
            loras: used
                .iter()
                .map(|m| LoraWeight {
                    path: m.remote_handle.clone(),
                    scale: self.lora_scale,
                })
                .collect(),
            image_size: DEFAULT_IMAGE_SIZE.to_string(),
        };

        let image = bounded(self.call_timeout, self.generator.generate_frame(&request)).await?;
        info!(scene_index = scene.index, "Generated first frame");

        // The remote URL is what the video backend consumes; the local copy is an artifact only.
        let local = scene_dir.join("first_frame.jpg");
        let local_path = match bounded(self.call_timeout, self.store.download(&image.url, &local)).await {
            Ok(()) => Some(local),
            Err(e) => {
                warn!(scene_index = scene.index, "Could not keep a local copy of the first frame: {}", e);
                None
            }
        };

        Ok(FirstFrame {
            scene_index: scene.index,
            image_reference: image.url,
            identity_models_used: used.into_iter().cloned().collect(),
            prompt: request.prompt,
            local_path,
        })
    }
}
