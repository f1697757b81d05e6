//! File-backed registry of trained identity models.
//!
//! Layout: `<dir>/<role>/<trigger_word>.json`, one record per model. The
//! registry is loaded once when a run starts and handed to generation as a
//! shared reference; only the training flow appends to it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use scast_models::{IdentityModel, IdentityRole, IdentitySelection};

use crate::error::{PipelineError, PipelineResult};

/// Trained identity models keyed by role and trigger word.
#[derive(Debug, Clone)]
pub struct IdentityRegistry {
    dir: PathBuf,
    models: BTreeMap<(IdentityRole, String), IdentityModel>,
}

impl IdentityRegistry {
    /// Load every record under `dir`. A missing directory yields an empty registry.
    pub async fn load(dir: impl Into<PathBuf>) -> PipelineResult<Self> {
        let dir = dir.into();
        let mut models = BTreeMap::new();

        for role in IdentityRole::ALL {
            let role_dir = dir.join(role.as_str());
            let mut entries = match tokio::fs::read_dir(&role_dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }

                let bytes = tokio::fs::read(&path).await?;
                let model: IdentityModel = match serde_json::from_slice(&bytes) {
                    Ok(model) => model,
                    Err(e) => {
                        warn!(path = %path.display(), "Skipping unreadable identity record: {}", e);
                        continue;
                    }
                };

                if model.role != *role {
                    warn!(
                        path = %path.display(),
                        "Identity record role {} does not match its folder",
                        model.role
                    );
                    continue;
                }

                models.insert((model.role, model.trigger_word.clone()), model);
            }
        }

        info!(dir = %dir.display(), count = models.len(), "Loaded identity registry");
        Ok(Self { dir, models })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn get(&self, role: IdentityRole, trigger_word: &str) -> Option<&IdentityModel> {
        self.models.get(&(role, trigger_word.to_string()))
    }

    pub fn contains(&self, role: IdentityRole, trigger_word: &str) -> bool {
        self.get(role, trigger_word).is_some()
    }

    /// Models for one role, ordered by trigger word.
    pub fn list(&self, role: IdentityRole) -> Vec<&IdentityModel> {
        self.models
            .values()
            .filter(|m| m.role == role)
            .collect()
    }

    /// All models, ordered by role then trigger word.
    pub fn all(&self) -> impl Iterator<Item = &IdentityModel> {
        self.models.values()
    }

    fn require(&self, role: IdentityRole, trigger_word: &str) -> PipelineResult<IdentityModel> {
        self.get(role, trigger_word)
            .cloned()
            .ok_or_else(|| PipelineError::UnknownIdentity {
                role,
                trigger_word: trigger_word.to_string(),
            })
    }

    /// Resolve trigger words into a selection for one run.
    pub fn select(
        &self,
        character: &str,
        environment: Option<&str>,
        object: Option<&str>,
    ) -> PipelineResult<IdentitySelection> {
        let mut selection = IdentitySelection::new(self.require(IdentityRole::Character, character)?);
        if let Some(trigger) = environment {
            selection = selection.with_environment(self.require(IdentityRole::Environment, trigger)?);
        }
        if let Some(trigger) = object {
            selection = selection.with_object(self.require(IdentityRole::Object, trigger)?);
        }
        Ok(selection)
    }

    /// Persist and add a newly trained model.
    ///
    /// Trigger words are unique per role; registering an existing one fails
    /// and leaves the stored record untouched.
    pub async fn register(&mut self, model: IdentityModel) -> PipelineResult<()> {
        validate_trigger_word(&model.trigger_word)?;

        if self.contains(model.role, &model.trigger_word) {
            return Err(PipelineError::DuplicateIdentity {
                role: model.role,
                trigger_word: model.trigger_word,
            });
        }

        let role_dir = self.dir.join(model.role.as_str());
        tokio::fs::create_dir_all(&role_dir).await?;

        let path = role_dir.join(format!("{}.json", model.trigger_word));
        let json = serde_json::to_vec_pretty(&model)?;
        tokio::fs::write(&path, json).await?;

        debug!(path = %path.display(), "Wrote identity record");
        info!(role = %model.role, trigger_word = %model.trigger_word, "Registered identity model");

        self.models
            .insert((model.role, model.trigger_word.clone()), model);
        Ok(())
    }
}

/// Trigger words double as file names.
pub fn validate_trigger_word(trigger_word: &str) -> PipelineResult<()> {
    let valid = !trigger_word.is_empty()
        && trigger_word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(PipelineError::registry(format!(
            "trigger word must be non-empty ASCII letters, digits, '_' or '-': {:?}",
            trigger_word
        )))
    }
}
