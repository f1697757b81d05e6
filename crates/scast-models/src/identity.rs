//! Identity models (trained LoRA adapters) and selections.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ModelError;

/// The role an identity model plays in a generated frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum IdentityRole {
    /// A person; always present in a generation run
    Character,
    /// A place or setting
    Environment,
    /// A prop or product
    Object,
}

impl IdentityRole {
    pub const ALL: &'static [IdentityRole] = &[
        IdentityRole::Character,
        IdentityRole::Environment,
        IdentityRole::Object,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityRole::Character => "character",
            IdentityRole::Environment => "environment",
            IdentityRole::Object => "object",
        }
    }
}

impl fmt::Display for IdentityRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for IdentityRole {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "character" | "char" => Ok(IdentityRole::Character),
            "environment" | "env" => Ok(IdentityRole::Environment),
            "object" | "obj" => Ok(IdentityRole::Object),
            _ => Err(ModelError::UnknownRole(s.to_string())),
        }
    }
}

/// A trained identity model.
///
/// Immutable once created. Later generation requests reference it by
/// trigger word and never modify it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct IdentityModel {
    /// Token inserted into prompts to activate the model (unique per role)
    pub trigger_word: String,

    /// What the model depicts
    pub role: IdentityRole,

    /// Opaque handle returned by the training service (LoRA weights URL)
    pub remote_handle: String,

    /// When training completed
    pub created_at: DateTime<Utc>,
}

impl IdentityModel {
    pub fn new(
        trigger_word: impl Into<String>,
        role: IdentityRole,
        remote_handle: impl Into<String>,
    ) -> Self {
        Self {
            trigger_word: trigger_word.into(),
            role,
            remote_handle: remote_handle.into(),
            created_at: Utc::now(),
        }
    }
}

/// The identity models chosen for one generation run.
///
/// The character is mandatory; environment and object are optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct IdentitySelection {
    pub character: IdentityModel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<IdentityModel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object: Option<IdentityModel>,
}

impl IdentitySelection {
    pub fn new(character: IdentityModel) -> Self {
        Self {
            character,
            environment: None,
            object: None,
        }
    }

    pub fn with_environment(mut self, model: IdentityModel) -> Self {
        self.environment = Some(model);
        self
    }

    pub fn with_object(mut self, model: IdentityModel) -> Self {
        self.object = Some(model);
        self
    }

    /// Selected models in fixed role order: character, environment, object.
    pub fn ordered(&self) -> Vec<&IdentityModel> {
        let mut models = vec![&self.character];
        models.extend(self.environment.as_ref());
        models.extend(self.object.as_ref());
        models
    }

    /// Trigger word for a role, if that role was selected.
    pub fn trigger_for(&self, role: IdentityRole) -> Option<&str> {
        match role {
            IdentityRole::Character => Some(self.character.trigger_word.as_str()),
            IdentityRole::Environment => self.environment.as_ref().map(|m| m.trigger_word.as_str()),
            IdentityRole::Object => self.object.as_ref().map(|m| m.trigger_word.as_str()),
        }
    }
}
