//! Persisted model selection
//!
//! The selection lives in a shared JSON file under the `model_config` key,
//! next to settings owned by other tools, which are preserved on save.

use crate::context::registry::known_models;
use crate::error::{AssistantError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{debug, warn};

const SELECTION_KEY: &str = "model_config";

/// Current model and the models offered for selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSelection {
    #[serde(default)]
    pub available_models: Vec<String>,
    #[serde(default = "default_current_model")]
    pub current_model: String,
}

fn default_current_model() -> String {
    "gpt-4o".to_string()
}

impl Default for ModelSelection {
    fn default() -> Self {
        Self {
            available_models: known_models(),
            current_model: default_current_model(),
        }
    }
}

impl ModelSelection {
    /// Read the selection, falling back to defaults when the file is missing or unreadable
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                debug!("No model selection at {}: {}", path.display(), e);
                return Self::default();
            }
        };

        let parsed = serde_json::from_str::<Map<String, Value>>(&raw).and_then(|mut root| {
            match root.remove(SELECTION_KEY) {
                Some(value) => serde_json::from_value::<ModelSelection>(value).map(Some),
                None => Ok(None),
            }
        });

        match parsed {
            Ok(Some(mut selection)) => {
                if selection.available_models.is_empty() {
                    selection.available_models = known_models();
                }
                selection
            }
            Ok(None) => Self::default(),
            Err(e) => {
                warn!("Invalid model selection file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Write the selection, keeping any other keys already in the file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut root = std::fs::read_to_string(path)
            .ok()
            .and_then(|raw| serde_json::from_str::<Map<String, Value>>(&raw).ok())
            .unwrap_or_default();

        root.insert(SELECTION_KEY.to_string(), serde_json::to_value(self)?);
        std::fs::write(path, serde_json::to_string_pretty(&root)?)?;

        debug!("Saved model selection '{}' to {}", self.current_model, path.display());
        Ok(())
    }

    /// Switch the current model
    pub fn select(&mut self, model: &str) -> Result<()> {
        if !self.available_models.is_empty() && !self.available_models.iter().any(|m| m == model) {
            return Err(AssistantError::InvalidInput(format!(
                "Model '{}' is not available; choose one of: {}",
                model,
                self.available_models.join(", ")
            )));
        }

        self.current_model = model.to_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path() -> std::path::PathBuf {
        std::env::temp_dir().join(format!("model-selection-{}.json", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_missing_file_defaults() {
        let selection = ModelSelection::load(temp_path());
        assert_eq!(selection.current_model, "gpt-4o");
        assert!(selection.available_models.contains(&"o3-mini".to_string()));
    }

    #[test]
    fn test_invalid_file_defaults() {
        let path = temp_path();
        std::fs::write(&path, "{ not json").unwrap();
        let selection = ModelSelection::load(&path);
        std::fs::remove_file(&path).ok();
        assert_eq!(selection, ModelSelection::default());
    }

    #[test]
    fn test_save_and_load_preserves_other_keys() {
        let path = temp_path();
        std::fs::write(&path, r#"{"prompts": {"agent": "be helpful"}}"#).unwrap();

        let mut selection = ModelSelection::default();
        selection.select("o1").unwrap();
        selection.save(&path).unwrap();

        let loaded = ModelSelection::load(&path);
        assert_eq!(loaded.current_model, "o1");

        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(raw["prompts"]["agent"], "be helpful");
        assert_eq!(raw["model_config"]["current_model"], "o1");
    }

    #[test]
    fn test_select_unavailable_model() {
        let mut selection = ModelSelection {
            available_models: vec!["gpt-4o".to_string()],
            current_model: "gpt-4o".to_string(),
        };
        let result = selection.select("o1");
        assert!(matches!(result, Err(AssistantError::InvalidInput(_))));
        assert_eq!(selection.current_model, "gpt-4o");
    }
}
