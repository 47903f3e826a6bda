//! User settings persistence.
//!
//! This module handles loading and saving user preferences,
//! including model selection, the default style request and an
//! API-key override.

use crate::error::Result;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Gemini models selectable for diagnosis and product search.
pub const AVAILABLE_TEXT_MODELS: &[&str] = &[
    "gemini-2.5-pro",
    "gemini-flash-latest",
    "gemini-flash-lite-latest",
];

/// Gemini models selectable for makeup synthesis (inline image output).
pub const AVAILABLE_IMAGE_MODELS: &[&str] = &[
    "gemini-2.5-flash-image",
    "gemini-2.0-flash-preview-image-generation",
];

/// User-configurable settings persisted between sessions.
///
/// Settings are stored as JSON in the user's config directory
/// (e.g., `~/.config/glowup/settings.json` on Linux).
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Selected model for diagnosis and product search.
    pub text_model: String,
    /// Selected model for makeup synthesis.
    pub image_model: String,
    /// Style request pre-filled when the user hasn't typed one.
    #[serde(default)]
    pub default_style: String,
    /// API key override (takes precedence over environment).
    #[serde(default)]
    pub api_key: String,
}

impl Settings {
    /// Returns the path to the settings file.
    ///
    /// Creates the config directory if it doesn't exist.
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "glowup", "glowup").map(|dirs| {
            let config_dir = dirs.config_dir();
            if !config_dir.exists() {
                let _ = fs::create_dir_all(config_dir);
            }
            config_dir.join("settings.json")
        })
    }

    /// Loads settings from disk, falling back to defaults if not found.
    ///
    /// # Arguments
    /// * `text_model` - Model to use if no settings file exists.
    /// * `image_model` - Synthesis model to use if no settings file exists.
    pub fn load(text_model: &str, image_model: &str) -> Self {
        Self::config_path()
            .and_then(|path| fs::read_to_string(&path).ok())
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_else(|| Self::with_defaults(text_model, image_model))
    }

    /// Creates default settings with the specified models.
    pub fn with_defaults(text_model: &str, image_model: &str) -> Self {
        Self {
            text_model: text_model.to_string(),
            image_model: image_model.to_string(),
            default_style: String::new(),
            api_key: String::new(),
        }
    }

    /// Persists settings to disk.
    ///
    /// # Errors
    /// Returns an error if serialization or file writing fails.
    pub fn save(&self) -> Result<()> {
        if let Some(path) = Self::config_path() {
            let json = serde_json::to_string_pretty(self)?;
            fs::write(path, json)?;
        }
        Ok(())
    }

    /// Returns whether the API key is set (either from settings or will use env).
    pub fn has_api_key(&self) -> bool {
        !self.api_key.is_empty()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::with_defaults("gemini-flash-latest", "gemini-2.5-flash-image")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_carry_the_requested_models() {
        let settings = Settings::with_defaults("gemini-2.5-pro", "gemini-2.5-flash-image");
        assert_eq!(settings.text_model, "gemini-2.5-pro");
        assert_eq!(settings.image_model, "gemini-2.5-flash-image");
        assert!(settings.default_style.is_empty());
        assert!(!settings.has_api_key());
    }

    #[test]
    fn settings_survive_a_serde_round_trip() {
        let mut settings = Settings::default();
        settings.default_style = "soft coquette pink".into();
        settings.api_key = "k".into();

        let json = serde_json::to_string(&settings).unwrap();
        let restored: Settings = serde_json::from_str(&json).unwrap();
        assert!(restored == settings);
    }

    #[test]
    fn older_settings_files_without_new_fields_still_parse() {
        let json = r#"{"text_model": "gemini-flash-latest", "image_model": "gemini-2.5-flash-image"}"#;
        let restored: Settings = serde_json::from_str(json).unwrap();
        assert!(restored.default_style.is_empty());
        assert!(restored.api_key.is_empty());
    }
}
