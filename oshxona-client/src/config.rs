use std::path::Path;

use anyhow::{Context, Result};
use oshxona::Language;
use serde::Deserialize;

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub model: ModelConfig,
    pub storage: StorageConfig,
    pub voice: VoiceConfig,
    pub language: Language,
}

impl Config {
    /// Load the configuration from a YAML file.
    pub fn load(yml_path: &str) -> Result<Self> {
        let yml = std::fs::read_to_string(yml_path)?;
        let config = serde_yaml::from_str(&yml)?;
        Ok(config)
    }

    /// Load the configuration if the file exists, defaults otherwise.
    pub fn load_or_default(yml_path: &str) -> Result<Self> {
        if Path::new(yml_path).exists() {
            Self::load(yml_path).with_context(|| format!("Loading config from {yml_path}"))
        } else {
            tracing::debug!("No config at {}, using defaults", yml_path);
            Ok(Self::default())
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub base_url: String,
    pub vision_model: String,
    pub recipe_model: String,
    pub request_timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta".into(),
            vision_model: "gemini-3-flash-preview".into(),
            recipe_model: "gemini-3-flash-preview".into(),
            request_timeout_secs: 90,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite file holding the cookbook blob. `None` keeps it in memory.
    pub path: Option<String>,
    pub key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: Some("data/oshxona.db".into()),
            key: "oshxona_malikasi_cookbook".into(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    pub live_model: String,
    pub live_url: String,
    pub recorder: String,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            live_model: "gemini-2.5-flash-native-audio-preview-12-2025".into(),
            live_url: "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent".into(),
            recorder: "rec".into(),
        }
    }
}

/// The model API key, from the environment or `.env`.
pub fn api_key() -> Result<String> {
    dotenvy::var("GEMINI_API_KEY")
        .or_else(|_| dotenvy::var("API_KEY"))
        .context("Could not find GEMINI_API_KEY or API_KEY in the environment.")
}
