use std::env;
use std::time::Duration;

use anyhow::{bail, Result};
use lazora_contracts::payload::DEFAULT_PAYLOAD_CEILING_BYTES;

use crate::normalizer::NormalizerConfig;

pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image-preview";
const API_KEY_VARS: [&str; 3] = ["GEMINI_API_KEY", "API_KEY", "GOOGLE_API_KEY"];

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub api_key: String,
    pub api_base: String,
    pub image_model: String,
    pub request_timeout: Duration,
    pub payload_ceiling_bytes: usize,
    pub normalizer: NormalizerConfig,
}

impl EngineConfig {
    /// Reads configuration from the environment. A missing API key is fatal.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let Some(api_key) = API_KEY_VARS.iter().find_map(|key| non_empty(key)) else {
            bail!("{} not set", API_KEY_VARS.join(" or "));
        };
        let api_base = non_empty("GEMINI_API_BASE")
            .map(|value| value.trim_end_matches('/').to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_GEMINI_API_BASE.to_string());
        let image_model =
            non_empty("LAZORA_IMAGE_MODEL").unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string());
        let timeout_s = non_empty("LAZORA_REQUEST_TIMEOUT_S")
            .and_then(|raw| raw.parse::<f64>().ok())
            .filter(|value| value.is_finite())
            .map(|value| value.clamp(15.0, 300.0))
            .unwrap_or(90.0);
        let payload_ceiling_bytes = non_empty("LAZORA_PAYLOAD_CEILING_BYTES")
            .and_then(|raw| raw.parse::<usize>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_PAYLOAD_CEILING_BYTES);

        Ok(Self {
            api_key,
            api_base,
            image_model,
            request_timeout: Duration::from_secs_f64(timeout_s),
            payload_ceiling_bytes,
            normalizer: NormalizerConfig::default(),
        })
    }
}
