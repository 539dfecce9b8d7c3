use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::error::ClassifiedError;
use crate::scoring::WeightingStrategy;

/// Run configuration, resolved once at process start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub provider: String,
    pub model: String,
    pub api_base: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub temperature: f32,
    pub batch_size: usize,
    /// Comments ranked above this (by likes) get the rich schema.
    pub rich_tier_threshold: usize,
    /// Batches in flight per window.
    pub concurrency: usize,
    pub window_delay_ms: u64,
    pub request_timeout_secs: u64,
    pub max_comment_tokens: usize,
    pub max_response_tokens: u32,
    pub weighting: WeightingStrategy,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            provider: "openai".into(),
            model: "gpt-4o-mini".into(),
            api_base: "https://api.openai.com/v1".into(),
            api_key_env: "OPENAI_API_KEY".into(),
            temperature: 0.0,
            batch_size: 25,
            rich_tier_threshold: 200,
            concurrency: 4,
            window_delay_ms: 500,
            request_timeout_secs: 90,
            max_comment_tokens: 200,
            max_response_tokens: 8192,
            weighting: WeightingStrategy::default(),
        }
    }
}

impl AnalysisConfig {
    /// Load from a YAML file; missing keys take defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Reading config {}", path.display()))?;
        let config: AnalysisConfig = serde_yaml::from_str(&raw)
            .with_context(|| format!("Parsing config {}", path.display()))?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// `path` if given, else `STANCE_CONFIG`, else defaults.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        if let Some(p) = path {
            return Self::load(p);
        }
        match std::env::var("STANCE_CONFIG") {
            Ok(p) if !p.trim().is_empty() => Self::load(Path::new(&p)),
            _ => {
                debug!("No config file given, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn validate(&self) -> std::result::Result<(), ClassifiedError> {
        if self.batch_size == 0 {
            return Err(ClassifiedError::Config("batch_size must be at least 1".into()));
        }
        if self.concurrency == 0 {
            return Err(ClassifiedError::Config("concurrency must be at least 1".into()));
        }
        if !self.weighting.damping.is_finite() || self.weighting.damping < 0.0 {
            return Err(ClassifiedError::Config(
                "weighting.damping must be a non-negative number".into(),
            ));
        }
        if !self.weighting.divisor.is_finite() || self.weighting.divisor <= 0.0 {
            return Err(ClassifiedError::Config("weighting.divisor must be positive".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(ClassifiedError::Config(
                "request_timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn window_delay(&self) -> Duration {
        Duration::from_millis(self.window_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
