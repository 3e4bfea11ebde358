//! Pipeline configuration loaded from TOML, with env-var overrides for
//! path and thresholds. API keys are resolved from the environment when
//! the file says `"ENV"` so no secret ever lives in the repo.

use std::{env, fs, path::PathBuf};

use serde::Deserialize;

pub const DEFAULT_CONFIG_PATH: &str = "config/pipeline.toml";
pub const ENV_CONFIG_PATH: &str = "GAP_PIPELINE_CONFIG_PATH";
pub const ENV_UNIQUENESS_THRESHOLD: &str = "GAP_UNIQUENESS_THRESHOLD";

pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_BRAVE_API_KEY: &str = "BRAVE_SEARCH_API_KEY";

fn default_uniqueness_threshold() -> f64 {
    0.62
}
fn default_min_usable_results() -> usize {
    5
}
fn default_max_results() -> usize {
    15
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_top_gaps() -> usize {
    3
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub selection: SelectionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    /// When false, the pipeline runs in the deterministic template mode.
    pub enabled: bool,
    /// Currently only "openai".
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// "ENV" means: read from OPENAI_API_KEY.
    pub api_key: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: "openai".into(),
            model: default_model(),
            api_key: "ENV".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Currently only "brave".
    pub provider: String,
    /// "ENV" means: read from BRAVE_SEARCH_API_KEY.
    pub api_key: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: "brave".into(),
            api_key: "ENV".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectionConfig {
    #[serde(default = "default_uniqueness_threshold")]
    pub uniqueness_threshold: f64,
    #[serde(default = "default_min_usable_results")]
    pub min_usable_results: usize,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// How many top-scored gaps feed the candidate generator.
    #[serde(default = "default_top_gaps")]
    pub top_gaps: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            uniqueness_threshold: default_uniqueness_threshold(),
            min_usable_results: default_min_usable_results(),
            max_results: default_max_results(),
            top_gaps: default_top_gaps(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            generation: GenerationConfig::default(),
            search: SearchConfig::default(),
            selection: SelectionConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load from GAP_PIPELINE_CONFIG_PATH or the default path, then apply
    /// env overrides and sanitize.
    pub fn from_toml() -> anyhow::Result<Self> {
        let path = env::var(ENV_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        let content = fs::read_to_string(&path).map_err(|e| {
            anyhow::anyhow!("failed to read pipeline config at {}: {}", path.display(), e)
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(toml_str: &str) -> anyhow::Result<Self> {
        let mut cfg: PipelineConfig = toml::from_str(toml_str)?;
        cfg.generation.provider = cfg.generation.provider.to_lowercase();
        cfg.search.provider = cfg.search.provider.to_lowercase();

        if let Some(t) = parse_threshold_env(env::var(ENV_UNIQUENESS_THRESHOLD).ok()) {
            cfg.selection.uniqueness_threshold = t;
        }
        cfg.sanitize();
        Ok(cfg)
    }

    fn sanitize(&mut self) {
        if !(0.0..=1.0).contains(&self.selection.uniqueness_threshold)
            || !self.selection.uniqueness_threshold.is_finite()
        {
            self.selection.uniqueness_threshold = default_uniqueness_threshold();
        }
        if self.selection.max_results == 0 {
            self.selection.max_results = default_max_results();
        }
        if self.selection.min_usable_results > self.selection.max_results {
            std::mem::swap(
                &mut self.selection.min_usable_results,
                &mut self.selection.max_results,
            );
        }
        if self.selection.top_gaps == 0 {
            self.selection.top_gaps = default_top_gaps();
        }
    }

    /// Resolve the generation API key. Errors are configuration failures:
    /// surfaced immediately, never retried.
    pub fn generation_api_key(&self) -> anyhow::Result<String> {
        resolve_key(&self.generation.api_key, ENV_OPENAI_API_KEY)
    }

    /// Resolve the search API key. Absence is tolerated by the search
    /// client (it returns empty result lists), so this returns Option.
    pub fn search_api_key(&self) -> Option<String> {
        if self.search.api_key.trim().eq_ignore_ascii_case("env") {
            env::var(ENV_BRAVE_API_KEY).ok().filter(|k| !k.is_empty())
        } else {
            Some(self.search.api_key.clone()).filter(|k| !k.is_empty())
        }
    }
}

fn resolve_key(raw: &str, env_name: &str) -> anyhow::Result<String> {
    if raw.trim().eq_ignore_ascii_case("env") {
        env::var(env_name).map_err(|_| anyhow::anyhow!("missing {env_name} env var"))
    } else {
        Ok(raw.to_string())
    }
}

// parse optional float env and clamp to <0.0..=1.0>
fn parse_threshold_env(raw: Option<String>) -> Option<f64> {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .map(|v| v.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const TEST_TOML: &str = r#"
[generation]
enabled = true
provider = "OpenAI"
api_key = "ENV"

[search]
provider = "brave"
api_key = "ENV"

[selection]
uniqueness_threshold = 1.7
min_usable_results = 20
max_results = 10
"#;

    #[test]
    #[serial]
    fn sanitize_clamps_and_swaps() {
        std::env::remove_var(ENV_UNIQUENESS_THRESHOLD);
        let cfg = PipelineConfig::from_toml_str(TEST_TOML).unwrap();
        assert_eq!(cfg.generation.provider, "openai");
        // out-of-range threshold falls back to the default
        assert!((cfg.selection.uniqueness_threshold - 0.62).abs() < 1e-9);
        // inverted bounds are swapped
        assert_eq!(cfg.selection.min_usable_results, 10);
        assert_eq!(cfg.selection.max_results, 20);
    }

    #[test]
    #[serial]
    fn env_threshold_override_wins() {
        std::env::set_var(ENV_UNIQUENESS_THRESHOLD, "0.5");
        let cfg = PipelineConfig::from_toml_str(TEST_TOML).unwrap();
        std::env::remove_var(ENV_UNIQUENESS_THRESHOLD);
        assert!((cfg.selection.uniqueness_threshold - 0.5).abs() < 1e-9);
    }

    #[test]
    #[serial]
    fn missing_generation_key_is_an_error() {
        std::env::remove_var(ENV_OPENAI_API_KEY);
        let cfg = PipelineConfig::default();
        assert!(cfg.generation_api_key().is_err());
    }

    #[test]
    #[serial]
    fn missing_search_key_is_tolerated() {
        std::env::remove_var(ENV_BRAVE_API_KEY);
        let cfg = PipelineConfig::default();
        assert!(cfg.search_api_key().is_none());
    }
}
