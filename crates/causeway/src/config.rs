use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use causeway_core::rebalance::RebalanceParams;
use causeway_core::score::RelevanceWeights;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub feeds: FeedsConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

/// Chat-completion settings for the relevance gate and urgency scorer.
#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_relevance_model")]
    pub relevance_model: String,
    #[serde(default = "default_urgency_model")]
    pub urgency_model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            relevance_model: default_relevance_model(),
            urgency_model: default_urgency_model(),
            temperature: default_temperature(),
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

impl LlmConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_relevance_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_urgency_model() -> String {
    "gpt-3.5-turbo".to_string()
}
fn default_temperature() -> f64 {
    0.3
}

/// Matching and rebalancing tuning.
#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    /// Number of categories matched per article or concern.
    #[serde(default = "default_category_top_k")]
    pub category_top_k: usize,
    /// Number of charity candidates fetched per article.
    #[serde(default = "default_charity_top_k")]
    pub charity_top_k: usize,
    /// Urgency used when the LLM reply cannot be parsed.
    #[serde(default = "default_urgency_fallback")]
    pub default_urgency: f64,
    #[serde(default = "default_min_relevance")]
    pub min_relevance: f64,
    #[serde(default = "default_max_holdings")]
    pub max_holdings: usize,
    #[serde(default = "default_base_shift")]
    pub base_shift: f64,
    #[serde(default = "default_min_pct")]
    pub min_pct: u32,
    #[serde(default = "default_disburse_urgency")]
    pub disburse_urgency: f64,
    #[serde(default = "default_weight_similarity")]
    pub weight_similarity: f64,
    #[serde(default = "default_weight_urgency")]
    pub weight_urgency: f64,
    #[serde(default = "default_weight_confidence")]
    pub weight_confidence: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            category_top_k: default_category_top_k(),
            charity_top_k: default_charity_top_k(),
            default_urgency: default_urgency_fallback(),
            min_relevance: default_min_relevance(),
            max_holdings: default_max_holdings(),
            base_shift: default_base_shift(),
            min_pct: default_min_pct(),
            disburse_urgency: default_disburse_urgency(),
            weight_similarity: default_weight_similarity(),
            weight_urgency: default_weight_urgency(),
            weight_confidence: default_weight_confidence(),
        }
    }
}

impl EngineConfig {
    pub fn rebalance_params(&self) -> RebalanceParams {
        RebalanceParams {
            min_relevance: self.min_relevance,
            max_holdings: self.max_holdings,
            base_shift: self.base_shift,
            min_pct: self.min_pct,
            disburse_urgency: self.disburse_urgency,
        }
    }

    pub fn relevance_weights(&self) -> RelevanceWeights {
        RelevanceWeights {
            similarity: self.weight_similarity,
            urgency: self.weight_urgency,
            confidence: self.weight_confidence,
        }
    }
}

fn default_category_top_k() -> usize {
    3
}
fn default_charity_top_k() -> usize {
    5
}
fn default_urgency_fallback() -> f64 {
    5.0
}
fn default_min_relevance() -> f64 {
    0.55
}
fn default_max_holdings() -> usize {
    6
}
fn default_base_shift() -> f64 {
    0.3
}
fn default_min_pct() -> u32 {
    2
}
fn default_disburse_urgency() -> f64 {
    8.0
}
fn default_weight_similarity() -> f64 {
    0.5
}
fn default_weight_urgency() -> f64 {
    0.3
}
fn default_weight_confidence() -> f64 {
    0.2
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedsConfig {
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default = "default_poll_secs")]
    pub poll_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for FeedsConfig {
    fn default() -> Self {
        Self {
            urls: Vec::new(),
            poll_secs: default_poll_secs(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_poll_secs() -> u64 {
    300
}

/// Contract-wrapper bridge settings. When `base_url` is unset the engine
/// runs chain-free: plans are mirrored locally but never committed.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct BridgeConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl BridgeConfig {
    pub fn is_enabled(&self) -> bool {
        self.base_url.is_some()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7420".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.engine.category_top_k == 0 {
        anyhow::bail!("engine.category_top_k must be >= 1");
    }
    if config.engine.charity_top_k == 0 {
        anyhow::bail!("engine.charity_top_k must be >= 1");
    }
    if config.engine.max_holdings == 0 {
        anyhow::bail!("engine.max_holdings must be >= 1");
    }
    if !(0.0..=1.0).contains(&config.engine.base_shift) {
        anyhow::bail!("engine.base_shift must be in [0.0, 1.0]");
    }
    if !(0.0..=1.0).contains(&config.engine.min_relevance) {
        anyhow::bail!("engine.min_relevance must be in [0.0, 1.0]");
    }
    if !(1.0..=10.0).contains(&config.engine.disburse_urgency) {
        anyhow::bail!("engine.disburse_urgency must be in [1.0, 10.0]");
    }

    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    match config.llm.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!("Unknown llm provider: '{}'. Must be disabled or openai.", other),
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(body.as_bytes()).unwrap();
        f
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let f = write_config("[db]\npath = \"/tmp/causeway.sqlite\"\n");
        let cfg = load_config(f.path()).unwrap();
        assert!(!cfg.embedding.is_enabled());
        assert!(!cfg.llm.is_enabled());
        assert!(!cfg.bridge.is_enabled());
        assert_eq!(cfg.engine.category_top_k, 3);
        assert_eq!(cfg.engine.charity_top_k, 5);
        assert_eq!(cfg.feeds.poll_secs, 300);
    }

    #[test]
    fn test_enabled_embedding_requires_model_and_dims() {
        let f = write_config(
            "[db]\npath = \"/tmp/causeway.sqlite\"\n[embedding]\nprovider = \"openai\"\n",
        );
        assert!(load_config(f.path()).is_err());
    }

    #[test]
    fn test_rejects_unknown_provider() {
        let f = write_config(
            "[db]\npath = \"/tmp/db\"\n[embedding]\nprovider = \"cohere\"\nmodel = \"m\"\ndims = 8\n",
        );
        assert!(load_config(f.path()).is_err());
    }

    #[test]
    fn test_rejects_out_of_range_shift() {
        let f = write_config("[db]\npath = \"/tmp/db\"\n[engine]\nbase_shift = 1.5\n");
        assert!(load_config(f.path()).is_err());
    }
}
