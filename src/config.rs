//! TOML configuration.
//!
//! Every section is optional and falls back to the pipeline defaults, so an
//! empty file is a valid configuration. [`load_config`] parses and then
//! validates; [`Config::minimal`] gives the all-default configuration for
//! commands run without a file.
//!
//! ```toml
//! [cache]
//! path = "./data/taxctx.sqlite"
//!
//! [fetch]
//! timeout_secs = 30
//! max_bytes = 52428800
//! retries = 2
//!
//! [chunking]
//! target_tokens = 600
//! min_tokens = 500
//! max_tokens = 800
//!
//! [retrieval]
//! limit = 5
//! anchor_terms = ["tax", "nigeria"]
//! reference_values = ["7.5%"]
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use taxlaw_context_core::chunk::ChunkLimits;
use taxlaw_context_core::detect::DetectionConfig;
use taxlaw_context_core::normalize::NormalizeConfig;
use taxlaw_context_core::search::RetrievalConfig;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub cache: CacheConfig,
    pub fetch: FetchConfig,
    pub normalize: NormalizeConfig,
    pub detection: DetectionConfig,
    pub chunking: ChunkLimits,
    pub retrieval: RetrievalConfig,
}

/// Persisted document cache. Without a path, ingestions live only in memory.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct CacheConfig {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
    /// Extra attempts after a retryable network failure.
    #[serde(default = "default_retries")]
    pub retries: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_bytes: default_max_bytes(),
            retries: default_retries(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_max_bytes() -> u64 {
    50 * 1024 * 1024
}
fn default_retries() -> u32 {
    2
}

impl Config {
    /// All-default configuration with no persisted cache.
    pub fn minimal() -> Self {
        Self::default()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    // Validate chunking
    let c = &config.chunking;
    if c.min_tokens == 0 || c.target_tokens == 0 || c.max_tokens == 0 {
        bail!("chunking token limits must be > 0");
    }
    if !(c.min_tokens <= c.target_tokens && c.target_tokens <= c.max_tokens) {
        bail!(
            "chunking limits must satisfy min_tokens <= target_tokens <= max_tokens (got {} / {} / {})",
            c.min_tokens,
            c.target_tokens,
            c.max_tokens
        );
    }
    if c.section_title_chars == 0 {
        bail!("chunking.section_title_chars must be > 0");
    }

    // Validate fetch
    if config.fetch.timeout_secs == 0 {
        bail!("fetch.timeout_secs must be > 0");
    }

    // Validate retrieval
    let r = &config.retrieval;
    if r.limit < 1 {
        bail!("retrieval.limit must be >= 1");
    }
    for (name, value) in [
        ("retrieval.min_score", r.min_score),
        ("retrieval.high_threshold", r.high_threshold),
        ("retrieval.medium_threshold", r.medium_threshold),
    ] {
        if !(0.0..=1.0).contains(&value) {
            bail!("{} must be in [0.0, 1.0]", name);
        }
    }
    if r.medium_threshold > r.high_threshold {
        bail!("retrieval.medium_threshold must be <= retrieval.high_threshold");
    }

    // Validate detection
    let d = &config.detection;
    if !(0.0..=1.0).contains(&d.heading_threshold) {
        bail!("detection.heading_threshold must be in [0.0, 1.0]");
    }
    if !(0.0..=1.0).contains(&d.font_size_score) {
        bail!("detection.font_size_score must be in [0.0, 1.0]");
    }

    // Validate normalization
    if config.normalize.line_tolerance < 0.0 {
        bail!("normalize.line_tolerance must be >= 0");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let file = write_config("");
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.chunking.max_tokens, 800);
        assert_eq!(config.retrieval.limit, 5);
        assert_eq!(config.fetch.timeout_secs, 30);
        assert_eq!(config.fetch.retries, 2);
        assert!(config.cache.path.is_none());
        assert!((config.detection.heading_threshold - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_partial_sections() {
        let file = write_config(
            r#"
[cache]
path = "/tmp/taxctx.sqlite"

[chunking]
max_tokens = 1000

[retrieval]
reference_values = ["7.5%"]
"#,
        );
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.chunking.max_tokens, 1000);
        assert_eq!(config.chunking.target_tokens, 600);
        assert_eq!(config.retrieval.reference_values, vec!["7.5%"]);
        assert_eq!(config.retrieval.anchor_terms, vec!["tax", "nigeria"]);
        assert_eq!(config.cache.path, Some(PathBuf::from("/tmp/taxctx.sqlite")));
    }

    #[test]
    fn test_rejects_inverted_chunk_limits() {
        let file = write_config("[chunking]\nmin_tokens = 900\n");
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("min_tokens <= target_tokens"));
    }

    #[test]
    fn test_rejects_bad_thresholds() {
        let file = write_config("[retrieval]\nmedium_threshold = 0.8\nhigh_threshold = 0.4\n");
        assert!(load_config(file.path()).is_err());
        let file = write_config("[retrieval]\nmin_score = 1.5\n");
        assert!(load_config(file.path()).is_err());
        let file = write_config("[fetch]\ntimeout_secs = 0\n");
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_example_config_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/taxctx.example.toml");
        let config = load_config(&path).unwrap();
        let defaults = Config::minimal();
        assert_eq!(config.retrieval.summary_terms, defaults.retrieval.summary_terms);
        assert_eq!(config.detection.heading_keywords, defaults.detection.heading_keywords);
        assert_eq!(config.chunking.section_title_chars, 50);
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/nonexistent/taxctx.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
