use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub registry: RegistryConfig,
    pub store: StoreConfig,
    pub source: SourceConfig,
    #[serde(default)]
    pub analysis: Option<AnalysisConfig>,
    pub chunking: ChunkingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RegistryConfig {
    /// Path to the SQLite file backing the registry and cursor tables.
    pub db_path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// Root directory of the object store.
    pub root: PathBuf,
    /// Key prefix for raw source objects.
    #[serde(default = "default_source_prefix")]
    pub source_prefix: String,
    /// Key prefix for twin JSON artifacts.
    #[serde(default = "default_twin_prefix")]
    pub twin_prefix: String,
}

fn default_source_prefix() -> String {
    "source".to_string()
}
fn default_twin_prefix() -> String {
    "extracted".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    /// Base URL of the change-feed service.
    pub base_url: String,
    /// Partitions (drives / libraries) to sync.
    pub partitions: Vec<String>,
    /// Items whose remote path contains any of these substrings are
    /// dropped during sync. Matching is case-sensitive.
    #[serde(default)]
    pub excluded_folders: Vec<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_max_retries() -> u32 {
    5
}
fn default_base_delay_ms() -> u64 {
    1000
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnalysisConfig {
    /// Base URL of the heavy-analysis (OCR/layout) service.
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

fn default_max_chars() -> usize {
    2048
}
fn default_overlap_chars() -> usize {
    200
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate chunking
    if config.chunking.max_chars == 0 {
        anyhow::bail!("chunking.max_chars must be > 0");
    }
    if config.chunking.overlap_chars >= config.chunking.max_chars {
        anyhow::bail!("chunking.overlap_chars must be less than chunking.max_chars");
    }

    // Validate store prefixes
    if config.store.source_prefix.is_empty() || config.store.twin_prefix.is_empty() {
        anyhow::bail!("store.source_prefix and store.twin_prefix must be non-empty");
    }
    if config.store.source_prefix == config.store.twin_prefix {
        anyhow::bail!("store.source_prefix and store.twin_prefix must differ");
    }
    if config.store.source_prefix.contains('/') || config.store.twin_prefix.contains('/') {
        anyhow::bail!("store prefixes must be single path segments (no '/')");
    }

    // Validate source
    if config.source.partitions.is_empty() {
        anyhow::bail!("source.partitions must list at least one partition");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("twindex.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    const VALID: &str = r#"
[registry]
db_path = "./data/twindex.sqlite"

[store]
root = "./data/objects"

[source]
base_url = "http://localhost:8900"
partitions = ["hr-policies"]
excluded_folders = ["Drafts", "drafts"]

[chunking]
max_chars = 512
overlap_chars = 50
"#;

    #[test]
    fn parses_valid_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), VALID);
        let config = load_config(&path).unwrap();
        assert_eq!(config.store.source_prefix, "source");
        assert_eq!(config.store.twin_prefix, "extracted");
        assert_eq!(config.source.max_retries, 5);
        assert_eq!(config.chunking.max_chars, 512);
        assert!(config.analysis.is_none());
    }

    #[test]
    fn rejects_overlap_not_less_than_max() {
        let dir = tempfile::tempdir().unwrap();
        let body = VALID.replace("overlap_chars = 50", "overlap_chars = 512");
        let path = write_config(dir.path(), &body);
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn rejects_equal_prefixes() {
        let dir = tempfile::tempdir().unwrap();
        let body = VALID.replace(
            "root = \"./data/objects\"",
            "root = \"./data/objects\"\nsource_prefix = \"x\"\ntwin_prefix = \"x\"",
        );
        let path = write_config(dir.path(), &body);
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn rejects_empty_partitions() {
        let dir = tempfile::tempdir().unwrap();
        let body = VALID.replace("partitions = [\"hr-policies\"]", "partitions = []");
        let path = write_config(dir.path(), &body);
        assert!(load_config(&path).is_err());
    }
}
