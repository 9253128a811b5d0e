//! Configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` +
//! `config.<env>.toml` + `APP_*` env vars (`__` separates nesting levels,
//! e.g. `APP_RETRIEVAL__TOP_K=5`).

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::chunker::ChunkingConfig;
use crate::rules::RuleSelection;
use crate::types::TermWeighting;

/// Retrieval knobs. `top_k == 0` is legal and yields empty results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub max_chunk_chars: usize,
    pub overlap_chars: usize,
    pub top_k: usize,
    pub term_weighting: TermWeighting,
    /// Memoised `retrieve` results; 0 disables the cache.
    pub cache_capacity: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { max_chunk_chars: 1000, overlap_chars: 0, top_k: 10, term_weighting: TermWeighting::RawCount, cache_capacity: 0 }
    }
}

impl RetrievalSettings {
    pub fn chunking(&self) -> ChunkingConfig {
        ChunkingConfig { max_chars: self.max_chunk_chars, overlap_chars: self.overlap_chars }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptSettings {
    pub max_rules_chars: usize,
    pub fallback_fragments: usize,
    pub shard_threshold: usize,
    pub max_shards: usize,
    pub system_prompt_path: Option<String>,
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self { max_rules_chars: 15_000, fallback_fragments: 5, shard_threshold: 8, max_shards: 4, system_prompt_path: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub rules_dir: String,
    pub reports_dir: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self { rules_dir: "rules".to_string(), reports_dir: "reports".to_string() }
    }
}

/// The typed view of every section this workspace reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub retrieval: RetrievalSettings,
    pub prompt: PromptSettings,
    pub rules: RuleSelection,
    pub data: DataSettings,
}

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.validate()?;
        Ok(config)
    }

    /// Defaults overlaid with an in-memory TOML document.
    pub fn from_toml_str(toml: &str) -> anyhow::Result<Self> {
        let figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::string(toml));
        let config = Self { figment };
        config.validate()?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// A section owned by another crate: `T::default()` overlaid with whatever
    /// the loaded layers provide under `key`.
    pub fn section<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned + Serialize + Default,
    {
        Figment::from(Serialized::defaults(T::default()))
            .merge(self.figment.focus(key))
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to extract section '{}': {}", key, e))
    }

    pub fn settings(&self) -> anyhow::Result<Settings> {
        self.figment.extract().map_err(|e| anyhow::anyhow!("Failed to extract settings: {}", e))
    }

    fn validate(&self) -> anyhow::Result<()> {
        let settings = self.settings()?;
        settings.retrieval.chunking().validate()?;
        if settings.prompt.max_shards == 0 {
            anyhow::bail!("prompt.max_shards must be > 0");
        }
        Ok(())
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
