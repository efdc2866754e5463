//! Configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (`__` separates nested keys, e.g. `APP_SEARCH__RRF_K`). Provides helpers to
//! expand `~` and `${VAR}` and to resolve relative paths against a known base
//! directory.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::types::{default_chunk_field_boosts, default_field_boosts, FieldBoost, IdentitySpace};

pub struct Config {
    figment: Figment,
    base_dir: PathBuf,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let base_dir = env::current_dir()?;
        let config = Self { figment, base_dir };
        config.settings()?;
        Ok(config)
    }

    /// Wrap an already assembled figment; relative paths resolve against `base_dir`.
    pub fn from_figment(figment: Figment, base_dir: impl Into<PathBuf>) -> Self {
        Self { figment, base_dir: base_dir.into() }
    }

    /// Typed settings with defaults for every missing key, validated.
    pub fn settings(&self) -> anyhow::Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to read settings: {}", e))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn resolve_path<S: AsRef<str>>(&self, p: S) -> PathBuf {
        resolve_with_base(&self.base_dir, p)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub search: SearchSettings,
    pub embedding: EmbeddingSettings,
    pub data: DataSettings,
}

impl Settings {
    pub fn validate(&self) -> anyhow::Result<()> {
        self.search.validate()?;
        if self.embedding.dimension == 0 {
            anyhow::bail!("embedding.dimension must be at least 1");
        }
        if self.embedding.batch_size == 0 {
            anyhow::bail!("embedding.batch_size must be at least 1");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// RRF damping constant.
    pub rrf_k: f64,
    /// Candidates fetched per path in hybrid mode, as a multiple of the page end.
    pub overfetch_factor: usize,
    pub max_size: usize,
    pub default_size: usize,
    /// Decimal digits kept when echoing scores.
    pub score_precision: u32,
    pub identity_space: IdentitySpace,
    pub timeout_ms: Option<u64>,
    /// Boosts over paper records, used in document space.
    pub field_boosts: Vec<FieldBoost>,
    /// Boosts over chunk records, used in chunk space.
    pub chunk_field_boosts: Vec<FieldBoost>,
    /// Per-term edit distance for lexical matching, at most 2. 0 disables it.
    pub fuzzy_distance: u8,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            rrf_k: 60.0,
            overfetch_factor: 2,
            max_size: 100,
            default_size: 10,
            score_precision: 4,
            identity_space: IdentitySpace::Document,
            timeout_ms: None,
            field_boosts: default_field_boosts(),
            chunk_field_boosts: default_chunk_field_boosts(),
            fuzzy_distance: 1,
        }
    }
}

impl SearchSettings {
    /// The boosts matching the records `identity_space` searches.
    pub fn active_field_boosts(&self) -> &[FieldBoost] {
        match self.identity_space {
            IdentitySpace::Document => &self.field_boosts,
            IdentitySpace::Chunk => &self.chunk_field_boosts,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !(self.rrf_k.is_finite() && self.rrf_k > 0.0) {
            anyhow::bail!("search.rrf_k must be a positive number, got {}", self.rrf_k);
        }
        if self.overfetch_factor == 0 {
            anyhow::bail!("search.overfetch_factor must be at least 1");
        }
        if self.max_size == 0 {
            anyhow::bail!("search.max_size must be at least 1");
        }
        if self.default_size == 0 {
            anyhow::bail!("search.default_size must be at least 1");
        }
        if self.fuzzy_distance > 2 {
            anyhow::bail!("search.fuzzy_distance must be 0, 1 or 2, got {}", self.fuzzy_distance);
        }
        let space = self.identity_space;
        let boosts = self.active_field_boosts();
        if boosts.is_empty() {
            anyhow::bail!("{space} space needs at least one boosted field");
        }
        let searchable = space.searchable_fields();
        for FieldBoost { field, boost } in boosts {
            if !searchable.contains(&field.as_str()) {
                anyhow::bail!("field '{field}' does not exist on {space} records; expected one of {searchable:?}");
            }
            if !(boost.is_finite() && *boost > 0.0) {
                anyhow::bail!("boost for '{field}' must be a positive number, got {boost}");
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub url: String,
    pub model: String,
    pub dimension: usize,
    pub batch_size: usize,
    pub timeout_secs: u64,
    /// Use the deterministic hashing embedder instead of the network service.
    pub fake: bool,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:11434".to_string(),
            model: "nomic-embed-text:latest".to_string(),
            dimension: 768,
            batch_size: 10,
            timeout_secs: 60,
            fake: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub tantivy_index_dir: String,
    pub lancedb_dir: String,
    pub papers_table: String,
    pub chunks_table: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            tantivy_index_dir: "../dev_data/indexes/tantivy".to_string(),
            lancedb_dir: "../dev_data/indexes/lancedb".to_string(),
            papers_table: "papers".to_string(),
            chunks_table: "paper_chunks".to_string(),
        }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    // Expand env vars first
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    // Expand ~ at start
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
