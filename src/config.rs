//! TOML configuration.
//!
//! Only `[lore]` is required; every other section has defaults.
//!
//! ```toml
//! [lore]
//! root = "lore"
//!
//! [mappings]
//! dir = "config/mappings"
//!
//! [synonyms]
//! path = "config/synonyms.json"
//! [synonyms.categories]
//! creatures = "config/creature_synonyms.json"
//!
//! [remote]
//! token_env = "NOTION_TOKEN"
//! [remote.databases]
//! characters = "0123abcd..."
//!
//! [scheduler]
//! interval_secs = 900
//! push_after_pull = false
//! categories = ["characters", "creatures", "realms"]
//!
//! [server]
//! bind = "127.0.0.1:7340"
//! ```

use anyhow::{bail, Context, Result};
use lore_harness_core::Category;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub lore: LoreConfig,
    #[serde(default)]
    pub mappings: MappingsConfig,
    #[serde(default)]
    pub synonyms: SynonymsConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoreConfig {
    /// Storage root holding one directory per category.
    pub root: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MappingsConfig {
    #[serde(default = "default_mappings_dir")]
    pub dir: PathBuf,
}

impl Default for MappingsConfig {
    fn default() -> Self {
        Self {
            dir: default_mappings_dir(),
        }
    }
}

fn default_mappings_dir() -> PathBuf {
    PathBuf::from("config/mappings")
}

/// Synonym override files merged onto the built-in tables.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SynonymsConfig {
    /// Applies to every category.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Per-category files, merged after `path`.
    #[serde(default)]
    pub categories: BTreeMap<String, PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RemoteConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_title_property")]
    pub title_property: String,
    #[serde(default)]
    pub databases: BTreeMap<String, String>,
    /// Fall back to the category's environment variable when
    /// `databases` has no id.
    #[serde(default = "default_database_env")]
    pub database_env: bool,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_version: default_api_version(),
            token_env: default_token_env(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            title_property: default_title_property(),
            databases: BTreeMap::new(),
            database_env: default_database_env(),
        }
    }
}

fn default_api_url() -> String {
    "https://api.notion.com/v1".to_string()
}
fn default_api_version() -> String {
    "2022-06-28".to_string()
}
fn default_token_env() -> String {
    "NOTION_TOKEN".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}
fn default_title_property() -> String {
    "Name".to_string()
}
fn default_database_env() -> bool {
    true
}

impl RemoteConfig {
    /// Database id for a category: `[remote.databases]`, then the
    /// category's environment variable unless `database_env` is off.
    /// Blank values count as missing.
    pub fn database_id(&self, category: Category) -> Option<String> {
        self.databases
            .get(category.as_str())
            .cloned()
            .or_else(|| {
                self.database_env
                    .then(|| std::env::var(category.database_env_var()).ok())
                    .flatten()
            })
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
    }

    /// API token from the environment variable named by `token_env`.
    pub fn token(&self) -> Option<String> {
        std::env::var(&self.token_env)
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default)]
    pub push_after_pull: bool,
    #[serde(default = "default_scheduled_categories")]
    pub categories: Vec<Category>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            push_after_pull: false,
            categories: default_scheduled_categories(),
        }
    }
}

fn default_interval_secs() -> u64 {
    900
}
fn default_scheduled_categories() -> Vec<Category> {
    vec![Category::Characters, Category::Creatures, Category::Realms]
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
    "127.0.0.1:7340".to_string()
}

impl Config {
    /// Defaults everywhere, rooted at `root`.
    pub fn minimal(root: impl Into<PathBuf>) -> Self {
        Self {
            lore: LoreConfig { root: root.into() },
            mappings: MappingsConfig::default(),
            synonyms: SynonymsConfig::default(),
            remote: RemoteConfig::default(),
            scheduler: SchedulerConfig::default(),
            server: ServerConfig::default(),
        }
    }

    /// `<mappings.dir>/<category>.json`
    pub fn mapping_path(&self, category: Category) -> PathBuf {
        self.mappings.dir.join(format!("{}.json", category))
    }

    /// Synonym override files for a category, in merge order.
    pub fn synonym_files(&self, category: Category) -> Vec<&Path> {
        self.synonyms
            .path
            .as_deref()
            .into_iter()
            .chain(self.synonyms.categories.get(category.as_str()).map(PathBuf::as_path))
            .collect()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.lore.root.as_os_str().is_empty() {
        bail!("lore.root must not be empty");
    }

    if config.scheduler.interval_secs == 0 {
        bail!("scheduler.interval_secs must be > 0");
    }

    if config.remote.timeout_secs == 0 {
        bail!("remote.timeout_secs must be > 0");
    }

    if config.remote.title_property.trim().is_empty() {
        bail!("remote.title_property must not be empty");
    }

    if config.remote.token_env.trim().is_empty() {
        bail!("remote.token_env must name an environment variable");
    }

    for key in config.remote.databases.keys().chain(config.synonyms.categories.keys()) {
        let category: Category = key
            .parse()
            .with_context(|| format!("unknown category in config: '{}'", key))?;
        if category.as_str() != key {
            bail!("config key '{}' must be spelled '{}'", key, category);
        }
    }

    if config.server.bind.trim().is_empty() {
        bail!("server.bind must not be empty");
    }

    Ok(())
}
