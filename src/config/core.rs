use super::{BatchConfig, BatchConfigBuilder};
use crate::error::ConfigError;
use crate::parallel::PartitionStrategy;
use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// Embed the default config at compile time
const DEFAULT_CONFIG: &str = include_str!("../../default-config.toml");

/// Environment variable prefix, e.g. `PARBATCH_CHUNK_SIZE=500`
pub const ENV_PREFIX: &str = "PARBATCH_";

/// On-disk / environment shape of the engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Worker count; 0 means one per logical CPU
    pub parallelism: usize,
    pub chunk_size: usize,
    pub strategy: PartitionStrategy,
    pub shutdown_grace_secs: u64,
}

impl ConfigFile {
    /// Validate into an engine config
    pub fn into_batch_config(self) -> Result<BatchConfig, ConfigError> {
        let mut builder = BatchConfigBuilder::new()
            .chunk_size(self.chunk_size)
            .strategy(self.strategy)
            .shutdown_grace(Duration::from_secs(self.shutdown_grace_secs));
        if self.parallelism > 0 {
            builder = builder.parallelism(self.parallelism);
        }
        builder.build()
    }
}

impl From<&BatchConfig> for ConfigFile {
    fn from(config: &BatchConfig) -> Self {
        Self {
            parallelism: config.parallelism(),
            chunk_size: config.chunk_size(),
            strategy: config.strategy(),
            shutdown_grace_secs: config.shutdown_grace().as_secs(),
        }
    }
}

/// Layered configuration loader.
///
/// Priority, lowest first: embedded defaults, user config, repository config
/// (or an explicit file), `PARBATCH_*` environment variables.
pub struct ConfigLoader {
    figment: Figment,
}

impl ConfigLoader {
    pub fn load() -> Self {
        Self::load_with_custom_config(None)
    }

    pub fn load_with_custom_config(custom_config: Option<&Path>) -> Self {
        let mut figment = Figment::new().merge(Toml::string(DEFAULT_CONFIG));

        if let Some(custom_path) = custom_config {
            figment = figment.merge(file_provider(custom_path));
        } else {
            let user = Self::user_config_path();
            figment = figment
                .merge(Toml::file(&user))
                .merge(Toml::file("parbatch.toml"))
                .merge(Json::file("parbatch.json"))
                .merge(Yaml::file("parbatch.yaml"))
                .merge(Yaml::file("parbatch.yml"));
        }

        // Environment variables always have highest priority
        figment = figment.merge(Env::prefixed(ENV_PREFIX));

        tracing::trace!("Configuration sources: {:?}", figment.metadata().collect::<Vec<_>>());
        Self { figment }
    }

    /// Start from explicit values instead of files; still honours the environment
    pub fn from_values(values: &ConfigFile) -> Self {
        let figment = Figment::from(Serialized::defaults(values)).merge(Env::prefixed(ENV_PREFIX));
        Self { figment }
    }

    pub fn extract(&self) -> Result<ConfigFile, ConfigError> {
        Ok(self.figment.extract()?)
    }

    pub fn batch_config(&self) -> Result<BatchConfig, ConfigError> {
        self.extract()?.into_batch_config()
    }

    fn user_config_path() -> PathBuf {
        match std::env::var("HOME") {
            Ok(home) => PathBuf::from(home).join(".config/parbatch/config.toml"),
            Err(_) => PathBuf::from("~/.config/parbatch/config.toml"),
        }
    }
}

/// Pick a provider from the file extension, defaulting to TOML
fn file_provider(path: &Path) -> Figment {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "json" => Figment::from(Json::file(path)),
        "yaml" | "yml" => Figment::from(Yaml::file(path)),
        _ => Figment::from(Toml::file(path)),
    }
}
