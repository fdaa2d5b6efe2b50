use std::path::{Path, PathBuf};

use ::config::{Config, Environment, File, FileFormat, Source};
use serde::Deserialize;
use thiserror::Error;

pub const ENV_PREFIX: &str = "STEAMHISTORY";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config error `{0}`")]
    Load(#[from] ::config::ConfigError),
    #[error("could not locate executable `{0}`")]
    Executable(std::io::Error),
}

#[derive(Debug, Deserialize)]
pub struct HistoryConfig {
    /// Where `<app id>.db` files live.
    /// Relative paths are taken from the executable's directory.
    #[serde(default = "default_data_directory")]
    pub data_directory: PathBuf,
    #[serde(default)]
    pub steam: SteamConfig,
    /// Max player count requests in flight while sampling
    #[serde(default = "default_sample_concurrency")]
    pub sample_concurrency: usize,
}

#[derive(Debug, Deserialize)]
pub struct SteamConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SteamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_data_directory() -> PathBuf {
    PathBuf::from("data/history")
}

fn default_base_url() -> String {
    "http://api.steampowered.com".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_sample_concurrency() -> usize {
    8
}

impl HistoryConfig {
    /// Reads `file_path` (RON, optional) then applies
    /// `STEAMHISTORY__*` environment overrides on top
    pub fn load(file_path: &Path) -> Result<Self, ConfigError> {
        Self::from_sources(
            File::from(file_path).format(FileFormat::Ron).required(false),
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
    }

    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        Self::from_sources(
            File::from_str(s, FileFormat::Ron),
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
    }

    fn from_sources(
        file: impl Source + Send + Sync + 'static,
        env: Environment,
    ) -> Result<Self, ConfigError> {
        Ok(Config::builder()
            .add_source(file)
            .add_source(env)
            .build()?
            .try_deserialize()?)
    }

    /// `data_directory` made absolute against the running executable
    pub fn resolved_data_directory(&self) -> Result<PathBuf, ConfigError> {
        if self.data_directory.is_absolute() {
            return Ok(self.data_directory.clone());
        }
        let exe = std::env::current_exe().map_err(ConfigError::Executable)?;
        let exe_dir = exe.parent().unwrap_or(Path::new("."));
        Ok(exe_dir.join(&self.data_directory))
    }
}
