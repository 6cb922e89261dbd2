use serde::Deserialize;
use std::path::Path;

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Server,
    Client,
}

#[derive(Deserialize, Debug)]
pub struct DemoConfig {
    pub name: String,

    #[serde(default = "defaults::block_count")]
    pub block_count: u64,

    #[serde(default = "defaults::block_size")]
    pub block_size: u64,

    pub role: Role,

    #[serde(default = "defaults::log_level")]
    pub log_level: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config")]
    Parse(#[from] toml::de::Error),
}

mod defaults {
    pub fn block_count() -> u64 {
        64
    }

    pub fn block_size() -> u64 {
        4096
    }

    pub fn log_level() -> String {
        "info".into()
    }
}

impl DemoConfig {
    pub fn load(path: impl AsRef<Path> + ToString) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        let config: DemoConfig = toml::from_str(&raw)?;
        Ok(config)
    }
}
