use config::{Config as ConfigLoader, ConfigError, Environment, File};
use parley_persist::StoreConfig;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub transport: TransportSettings,
    pub store: StoreSettings,
    pub session: SessionSettings,
    #[serde(default)]
    pub references: Option<ReferenceSettings>,
    pub logging: LoggingConfig,

    // Secrets (from ENV only)
    #[serde(default)]
    pub api_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransportSettings {
    pub url: String,
    #[serde(default = "default_true")]
    pub streaming: bool,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreSettings {
    /// Directory holding `storage.json`
    pub data_dir: PathBuf,
    #[serde(flatten)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionSettings {
    pub user_id: String,
    #[serde(default = "default_true")]
    pub intermediate_steps: bool,
}

/// Endpoint that maps reference ids to URLs
#[derive(Debug, Clone, Deserialize)]
pub struct ReferenceSettings {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from TOML files and environment variables
    ///
    /// Hierarchy (weakest to strongest):
    /// 1. config/default.toml
    /// 2. config/{ENV}.toml (if ENV is set)
    /// 3. `PARLEY_` environment variables, sections split by `__`
    ///    (e.g. `PARLEY_TRANSPORT__URL`)
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("ENV").unwrap_or_else(|_| "dev".to_string());

        let builder = ConfigLoader::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(
                Environment::with_prefix("PARLEY")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        let mut cfg: Config = builder.build()?.try_deserialize()?;

        // Secrets never live in the TOML files
        cfg.api_token = std::env::var("PARLEY_API_TOKEN").ok().filter(|t| !t.is_empty());

        Ok(cfg)
    }

    /// Load config from a specific path (useful for testing)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        ConfigLoader::builder()
            .add_source(File::from(path.as_ref()))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [transport]
        url = "https://chat.example.com/stream"
        timeout_secs = 60

        [transport.headers]
        x-tenant = "acme"

        [store]
        data_dir = "/tmp/parley"
        budget_bytes = 1024

        [session]
        user_id = "u-1"

        [references]
        url = "https://chat.example.com/contracts/images"

        [logging]
        level = "debug"
        format = "json"
    "#;

    #[test]
    fn test_config_structure() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.transport.url, "https://chat.example.com/stream");
        assert!(config.transport.streaming);
        assert_eq!(config.transport.headers.get("x-tenant").map(String::as_str), Some("acme"));
        assert_eq!(config.store.store.budget_bytes, 1024);
        assert_eq!(config.store.store.key, "chats_history");
        assert!(config.session.intermediate_steps);
        assert!(config.references.is_some());
        assert!(config.api_token.is_none());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parley.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = Config::from_file(&path).unwrap();

        assert_eq!(config.session.user_id, "u-1");
        assert_eq!(config.logging.format, "json");
    }
}
