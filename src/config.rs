use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use anyhow::{Result, anyhow};

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_DATABASE_PATH: &str = "food_order_chatbot.db";
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:5000";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    pub server_url: Option<String>,
    pub database_path: Option<String>,
    pub listen_addr: Option<String>,
}

impl Config {
    pub fn new() -> Self {
        Self {
            server_url: Some(DEFAULT_SERVER_URL.to_string()),
            database_path: Some(DEFAULT_DATABASE_PATH.to_string()),
            listen_addr: Some(DEFAULT_LISTEN_ADDR.to_string()),
        }
    }

    /// Load from `path`, or from the default location when `path` is None.
    /// A missing file yields the defaults.
    pub fn load(path: Option<&PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::get_config_path()?,
        };

        if !config_path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(&config_path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save(&self, path: Option<&PathBuf>) -> Result<()> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::get_config_path()?,
        };

        // Create config directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(&config_path, config_content)?;
        Ok(())
    }

    pub fn server_url(&self) -> &str {
        self.server_url.as_deref().unwrap_or(DEFAULT_SERVER_URL)
    }

    pub fn database_path(&self) -> &str {
        self.database_path.as_deref().unwrap_or(DEFAULT_DATABASE_PATH)
    }

    pub fn listen_addr(&self) -> &str {
        self.listen_addr.as_deref().unwrap_or(DEFAULT_LISTEN_ADDR)
    }

    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("foodchat"))
    }

    fn get_config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }
}
