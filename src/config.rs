//! Portal configuration

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Port to listen on
    pub port: u16,

    /// SQLite database path; None selects the in-memory store
    pub database: Option<String>,
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults
    pub fn from_env() -> Self {
        let mut config = Config::default();

        if let Ok(port) = std::env::var("PORTAL_PORT") {
            if let Ok(port) = port.parse() {
                config.port = port;
            }
        }
        if let Ok(database) = std::env::var("PORTAL_DATABASE") {
            if !database.is_empty() {
                config.database = Some(database);
            }
        }

        config
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            database: None,
        }
    }
}
