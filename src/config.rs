use std::env;
use std::fmt::Display;
use std::str::FromStr;

use tracing::{info, warn, Level};

pub const LOG_LEVEL_KEY: &str = "ADPILOT_LOG_LEVEL";

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum StorageKind {
    Mongo,
    Memory,
}

impl FromStr for StorageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<StorageKind, String> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mongo" | "mongodb" => Ok(StorageKind::Mongo),
            "memory" => Ok(StorageKind::Memory),
            other => Err(format!("unknown storage kind '{}'", other)),
        }
    }
}

impl Display for StorageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            StorageKind::Mongo => f.write_str("mongo"),
            StorageKind::Memory => f.write_str("memory"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub bind: String,
    pub api_url: String,
    pub backend_url: String,
    pub mongo_uri: String,
    pub database: String,
    pub storage: StorageKind,
    pub log_level: Level,
}

impl Config {
    pub fn load() -> Config {
        let api_url = try_load("ADPILOT_API_URL", String::from("http://127.0.0.1:8000"));

        Config {
            bind: try_load("ADPILOT_BIND", String::from("127.0.0.1:8080")),
            backend_url: try_load("ADPILOT_BACKEND_URL", api_url.clone()),
            api_url,
            mongo_uri: try_load("ADPILOT_MONGO_URI", String::from("mongodb://localhost:27017")),
            database: try_load("ADPILOT_DATABASE", String::from("adpilot")),
            storage: try_load("ADPILOT_STORAGE", StorageKind::Mongo),
            log_level: try_load(LOG_LEVEL_KEY, Level::DEBUG),
        }
    }

    /// An in-memory setup that never reaches a real backend.
    pub fn for_tests() -> Config {
        Config {
            bind: "127.0.0.1:0".into(),
            api_url: "http://127.0.0.1:1".into(),
            backend_url: "http://127.0.0.1:1".into(),
            mongo_uri: String::new(),
            database: String::new(),
            storage: StorageKind::Memory,
            log_level: Level::DEBUG,
        }
    }
}

/// Reads the log level without logging, for use before a subscriber exists.
pub fn load_log_level() -> Level {
    env::var(LOG_LEVEL_KEY)
        .ok()
        .and_then(|level| level.parse().ok())
        .unwrap_or(Level::DEBUG)
}

fn try_load<T: FromStr + Display>(key: &str, default: T) -> T
where
    T::Err: Display,
{
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => {
            info!("{} not set, using default: {}", key, default);
            return default;
        }
    };

    value.parse().unwrap_or_else(|err| {
        warn!("invalid {} value '{}': {}, using default: {}", key, value, err, default);
        default
    })
}
