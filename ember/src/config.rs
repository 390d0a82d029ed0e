//! Server configuration loading.
//!
//! The config file is json5 and is created with defaults on first start,
//! then validated after every parse.

use std::fs;
use std::num::NonZeroUsize;
use std::path::Path;

use serde::Deserialize;

const DEFAULT_CONFIG: &str = r#"{
    // Address the server listens on.
    server_address: "0.0.0.0:25565",
    max_players: 100,
    // Client view distance cap, in chunks.
    view_distance: 10,
    motd: "An Ember server",
    // Directory holding the overworld's region/ folder.
    world_root: "world",
    // Remove this block to disable packet compression.
    compression: {
        threshold: 256,
        level: 6,
    },
    // Worker threads for chunk loading.
    worker_threads: 2,
}
"#;

/// Packet compression settings.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CompressionConfig {
    /// Packets at least this large are compressed.
    pub threshold: NonZeroUsize,
    /// zlib level, 1..=9.
    pub level: u32,
}

/// The server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address.
    pub server_address: String,
    /// Player cap reported in the status and enforced at login.
    pub max_players: i32,
    /// View distance cap in chunks.
    pub view_distance: i32,
    /// Status line.
    pub motd: String,
    /// Directory holding the region store.
    pub world_root: String,
    /// Optional packet compression.
    pub compression: Option<CompressionConfig>,
    /// Background worker threads.
    pub worker_threads: usize,
}

impl ServerConfig {
    /// Loads the configuration, writing the default file when missing.
    ///
    /// # Panics
    /// Panics when the file cannot be created, read or parsed; a server
    /// without a valid config should not come up.
    #[must_use]
    pub fn load_or_create(path: &Path) -> Self {
        let text = if path.exists() {
            fs::read_to_string(path).expect("Failed to read config file")
        } else {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).expect("Failed to create config directory");
            }
            fs::write(path, DEFAULT_CONFIG).expect("Failed to write default config");
            DEFAULT_CONFIG.to_owned()
        };
        let config: ServerConfig =
            serde_json5::from_str(&text).expect("Failed to parse config");
        config.validate().expect("Failed to validate config");
        config
    }

    fn validate(&self) -> Result<(), &'static str> {
        if !(1..=32).contains(&self.view_distance) {
            return Err("view_distance must be in range 1..=32");
        }
        if self.max_players < 1 {
            return Err("max_players must be positive");
        }
        if let Some(compression) = self.compression {
            if !(1..=9).contains(&compression.level) {
                return Err("compression level must be between 1 and 9");
            }
        }
        if self.worker_threads == 0 {
            return Err("worker_threads must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_parses_and_validates() {
        let config: ServerConfig = serde_json5::from_str(DEFAULT_CONFIG).expect("parse");
        config.validate().expect("validate");
        assert_eq!(config.world_root, "world");
        assert!(config.compression.is_some());
    }
}
