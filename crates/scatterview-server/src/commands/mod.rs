pub mod config;
pub mod serve;
pub mod stats;

use std::path::Path;

use anyhow::Result;
use scatterview_server::ServerConfig;

/// Load `path` if given, otherwise the built-in defaults.
pub fn load_config(path: Option<&Path>) -> Result<ServerConfig> {
    match path {
        Some(path) => ServerConfig::load(path),
        None => Ok(ServerConfig::default()),
    }
}
