//! Copy client configuration.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use dmap_rs::constants::{DEFAULT_CLIENT_NAME, ServiceType};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Service type to browse for: "dpap" or "daap"
    pub service_type: String,

    /// Name sent to shares on login
    pub client_name: String,

    /// Give up on a share after this many seconds
    pub connect_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_type: "dpap".to_string(),
            client_name: DEFAULT_CLIENT_NAME.to_string(),
            connect_timeout_secs: 10,
        }
    }
}

impl Config {
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    pub fn service_type(&self) -> Result<ServiceType> {
        Ok(self.service_type.parse::<ServiceType>()?)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
