//! Server configuration.

use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;

use anyhow::Result;
use dmap_rs::share::ShareConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Share name shown to browsing clients
    pub name: String,

    /// Address to accept connections on
    pub bind: IpAddr,

    /// Port to listen on; the service type's default when unset
    pub port: Option<u16>,

    /// Host name announced over mDNS
    pub host: String,

    /// Address announced over mDNS; every interface address when unset
    pub advertise_addr: Option<IpAddr>,

    /// Location of the shared item
    pub item_location: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: default_share_name(),
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: None,
            host: std::env::var("HOSTNAME").unwrap_or_else(|_| "dmap-rs".to_string()),
            advertise_addr: None,
            item_location: None,
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

    pub fn share_config(&self) -> ShareConfig {
        ShareConfig {
            name: self.name.clone(),
            bind: self.bind,
            port: self.port,
            host: self.host.clone(),
            item_location: self.item_location.clone(),
        }
    }
}

fn default_share_name() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "Unknown".to_string());
    format!("{}'s Media (dmap-rs)", user)
}
