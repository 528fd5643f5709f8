//! Protocol constants and enumerations.

use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Kind of media a share exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u32)]
pub enum ShareKind {
    /// Music and video, served over DAAP.
    #[default]
    Audio = 0,
    /// Photos, served over DPAP.
    Image = 1,
}

impl ShareKind {
    pub fn service_type(&self) -> ServiceType {
        match self {
            ShareKind::Audio => ServiceType::Daap,
            ShareKind::Image => ServiceType::Dpap,
        }
    }
}

impl TryFrom<u32> for ShareKind {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            0 => Ok(ShareKind::Audio),
            1 => Ok(ShareKind::Image),
            _ => Err(Error::InvalidShareKind(value)),
        }
    }
}

impl From<ShareKind> for u32 {
    fn from(kind: ShareKind) -> Self {
        kind as u32
    }
}

/// DNS-SD service types of the DMAP family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ServiceType {
    Daap,
    #[default]
    Dpap,
}

impl ServiceType {
    /// Fully qualified type as used by mDNS browsing and registration.
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Daap => "_daap._tcp.local.",
            ServiceType::Dpap => "_dpap._tcp.local.",
        }
    }

    pub fn share_kind(&self) -> ShareKind {
        match self {
            ServiceType::Daap => ShareKind::Audio,
            ServiceType::Dpap => ShareKind::Image,
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            ServiceType::Daap => DEFAULT_DAAP_PORT,
            ServiceType::Dpap => DEFAULT_DPAP_PORT,
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "daap" | "_daap._tcp" | "_daap._tcp.local." => Ok(ServiceType::Daap),
            "dpap" | "_dpap._tcp" | "_dpap._tcp.local." => Ok(ServiceType::Dpap),
            _ => Err(Error::InvalidServiceType(s.to_string())),
        }
    }
}

/// Default DAAP listen port.
pub const DEFAULT_DAAP_PORT: u16 = 3689;

/// Default DPAP listen port.
pub const DEFAULT_DPAP_PORT: u16 = 8770;

/// TXT record format version advertised with every share.
pub const TXT_VERSION: &str = "1";

/// Client name sent on login when none is configured.
pub const DEFAULT_CLIENT_NAME: &str = "dmap-rs";

/// Upper bound on a single catalog frame.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;
