//! Service discovery: browsing for shares and advertising our own.
//!
//! The core talks to discovery through [`ServiceBrowser`] and
//! [`ServicePublisher`]. The mDNS implementations here are built on `mdns-sd`.

use std::collections::HashMap;
use std::net::IpAddr;

use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::constants::ServiceType;
use crate::error::DiscoveryError;
use crate::event_loop::{LoopEvent, LoopHandle};

/// A discovered share endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub name: String,
    pub host: String,
    pub port: u16,
}

impl ServiceDescriptor {
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
        }
    }

    /// `host:port`, bracketing IPv6 literals.
    pub fn address(&self) -> String {
        match self.host.parse::<IpAddr>() {
            Ok(IpAddr::V6(ip)) => format!("[{}]:{}", ip, self.port),
            _ => format!("{}:{}", self.host, self.port),
        }
    }
}

/// What a share advertises about itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceAdvert {
    pub service_type: ServiceType,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub txt: Vec<(String, String)>,
}

/// Delivers a `ServiceAdded` event per discovered instance once started.
pub trait ServiceBrowser {
    fn start(
        &mut self,
        service_type: ServiceType,
        events: LoopHandle,
    ) -> Result<(), DiscoveryError>;
}

/// Advertises a served share.
pub trait ServicePublisher {
    fn publish(&mut self, advert: &ServiceAdvert) -> Result<(), DiscoveryError>;
}

/// Browses the local link with mDNS.
pub struct MdnsBrowser {
    daemon: Option<ServiceDaemon>,
    service_type: Option<ServiceType>,
    forwarder: Option<JoinHandle<()>>,
}

impl MdnsBrowser {
    pub fn new() -> Self {
        Self {
            daemon: None,
            service_type: None,
            forwarder: None,
        }
    }
}

impl Default for MdnsBrowser {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceBrowser for MdnsBrowser {
    fn start(
        &mut self,
        service_type: ServiceType,
        events: LoopHandle,
    ) -> Result<(), DiscoveryError> {
        let daemon = ServiceDaemon::new()?;
        let receiver = daemon.browse(service_type.as_str())?;
        info!("browsing for {}", service_type);

        let forwarder = tokio::spawn(async move {
            while let Ok(event) = receiver.recv_async().await {
                if let ServiceEvent::ServiceResolved(info) = event {
                    let descriptor = descriptor_from_info(&info, service_type);
                    debug!(
                        "service resolved: {} at {}",
                        descriptor.name,
                        descriptor.address()
                    );
                    if !events.post(LoopEvent::ServiceAdded(descriptor)) {
                        break;
                    }
                }
            }
        });

        self.daemon = Some(daemon);
        self.service_type = Some(service_type);
        self.forwarder = Some(forwarder);
        Ok(())
    }
}

impl Drop for MdnsBrowser {
    fn drop(&mut self) {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
        if let Some(daemon) = self.daemon.take() {
            if let Some(service_type) = self.service_type {
                let _ = daemon.stop_browse(service_type.as_str());
            }
            if let Err(e) = daemon.shutdown() {
                warn!("failed to shut down mDNS daemon: {}", e);
            }
        }
    }
}

fn descriptor_from_info(info: &ServiceInfo, service_type: ServiceType) -> ServiceDescriptor {
    let fullname = info.get_fullname();
    let name = fullname
        .strip_suffix(service_type.as_str())
        .map(|n| n.trim_end_matches('.'))
        .unwrap_or(fullname);

    let addresses = info.get_addresses();
    let host = addresses
        .iter()
        .find(|ip| ip.is_ipv4())
        .or_else(|| addresses.iter().next())
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| info.get_hostname().trim_end_matches('.').to_string());

    ServiceDescriptor::new(name, host, info.get_port())
}

/// Registers shares with mDNS.
pub struct MdnsPublisher {
    daemon: ServiceDaemon,
    advertise_addr: Option<IpAddr>,
    registered: Vec<String>,
}

impl MdnsPublisher {
    /// `advertise_addr` pins the announced address; `None` announces every
    /// interface address.
    pub fn new(advertise_addr: Option<IpAddr>) -> Result<Self, DiscoveryError> {
        Ok(Self {
            daemon: ServiceDaemon::new()?,
            advertise_addr,
            registered: Vec::new(),
        })
    }
}

impl ServicePublisher for MdnsPublisher {
    fn publish(&mut self, advert: &ServiceAdvert) -> Result<(), DiscoveryError> {
        let host_name = format!("{}.local.", advert.host.trim_end_matches(".local."));
        let properties: HashMap<String, String> = advert.txt.iter().cloned().collect();

        let info = match self.advertise_addr {
            Some(ip) => ServiceInfo::new(
                advert.service_type.as_str(),
                &advert.name,
                &host_name,
                ip,
                advert.port,
                properties,
            )?,
            None => ServiceInfo::new(
                advert.service_type.as_str(),
                &advert.name,
                &host_name,
                "",
                advert.port,
                properties,
            )?
            .enable_addr_auto(),
        };

        let fullname = info.get_fullname().to_string();
        self.daemon.register(info)?;
        info!("published {} on port {}", fullname, advert.port);
        self.registered.push(fullname);
        Ok(())
    }
}

impl Drop for MdnsPublisher {
    fn drop(&mut self) {
        for fullname in self.registered.drain(..) {
            let _ = self.daemon.unregister(&fullname);
        }
        let _ = self.daemon.shutdown();
    }
}
