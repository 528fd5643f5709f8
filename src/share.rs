//! Server-side shares: building, serving and publishing one.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{info, trace, warn};

use crate::Result;
use crate::connection::handle_connection;
use crate::constants::{ShareKind, TXT_VERSION};
use crate::db::{ContainerDb, RecordCollection, RecordDb};
use crate::discovery::{ServiceAdvert, ServicePublisher};
use crate::error::ShareError;
use crate::event_loop::{EventHandler, LoopEvent, LoopHandle};
use crate::message::{ContainerEntry, RecordEntry};
use crate::record::{ContainerRecord, factory_for};
use crate::reporter::ErrorReporter;

/// Settings for [`create_share`].
#[derive(Debug, Clone)]
pub struct ShareConfig {
    pub name: String,
    pub bind: IpAddr,
    /// `None` picks the default port of the share's service type.
    pub port: Option<u16>,
    /// Host name announced with the service.
    pub host: String,
    /// Location of the single shared item; the factory default when unset.
    pub item_location: Option<String>,
}

impl ShareConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: None,
            host: "dmap-rs".to_string(),
            item_location: None,
        }
    }
}

/// Everything a connection needs to answer requests. Immutable once served.
#[derive(Debug)]
pub struct Catalog {
    name: String,
    kind: ShareKind,
    db: RecordDb,
    containers: ContainerDb,
    next_session: AtomicU32,
}

impl Catalog {
    pub fn new(
        name: impl Into<String>,
        kind: ShareKind,
        db: RecordDb,
        containers: ContainerDb,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            db,
            containers,
            next_session: AtomicU32::new(1),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ShareKind {
        self.kind
    }

    pub fn records(&self) -> &RecordDb {
        &self.db
    }

    pub fn containers(&self) -> &ContainerDb {
        &self.containers
    }

    pub fn next_session_id(&self) -> u32 {
        self.next_session.fetch_add(1, Ordering::SeqCst)
    }

    pub fn record_entries(&self) -> Vec<RecordEntry> {
        self.db
            .iter()
            .map(|(key, record)| RecordEntry::new(key, record.location()))
            .collect()
    }

    pub fn container_entries(&self) -> Vec<ContainerEntry> {
        self.containers
            .iter()
            .map(|c| ContainerEntry {
                id: c.id,
                name: c.name.clone(),
                item_count: c.entry_count() as u32,
            })
            .collect()
    }
}

/// A share of one record database and one container database.
pub struct Share {
    catalog: Arc<Catalog>,
    errors: Option<LoopHandle>,
    local_addr: Option<SocketAddr>,
    server: Option<JoinHandle<()>>,
    published: bool,
}

impl Share {
    pub fn new(
        name: impl Into<String>,
        kind: ShareKind,
        db: RecordDb,
        containers: ContainerDb,
    ) -> Self {
        Self {
            catalog: Arc::new(Catalog::new(name, kind, db, containers)),
            errors: None,
            local_addr: None,
            server: None,
            published: false,
        }
    }

    pub fn name(&self) -> &str {
        self.catalog.name()
    }

    pub fn kind(&self) -> ShareKind {
        self.catalog.kind()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Address the share accepts connections on, once served.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn is_published(&self) -> bool {
        self.published
    }

    pub fn has_error_subscriber(&self) -> bool {
        self.errors.is_some()
    }

    /// Route runtime errors of the served share to the loop.
    pub fn subscribe_errors(&mut self, events: LoopHandle) {
        self.errors = Some(events);
    }

    /// Bind `addr` and start accepting connections. A share is served once.
    pub async fn serve(
        &mut self,
        addr: SocketAddr,
    ) -> std::result::Result<SocketAddr, ShareError> {
        if let Some(local_addr) = self.local_addr {
            return Err(ShareError::ServeFailed(format!(
                "already serving on {}",
                local_addr
            )));
        }

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ShareError::ServeFailed(e.to_string()))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| ShareError::ServeFailed(e.to_string()))?;

        info!("serving '{}' on {}", self.name(), local_addr);

        let catalog = Arc::clone(&self.catalog);
        let errors = self.errors.clone();
        self.server = Some(tokio::spawn(accept_loop(listener, catalog, errors)));
        self.local_addr = Some(local_addr);
        Ok(local_addr)
    }

    /// Advertise the served share.
    pub fn publish(
        &mut self,
        publisher: &mut dyn ServicePublisher,
        host: &str,
    ) -> std::result::Result<(), ShareError> {
        let Some(local_addr) = self.local_addr else {
            return Err(ShareError::PublishFailed(
                "share is not being served".to_string(),
            ));
        };

        let advert = ServiceAdvert {
            service_type: self.kind().service_type(),
            name: self.name().to_string(),
            host: host.to_string(),
            port: local_addr.port(),
            txt: txt_records(self.name()),
        };

        publisher
            .publish(&advert)
            .map_err(|e| ShareError::PublishFailed(e.to_string()))?;
        self.published = true;
        Ok(())
    }
}

impl Drop for Share {
    fn drop(&mut self) {
        if let Some(server) = self.server.take() {
            server.abort();
        }
    }
}

async fn accept_loop(listener: TcpListener, catalog: Arc<Catalog>, errors: Option<LoopHandle>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let catalog = Arc::clone(&catalog);
                let errors = errors.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, addr, catalog).await {
                        report(&errors, format!("connection from {}: {}", addr, e));
                    }
                });
            }
            Err(e) => {
                report(&errors, format!("accept failed: {}", e));
                break;
            }
        }
    }
}

fn report(errors: &Option<LoopHandle>, message: String) {
    match errors {
        Some(events) => {
            events.post(LoopEvent::ShareError(message));
        }
        None => warn!("unreported share error: {}", message),
    }
}

/// Stable 64-bit database id for a share name, as 16 upper-case hex digits.
pub fn database_id(name: &str) -> String {
    let digest = md5::compute(name.as_bytes());
    digest.0[..8].iter().map(|b| format!("{:02X}", b)).collect()
}

fn txt_records(name: &str) -> Vec<(String, String)> {
    vec![
        ("txtvers".to_string(), TXT_VERSION.to_string()),
        ("Password".to_string(), "false".to_string()),
        ("Machine Name".to_string(), name.to_string()),
        ("Database ID".to_string(), database_id(name)),
    ]
}

/// Build a one-item share of `kind`, serve it and publish it.
///
/// Each step must succeed before the next starts. On failure the partially
/// built share is dropped, taking its listener and error subscription with it.
pub async fn create_share(
    kind: ShareKind,
    config: &ShareConfig,
    publisher: &mut dyn ServicePublisher,
    events: LoopHandle,
) -> std::result::Result<Share, ShareError> {
    let mut containers = ContainerDb::new();
    let mut library = ContainerRecord::new(1, config.name.clone());

    let mut db = RecordDb::new();
    let factory = factory_for(kind);
    let record = factory.create(config.item_location.as_deref());
    let key = db.add(record);
    library.add_entry(key);
    containers.add(library);

    let mut share = Share::new(config.name.clone(), kind, db, containers);
    share.subscribe_errors(events);

    let port = config
        .port
        .unwrap_or_else(|| kind.service_type().default_port());
    share.serve(SocketAddr::new(config.bind, port)).await?;
    share.publish(publisher, &config.host)?;

    Ok(share)
}

/// Owns the running share and stops the loop on its first error.
pub struct ShareHost {
    share: Share,
    reporter: ErrorReporter,
}

impl ShareHost {
    pub fn new(share: Share) -> Self {
        Self {
            share,
            reporter: ErrorReporter::new(),
        }
    }

    pub fn share(&self) -> &Share {
        &self.share
    }
}

impl EventHandler for ShareHost {
    fn handle_event(&mut self, event: LoopEvent) -> Result<()> {
        match event {
            LoopEvent::ShareError(message) => Err(self.reporter.on_error(&message)),
            other => {
                trace!("share host ignoring {:?}", other);
                Ok(())
            }
        }
    }
}
