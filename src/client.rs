//! The copy client: discovers shares, opens a session per discovery and prints
//! the catalog of every session that connects.

use std::io::Write;

use tracing::{debug, trace, warn};

use crate::Result;
use crate::constants::ServiceType;
use crate::db::{RecordCollection, RecordDb};
use crate::discovery::{ServiceBrowser, ServiceDescriptor};
use crate::enumerate::enumerate;
use crate::error::{DiscoveryError, SessionError};
use crate::event_loop::{EventHandler, LoopEvent, LoopHandle};
use crate::message::RecordEntry;
use crate::record::RecordFactory;
use crate::session::{Connector, Session, SessionId};

pub struct Client<W: Write> {
    // Held so discovery keeps running for the client's lifetime.
    _browser: Box<dyn ServiceBrowser>,
    connector: Box<dyn Connector>,
    factory: Box<dyn RecordFactory>,
    db: RecordDb,
    session: Option<Session>,
    sessions_opened: u64,
    out: W,
    events: LoopHandle,
}

impl<W: Write> Client<W> {
    /// Start browsing for `service_type`. Fails if discovery cannot start.
    pub fn new<B, C>(
        mut browser: B,
        service_type: ServiceType,
        connector: C,
        factory: Box<dyn RecordFactory>,
        out: W,
        events: LoopHandle,
    ) -> std::result::Result<Self, DiscoveryError>
    where
        B: ServiceBrowser + 'static,
        C: Connector + 'static,
    {
        browser.start(service_type, events.clone())?;

        Ok(Self {
            _browser: Box::new(browser),
            connector: Box::new(connector),
            factory,
            db: RecordDb::new(),
            session: None,
            sessions_opened: 0,
            out,
            events,
        })
    }

    /// Replace the current session with one against `service`.
    pub fn service_added(&mut self, service: ServiceDescriptor) {
        if let Some(previous) = self.session.take() {
            debug!(
                "session {} to {} superseded by {}",
                previous.id(),
                previous.service().name,
                service.name
            );
        }

        self.sessions_opened += 1;
        let id = SessionId(self.sessions_opened);
        self.session = Some(Session::open(
            id,
            service,
            self.connector.as_ref(),
            self.events.clone(),
        ));
    }

    /// Handle the end of a session attempt. Completions of superseded
    /// sessions are dropped.
    pub fn session_complete(
        &mut self,
        id: SessionId,
        outcome: std::result::Result<Vec<RecordEntry>, SessionError>,
    ) {
        let Some(session) = self.session.as_mut().filter(|s| s.id() == id) else {
            debug!("ignoring completion of superseded session {}", id);
            return;
        };

        match outcome {
            Ok(mut entries) => {
                session.mark_connected();
                // Remote keys are only unique within one share.
                entries.sort_by_key(|entry| entry.key);
                for entry in entries {
                    let record = self.factory.create(Some(&entry.location));
                    self.db.add(record);
                }
                debug!("{} entries", self.db.count());
                if let Err(e) = enumerate(&self.db, &mut self.out) {
                    warn!("failed to write catalog: {}", e);
                }
            }
            Err(err) => {
                session.mark_failed();
                debug!(
                    "session {} to {} failed: {}",
                    id,
                    session.service().name,
                    err
                );
            }
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn sessions_opened(&self) -> u64 {
        self.sessions_opened
    }

    pub fn records(&self) -> &RecordDb {
        &self.db
    }

    pub fn output(&self) -> &W {
        &self.out
    }
}

impl<W: Write> EventHandler for Client<W> {
    fn handle_event(&mut self, event: LoopEvent) -> Result<()> {
        match event {
            LoopEvent::ServiceAdded(service) => self.service_added(service),
            LoopEvent::SessionComplete { session, outcome } => {
                self.session_complete(session, outcome)
            }
            LoopEvent::ShareError(message) => {
                trace!("client ignoring share error: {}", message);
            }
        }
        Ok(())
    }
}
