//! The single run-loop both binaries block in.
//!
//! Collaborators post [`LoopEvent`]s through a [`LoopHandle`]; the loop hands
//! them one at a time, in arrival order, to one [`EventHandler`].

use tokio::sync::mpsc;
use tracing::trace;

use crate::Result;
use crate::discovery::ServiceDescriptor;
use crate::error::SessionError;
use crate::message::RecordEntry;
use crate::session::SessionId;

/// Everything that can wake the loop.
#[derive(Debug)]
pub enum LoopEvent {
    /// Discovery resolved a service instance.
    ServiceAdded(ServiceDescriptor),
    /// A session attempt finished, with the catalog it fetched on success.
    SessionComplete {
        session: SessionId,
        outcome: std::result::Result<Vec<RecordEntry>, SessionError>,
    },
    /// A served share hit an error.
    ShareError(String),
}

/// Receives loop events. An `Err` stops the loop and is handed to its caller.
pub trait EventHandler {
    fn handle_event(&mut self, event: LoopEvent) -> Result<()>;
}

/// Cloneable sender side of the loop.
#[derive(Debug, Clone)]
pub struct LoopHandle {
    tx: mpsc::UnboundedSender<LoopEvent>,
}

impl LoopHandle {
    /// Queue an event. Returns false once the loop is gone.
    pub fn post(&self, event: LoopEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

pub struct EventLoop {
    tx: mpsc::UnboundedSender<LoopEvent>,
    rx: mpsc::UnboundedReceiver<LoopEvent>,
}

impl EventLoop {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    pub fn handle(&self) -> LoopHandle {
        LoopHandle {
            tx: self.tx.clone(),
        }
    }

    /// Wait for the next event and dispatch it.
    pub async fn dispatch_next<H: EventHandler + ?Sized>(
        &mut self,
        handler: &mut H,
    ) -> Result<()> {
        // The loop holds its own sender, so the channel never closes.
        if let Some(event) = self.rx.recv().await {
            trace!("dispatching {:?}", event);
            handler.handle_event(event)?;
        }
        Ok(())
    }

    /// Run until a handler fails. Only returns with that failure.
    pub async fn run<H: EventHandler + ?Sized>(mut self, handler: &mut H) -> Result<()> {
        loop {
            self.dispatch_next(handler).await?;
        }
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}
