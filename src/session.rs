//! Client sessions against a discovered share.
//!
//! A [`Session`] owns one in-flight attempt made through a [`Connector`]. The
//! attempt runs on the loop's runtime and reports back with a
//! `SessionComplete` event; dropping the session abandons the attempt.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::Error;
use crate::constants::DEFAULT_CLIENT_NAME;
use crate::discovery::ServiceDescriptor;
use crate::error::SessionError;
use crate::event_loop::{LoopEvent, LoopHandle};
use crate::message::{RecordEntry, Request, Response, read_response};
use crate::protocol::{MessageWrite, frame_len};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Connected,
    Failed,
    Closed,
}

/// Resolves to the share's catalog, or the reason the attempt failed.
pub type ConnectFuture =
    Pin<Box<dyn Future<Output = Result<Vec<RecordEntry>, SessionError>> + Send + 'static>>;

/// Opens protocol sessions. Timeouts, if any, are the connector's business.
pub trait Connector {
    fn connect(&self, service: &ServiceDescriptor) -> ConnectFuture;
}

#[derive(Debug)]
pub struct Session {
    id: SessionId,
    service: ServiceDescriptor,
    state: SessionState,
    attempt: Option<JoinHandle<()>>,
}

impl Session {
    /// Start an attempt against `service`. Must be called within a tokio runtime.
    pub fn open<C: Connector + ?Sized>(
        id: SessionId,
        service: ServiceDescriptor,
        connector: &C,
        events: LoopHandle,
    ) -> Self {
        debug!("opening session {} to {} at {}", id, service.name, service.address());
        let connect = connector.connect(&service);
        let attempt = tokio::spawn(async move {
            let outcome = connect.await;
            events.post(LoopEvent::SessionComplete {
                session: id,
                outcome,
            });
        });

        Self {
            id,
            service,
            state: SessionState::Connecting,
            attempt: Some(attempt),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn service(&self) -> &ServiceDescriptor {
        &self.service
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub(crate) fn mark_connected(&mut self) {
        self.attempt = None;
        self.state = SessionState::Connected;
    }

    pub(crate) fn mark_failed(&mut self) {
        self.attempt = None;
        self.state = SessionState::Failed;
    }

    /// Abandon the attempt if it is still running.
    pub fn close(&mut self) {
        if let Some(attempt) = self.attempt.take() {
            attempt.abort();
        }
        self.state = SessionState::Closed;
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

/// Fetches a share's catalog over the TCP catalog protocol.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    client_name: String,
    timeout: Duration,
}

impl TcpConnector {
    pub fn new(client_name: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client_name: client_name.into(),
            timeout,
        }
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new(DEFAULT_CLIENT_NAME, Duration::from_secs(10))
    }
}

impl Connector for TcpConnector {
    fn connect(&self, service: &ServiceDescriptor) -> ConnectFuture {
        let addr = service.address();
        let client_name = self.client_name.clone();
        let timeout = self.timeout;
        Box::pin(async move {
            match tokio::time::timeout(timeout, fetch_catalog(addr, client_name)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(SessionError::new("timeout")),
            }
        })
    }
}

async fn fetch_catalog(
    addr: String,
    client_name: String,
) -> Result<Vec<RecordEntry>, SessionError> {
    let mut stream = TcpStream::connect(&addr).await?;
    stream.set_nodelay(true)?;
    let mut read_buf = BytesMut::with_capacity(8192);

    let login = Request::Login { client_name };
    let session_id = match exchange(&mut stream, &mut read_buf, login).await? {
        Response::Login {
            session_id,
            share_name,
        } => {
            debug!("logged in to '{}' as session {}", share_name, session_id);
            session_id
        }
        other => return Err(unexpected(other)),
    };

    match exchange(&mut stream, &mut read_buf, Request::Containers { session_id }).await? {
        Response::Containers { containers } => {
            debug!("{} containers at {}", containers.len(), addr);
        }
        other => return Err(unexpected(other)),
    }

    let records = match exchange(&mut stream, &mut read_buf, Request::Items { session_id }).await? {
        Response::Items { records } => records,
        other => return Err(unexpected(other)),
    };

    send(&mut stream, &Request::Logout { session_id }).await?;
    Ok(records)
}

async fn send(stream: &mut TcpStream, request: &Request) -> Result<(), SessionError> {
    let mut buf = BytesMut::new();
    request.write_message(&mut buf);
    stream.write_all(&buf).await?;
    Ok(())
}

async fn exchange(
    stream: &mut TcpStream,
    read_buf: &mut BytesMut,
    request: Request,
) -> Result<Response, SessionError> {
    send(stream, &request).await?;

    loop {
        if let Some(len) = frame_len(read_buf)? {
            let mut frame = read_buf.split_to(len);
            return Ok(read_response(&mut frame)?);
        }
        let n = stream.read_buf(read_buf).await?;
        if n == 0 {
            return Err(Error::Protocol("connection closed by share".to_string()).into());
        }
    }
}

fn unexpected(response: Response) -> SessionError {
    match response {
        Response::Error { message } => SessionError(message),
        other => SessionError(format!("unexpected response: {:?}", other)),
    }
}
