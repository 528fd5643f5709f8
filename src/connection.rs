//! Share-side connection handling.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace};

use crate::Result;
use crate::message::{Request, Response, read_request};
use crate::protocol::{MessageWrite, frame_len};
use crate::share::Catalog;

/// Serve one client until it logs out or hangs up.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    catalog: Arc<Catalog>,
) -> Result<()> {
    stream.set_nodelay(true)?;
    let (mut read_half, mut write_half) = stream.into_split();

    let mut read_buf = BytesMut::with_capacity(8192);
    let mut session: Option<u32> = None;

    debug!("client connected from {}", addr);

    loop {
        let n = read_half.read_buf(&mut read_buf).await?;
        if n == 0 {
            break;
        }

        while let Some(len) = frame_len(&read_buf)? {
            let mut msg_buf = read_buf.split_to(len);
            let request = read_request(&mut msg_buf)?;
            trace!("{} -> {:?}", addr, request);

            match handle_request(request, &mut session, &catalog) {
                Some(response) => {
                    let mut buf = BytesMut::new();
                    response.write_message(&mut buf);
                    write_half.write_all(&buf).await?;
                }
                None => {
                    debug!("client {} logged out", addr);
                    return Ok(());
                }
            }
        }
    }

    debug!("client {} disconnected", addr);
    Ok(())
}

/// Answer one request. `None` means the client logged out.
pub fn handle_request(
    request: Request,
    session: &mut Option<u32>,
    catalog: &Catalog,
) -> Option<Response> {
    match request {
        Request::Login { client_name } => {
            let session_id = catalog.next_session_id();
            debug!("'{}' logged in as session {}", client_name, session_id);
            *session = Some(session_id);
            Some(Response::Login {
                session_id,
                share_name: catalog.name().to_string(),
            })
        }
        Request::Containers { session_id } => Some(match check_session(*session, session_id) {
            Ok(()) => Response::Containers {
                containers: catalog.container_entries(),
            },
            Err(response) => response,
        }),
        Request::Items { session_id } => Some(match check_session(*session, session_id) {
            Ok(()) => Response::Items {
                records: catalog.record_entries(),
            },
            Err(response) => response,
        }),
        Request::Logout { .. } => {
            *session = None;
            None
        }
    }
}

fn check_session(current: Option<u32>, requested: u32) -> std::result::Result<(), Response> {
    match current {
        Some(id) if id == requested => Ok(()),
        Some(_) => Err(Response::Error {
            message: format!("invalid session id {}", requested),
        }),
        None => Err(Response::Error {
            message: "not logged in".to_string(),
        }),
    }
}
