//! Catalog messages exchanged between a share and its clients.
//!
//! Every frame is `u32` length, `u32` code, payload. Requests and responses
//! share the code space; the direction decides which enum a frame decodes to.

use bytes::{Buf, BufMut};

use crate::protocol::{
    MessageRead, MessageWrite, ProtocolRead, ProtocolWrite, read_list, write_list,
};
use crate::{Error, Result};

/// Catalog message codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum MessageCode {
    Login = 1,
    Containers = 2,
    Items = 3,
    Logout = 4,
    Error = 100,
}

impl TryFrom<u32> for MessageCode {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            1 => Ok(MessageCode::Login),
            2 => Ok(MessageCode::Containers),
            3 => Ok(MessageCode::Items),
            4 => Ok(MessageCode::Logout),
            100 => Ok(MessageCode::Error),
            _ => Err(Error::InvalidMessageCode(value)),
        }
    }
}

impl From<MessageCode> for u32 {
    fn from(code: MessageCode) -> Self {
        code as u32
    }
}

/// One shared item as listed on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordEntry {
    pub key: u32,
    pub location: String,
}

impl RecordEntry {
    pub fn new(key: u32, location: impl Into<String>) -> Self {
        Self {
            key,
            location: location.into(),
        }
    }
}

impl ProtocolRead for RecordEntry {
    fn read_from<B: Buf>(buf: &mut B) -> Result<Self> {
        let key = u32::read_from(buf)?;
        let location = String::read_from(buf)?;
        Ok(RecordEntry { key, location })
    }
}

impl ProtocolWrite for RecordEntry {
    fn write_to<B: BufMut>(&self, buf: &mut B) {
        self.key.write_to(buf);
        self.location.write_to(buf);
    }
}

/// Summary of a container as listed on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerEntry {
    pub id: u32,
    pub name: String,
    pub item_count: u32,
}

impl ProtocolRead for ContainerEntry {
    fn read_from<B: Buf>(buf: &mut B) -> Result<Self> {
        let id = u32::read_from(buf)?;
        let name = String::read_from(buf)?;
        let item_count = u32::read_from(buf)?;
        Ok(ContainerEntry {
            id,
            name,
            item_count,
        })
    }
}

impl ProtocolWrite for ContainerEntry {
    fn write_to<B: BufMut>(&self, buf: &mut B) {
        self.id.write_to(buf);
        self.name.write_to(buf);
        self.item_count.write_to(buf);
    }
}

/// Messages sent by a client to a share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Login { client_name: String },
    Containers { session_id: u32 },
    Items { session_id: u32 },
    Logout { session_id: u32 },
}

/// Messages sent by a share to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Login { session_id: u32, share_name: String },
    Containers { containers: Vec<ContainerEntry> },
    Items { records: Vec<RecordEntry> },
    Error { message: String },
}

impl MessageWrite for Request {
    type Code = MessageCode;

    fn code(&self) -> MessageCode {
        match self {
            Request::Login { .. } => MessageCode::Login,
            Request::Containers { .. } => MessageCode::Containers,
            Request::Items { .. } => MessageCode::Items,
            Request::Logout { .. } => MessageCode::Logout,
        }
    }

    fn write_payload<B: BufMut>(&self, buf: &mut B) {
        match self {
            Request::Login { client_name } => client_name.write_to(buf),
            Request::Containers { session_id }
            | Request::Items { session_id }
            | Request::Logout { session_id } => session_id.write_to(buf),
        }
    }
}

impl MessageRead for Request {
    type Code = MessageCode;

    fn read_with_code<B: Buf>(code: MessageCode, buf: &mut B) -> Result<Self> {
        match code {
            MessageCode::Login => Ok(Request::Login {
                client_name: String::read_from(buf)?,
            }),
            MessageCode::Containers => Ok(Request::Containers {
                session_id: u32::read_from(buf)?,
            }),
            MessageCode::Items => Ok(Request::Items {
                session_id: u32::read_from(buf)?,
            }),
            MessageCode::Logout => Ok(Request::Logout {
                session_id: u32::read_from(buf)?,
            }),
            MessageCode::Error => Err(Error::Protocol(format!(
                "Message code {:?} is response-only, not expected in request",
                code
            ))),
        }
    }
}

impl MessageWrite for Response {
    type Code = MessageCode;

    fn code(&self) -> MessageCode {
        match self {
            Response::Login { .. } => MessageCode::Login,
            Response::Containers { .. } => MessageCode::Containers,
            Response::Items { .. } => MessageCode::Items,
            Response::Error { .. } => MessageCode::Error,
        }
    }

    fn write_payload<B: BufMut>(&self, buf: &mut B) {
        match self {
            Response::Login {
                session_id,
                share_name,
            } => {
                session_id.write_to(buf);
                share_name.write_to(buf);
            }
            Response::Containers { containers } => {
                write_list(buf, containers, |b, c| c.write_to(b));
            }
            Response::Items { records } => {
                write_list(buf, records, |b, r| r.write_to(b));
            }
            Response::Error { message } => message.write_to(buf),
        }
    }
}

impl MessageRead for Response {
    type Code = MessageCode;

    fn read_with_code<B: Buf>(code: MessageCode, buf: &mut B) -> Result<Self> {
        match code {
            MessageCode::Login => {
                let session_id = u32::read_from(buf)?;
                let share_name = String::read_from(buf)?;
                Ok(Response::Login {
                    session_id,
                    share_name,
                })
            }
            MessageCode::Containers => Ok(Response::Containers {
                containers: read_list(buf, ContainerEntry::read_from)?,
            }),
            MessageCode::Items => Ok(Response::Items {
                records: read_list(buf, RecordEntry::read_from)?,
            }),
            MessageCode::Error => Ok(Response::Error {
                message: String::read_from(buf)?,
            }),
            MessageCode::Logout => Err(Error::Protocol(format!(
                "Message code {:?} is send-only, not expected in response",
                code
            ))),
        }
    }
}

/// Read a request from a buffer (including length prefix).
pub fn read_request<B: Buf>(buf: &mut B) -> Result<Request> {
    let _len = u32::read_from(buf)?;
    let code = MessageCode::try_from(u32::read_from(buf)?)?;
    Request::read_with_code(code, buf)
}

/// Read a response from a buffer (including length prefix).
pub fn read_response<B: Buf>(buf: &mut B) -> Result<Response> {
    let _len = u32::read_from(buf)?;
    let code = MessageCode::try_from(u32::read_from(buf)?)?;
    Response::read_with_code(code, buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn test_items_response_roundtrip() {
        let resp = Response::Items {
            records: vec![
                RecordEntry::new(1, "/music/song.mp3"),
                RecordEntry::new(2, "/music/other.mp3"),
            ],
        };
        let mut buf = BytesMut::new();
        resp.write_message(&mut buf);
        assert_eq!(read_response(&mut buf.freeze()).unwrap(), resp);
    }

    #[test]
    fn test_length_prefix_covers_code_and_payload() {
        let req = Request::Items { session_id: 3 };
        let mut buf = BytesMut::new();
        req.write_message(&mut buf);
        assert_eq!(buf.len(), 12);
        assert_eq!(u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]), 8);
    }

    #[test]
    fn test_error_code_rejected_as_request() {
        let resp = Response::Error {
            message: "nope".to_string(),
        };
        let mut buf = BytesMut::new();
        resp.write_message(&mut buf);
        assert!(read_request(&mut buf.freeze()).is_err());
    }

    #[test]
    fn test_unknown_code() {
        let mut buf = BytesMut::new();
        buf.put_u32_le(4);
        buf.put_u32_le(42);
        assert!(matches!(
            read_request(&mut buf.freeze()),
            Err(Error::InvalidMessageCode(42))
        ));
    }
}
