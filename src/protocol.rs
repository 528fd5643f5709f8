//! Protocol primitives for reading and writing catalog messages.
//!
//! All integers are little-endian. Strings are prefixed with a u32 length.

use bytes::{Buf, BufMut, BytesMut};

use crate::constants::MAX_FRAME_LEN;
use crate::{Error, Result};

/// Trait for reading protocol primitives from a buffer.
pub trait ProtocolRead: Sized {
    fn read_from<B: Buf>(buf: &mut B) -> Result<Self>;
}

/// Trait for writing protocol primitives to a buffer.
pub trait ProtocolWrite {
    fn write_to<B: BufMut>(&self, buf: &mut B);
}

/// Trait for reading complete messages with a code prefix.
pub trait MessageRead: Sized {
    type Code;

    /// Read a message from the buffer, given its code.
    fn read_with_code<B: Buf>(code: Self::Code, buf: &mut B) -> Result<Self>;
}

/// Trait for writing complete messages with a code prefix.
pub trait MessageWrite {
    type Code: Into<u32> + Copy;

    /// Get the message code.
    fn code(&self) -> Self::Code;

    /// Write the message contents (without length prefix or code).
    fn write_payload<B: BufMut>(&self, buf: &mut B);

    /// Write a complete message with length prefix and code.
    fn write_message<B: BufMut>(&self, buf: &mut B) {
        let mut payload = BytesMut::new();
        self.write_payload(&mut payload);

        let code: u32 = self.code().into();
        let total_len = 4 + payload.len(); // code (4 bytes) + payload
        buf.put_u32_le(total_len as u32);
        buf.put_u32_le(code);
        buf.put_slice(&payload);
    }
}

/// Length of the first complete frame in `buf`, length prefix included.
///
/// Returns `Ok(None)` while the frame is still incomplete.
pub fn frame_len(buf: &[u8]) -> Result<Option<usize>> {
    if buf.len() < 4 {
        return Ok(None);
    }
    let msg_len = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    if msg_len > MAX_FRAME_LEN {
        return Err(Error::FrameTooLarge(msg_len));
    }
    if buf.len() < 4 + msg_len {
        return Ok(None);
    }
    Ok(Some(4 + msg_len))
}

// Primitive implementations

impl ProtocolRead for u32 {
    fn read_from<B: Buf>(buf: &mut B) -> Result<Self> {
        if buf.remaining() < 4 {
            return Err(Error::BufferUnderflow {
                needed: 4,
                available: buf.remaining(),
            });
        }
        Ok(buf.get_u32_le())
    }
}

impl ProtocolWrite for u32 {
    fn write_to<B: BufMut>(&self, buf: &mut B) {
        buf.put_u32_le(*self);
    }
}

impl ProtocolRead for String {
    fn read_from<B: Buf>(buf: &mut B) -> Result<Self> {
        let len = u32::read_from(buf)? as usize;
        if buf.remaining() < len {
            return Err(Error::BufferUnderflow {
                needed: len,
                available: buf.remaining(),
            });
        }
        let mut bytes = vec![0u8; len];
        buf.copy_to_slice(&mut bytes);
        Ok(String::from_utf8(bytes)?)
    }
}

impl ProtocolWrite for String {
    fn write_to<B: BufMut>(&self, buf: &mut B) {
        self.as_str().write_to(buf);
    }
}

impl ProtocolWrite for &str {
    fn write_to<B: BufMut>(&self, buf: &mut B) {
        buf.put_u32_le(self.len() as u32);
        buf.put_slice(self.as_bytes());
    }
}

/// Read a list of items from a buffer.
pub fn read_list<B, T, F>(buf: &mut B, read_fn: F) -> Result<Vec<T>>
where
    B: Buf,
    F: Fn(&mut B) -> Result<T>,
{
    let count = u32::read_from(buf)? as usize;
    // Every item takes at least four bytes on the wire.
    let mut items = Vec::with_capacity(count.min(buf.remaining() / 4));
    for _ in 0..count {
        items.push(read_fn(buf)?);
    }
    Ok(items)
}

/// Write a list of items to a buffer.
pub fn write_list<B, T, F>(buf: &mut B, items: &[T], write_fn: F)
where
    B: BufMut,
    F: Fn(&mut B, &T),
{
    buf.put_u32_le(items.len() as u32);
    for item in items {
        write_fn(buf, item);
    }
}
