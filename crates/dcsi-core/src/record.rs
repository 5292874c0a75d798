// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Compact binary record for one [`Message`] on the serial link
//!
//! Fixed buffers, no allocation, little endian, no alignment padding.
//!
//! ## Record Layout
//!
//! ```text
//! +--------+----------+--------+----------+-----+-----------+
//! | ORIGIN | SEQUENCE | CLIENT | PROTOCOL | LEN | PAYLOAD   |
//! +--------+----------+--------+----------+-----+-----------+
//!    i8      i16 LE      i8       i8        u8    0-64B UTF-8
//! ```
//!
//! Only the low 16 bits of the sequence counter travel on the wire. The
//! action is never encoded: whatever arrives is a `Receive`.

use crate::config::MAX_MESSAGE_SIZE;
use crate::error::{Error, Result};
use crate::message::{Action, Message, ProtocolTag, StationId};

/// Fixed header size: origin(1) + sequence(2) + client(1) + protocol(1) + len(1)
pub const RECORD_HEADER_SIZE: usize = 6;

/// Largest encoded record
pub const RECORD_MAX_SIZE: usize = RECORD_HEADER_SIZE + MAX_MESSAGE_SIZE;

/// Record writer over a caller-provided buffer
///
/// # Example
///
/// ```ignore
/// let mut buf = [0u8; RECORD_MAX_SIZE];
/// let mut encoder = RecordEncoder::new(&mut buf);
///
/// encoder.encode_i8(1)?;
/// encoder.encode_str("<s>")?;
///
/// let bytes = encoder.finish();
/// ```
pub struct RecordEncoder<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> RecordEncoder<'a> {
    /// Create a new record encoder
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Get current position
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Finish encoding and return written bytes
    pub fn finish(self) -> &'a [u8] {
        &self.buf[..self.pos]
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let end = self.pos + bytes.len();
        if end > self.buf.len() {
            return Err(Error::BufferTooSmall);
        }
        self.buf[self.pos..end].copy_from_slice(bytes);
        self.pos = end;
        Ok(())
    }

    /// Encode u8
    pub fn encode_u8(&mut self, value: u8) -> Result<()> {
        self.write_bytes(&[value])
    }

    /// Encode i8
    pub fn encode_i8(&mut self, value: i8) -> Result<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Encode i16
    pub fn encode_i16(&mut self, value: i16) -> Result<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Encode a string with a one-byte length prefix
    pub fn encode_str(&mut self, value: &str) -> Result<()> {
        let len = u8::try_from(value.len()).map_err(|_| Error::EncodingError)?;
        self.encode_u8(len)?;
        self.write_bytes(value.as_bytes())
    }
}

/// Record reader over a received buffer
pub struct RecordDecoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> RecordDecoder<'a> {
    /// Create a new record decoder
    pub const fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Get remaining bytes
    pub const fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        let end = self.pos + count;
        if end > self.buf.len() {
            return Err(Error::DecodingError);
        }
        let bytes = &self.buf[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    /// Decode u8
    pub fn decode_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    /// Decode i8
    pub fn decode_i8(&mut self) -> Result<i8> {
        Ok(self.decode_u8()? as i8)
    }

    /// Decode i16
    pub fn decode_i16(&mut self) -> Result<i16> {
        let bytes = self.read_bytes(2)?;
        Ok(i16::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// Decode a length-prefixed string (borrowed, zero-copy)
    pub fn decode_str(&mut self) -> Result<&'a str> {
        let len = self.decode_u8()? as usize;
        let bytes = self.read_bytes(len)?;
        core::str::from_utf8(bytes).map_err(|_| Error::DecodingError)
    }
}

/// Serialize `msg` into `buf`, returning the record length
///
/// Fails with `Error::EncodingError` when the client id does not fit the
/// wire field, `Error::BufferTooSmall` when `buf` is short.
pub fn encode_message(msg: &Message, buf: &mut [u8]) -> Result<usize> {
    let client = i8::try_from(msg.client).map_err(|_| Error::EncodingError)?;

    let mut encoder = RecordEncoder::new(buf);
    encoder.encode_i8(msg.origin.as_raw())?;
    encoder.encode_i16(msg.sequence as u16 as i16)?;
    encoder.encode_i8(client)?;
    encoder.encode_i8(msg.protocol.as_raw())?;
    encoder.encode_str(msg.payload())?;
    Ok(encoder.position())
}

/// Parse a record produced by [`encode_message`]
///
/// Trailing bytes after the payload are rejected.
pub fn decode_message(buf: &[u8]) -> Result<Message> {
    let mut decoder = RecordDecoder::new(buf);

    let origin = StationId::from_raw(decoder.decode_i8()?);
    let sequence = decoder.decode_i16()? as u16 as u64;
    let client = decoder.decode_i8()?;
    let protocol = ProtocolTag::from_raw(decoder.decode_i8()?);
    let payload = decoder.decode_str()?;

    if decoder.remaining() != 0 {
        return Err(Error::DecodingError);
    }
    let client = u16::try_from(client).map_err(|_| Error::DecodingError)?;

    let mut msg = Message::new(origin, sequence, client, protocol, payload)
        .map_err(|_| Error::DecodingError)?;
    msg.action = Action::Receive;
    Ok(msg)
}
