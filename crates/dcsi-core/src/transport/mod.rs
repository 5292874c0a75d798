// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Link abstraction between the two stations
//!
//! A [`Link`] moves encoded records across the serial channel. Each record
//! travels with a one-byte channel identifier so both directions can share
//! one physical line.
//!
//! ## Design Principles
//!
//! - **No heap allocations** - fixed buffers only
//! - **Non-blocking** - `try_recv` returns `Error::WouldBlock` instead of waiting
//! - **Result-based** - no panics on malformed input

use crate::error::{Error, Result};

pub mod framing;
pub mod serial;

pub use framing::{crc16_ccitt, encode_frame, FrameDecoder, FRAME_OVERHEAD, MAX_FRAME_SIZE};
pub use serial::{MemoryUart, SerialLink, Uart};

/// Record transport between the stations
pub trait Link {
    /// Initialize the link
    ///
    /// Called once before the first pump.
    fn init(&mut self) -> Result<()>;

    /// Send one record on `channel`
    ///
    /// # Returns
    ///
    /// Number of record bytes sent
    fn send(&mut self, channel: u8, data: &[u8]) -> Result<usize>;

    /// Receive one complete record (non-blocking)
    ///
    /// # Returns
    ///
    /// `(record_len, channel)`, or `Err(Error::WouldBlock)` if no complete
    /// record is available yet.
    fn try_recv(&mut self, buf: &mut [u8]) -> Result<(usize, u8)>;

    /// Largest record accepted by `send`
    fn mtu(&self) -> usize;

    /// Shutdown the link
    fn shutdown(&mut self) -> Result<()>;
}

impl<L: Link + ?Sized> Link for &mut L {
    fn init(&mut self) -> Result<()> {
        (**self).init()
    }

    fn send(&mut self, channel: u8, data: &[u8]) -> Result<usize> {
        (**self).send(channel, data)
    }

    fn try_recv(&mut self, buf: &mut [u8]) -> Result<(usize, u8)> {
        (**self).try_recv(buf)
    }

    fn mtu(&self) -> usize {
        (**self).mtu()
    }

    fn shutdown(&mut self) -> Result<()> {
        (**self).shutdown()
    }
}

/// Null link (for testing)
///
/// Discards all records, never receives anything.
#[derive(Debug, Default)]
pub struct NullLink {
    sent: usize,
}

impl NullLink {
    /// Create a new null link
    pub const fn new() -> Self {
        Self { sent: 0 }
    }

    /// Number of records discarded so far
    pub const fn sent(&self) -> usize {
        self.sent
    }
}

impl Link for NullLink {
    fn init(&mut self) -> Result<()> {
        Ok(())
    }

    fn send(&mut self, _channel: u8, data: &[u8]) -> Result<usize> {
        self.sent += 1;
        Ok(data.len())
    }

    fn try_recv(&mut self, _buf: &mut [u8]) -> Result<(usize, u8)> {
        Err(Error::WouldBlock)
    }

    fn mtu(&self) -> usize {
        framing::MAX_FRAME_PAYLOAD
    }

    fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }
}
