// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Serial link over a UART
//!
//! Frames records with [`encode_frame`] on the way out and runs every
//! received byte through a [`FrameDecoder`]. Bytes read past the end of a
//! frame stay buffered for the next call, so a read that carries more than
//! one frame loses nothing.
//!
//! ## Wiring (Mega / ESP32 example)
//!
//! | Command station | Network station |
//! |-----------------|-----------------|
//! | TX1             | RX2             |
//! | RX1             | TX2             |
//! | GND             | GND             |

use heapless::Deque;

use super::framing::{encode_frame, FrameDecoder, MAX_FRAME_PAYLOAD, MAX_FRAME_SIZE};
use super::Link;
use crate::error::{Error, Result};

/// Reads attempted per `try_recv` before giving up for this pass
const MAX_READS_PER_POLL: usize = 4;

/// UART abstraction
///
/// Platform implementations (AVR, ESP32, host byte streams) provide this
/// trait.
pub trait Uart {
    /// Write bytes to UART TX, returning how many were accepted
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Read whatever is already in the RX buffer (non-blocking)
    fn try_read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Flush TX buffer
    fn flush(&mut self) -> Result<()>;

    /// Number of bytes waiting in the RX buffer
    fn available(&self) -> usize;
}

/// [`Link`] over a [`Uart`]
pub struct SerialLink<U: Uart> {
    uart: U,
    decoder: FrameDecoder,
    rx: [u8; MAX_FRAME_SIZE],
    rx_len: usize,
    rx_pos: usize,
}

impl<U: Uart> SerialLink<U> {
    /// Create a link over `uart`
    pub fn new(uart: U) -> Self {
        Self {
            uart,
            decoder: FrameDecoder::new(),
            rx: [0u8; MAX_FRAME_SIZE],
            rx_len: 0,
            rx_pos: 0,
        }
    }

    /// Borrow the UART
    pub fn uart(&self) -> &U {
        &self.uart
    }

    /// Mutably borrow the UART
    pub fn uart_mut(&mut self) -> &mut U {
        &mut self.uart
    }

    /// Frames dropped for a bad length, CRC or end marker
    pub const fn rejected_frames(&self) -> u32 {
        self.decoder.rejected()
    }

    /// Give back the UART
    pub fn into_inner(self) -> U {
        self.uart
    }

    // Run buffered bytes through the decoder until one frame completes
    fn drain_pending(&mut self, buf: &mut [u8]) -> Option<Result<(usize, u8)>> {
        while self.rx_pos < self.rx_len {
            let byte = self.rx[self.rx_pos];
            self.rx_pos += 1;

            if let Some((channel, record)) = self.decoder.feed(byte) {
                if record.len() > buf.len() {
                    return Some(Err(Error::BufferTooSmall));
                }
                buf[..record.len()].copy_from_slice(record);
                return Some(Ok((record.len(), channel)));
            }
        }
        None
    }
}

impl<U: Uart> Link for SerialLink<U> {
    fn init(&mut self) -> Result<()> {
        self.decoder.reset();
        self.rx_len = 0;
        self.rx_pos = 0;
        Ok(())
    }

    fn send(&mut self, channel: u8, data: &[u8]) -> Result<usize> {
        let mut frame = [0u8; MAX_FRAME_SIZE];
        let frame_len = encode_frame(channel, data, &mut frame)?;

        let sent = self.uart.write(&frame[..frame_len])?;
        self.uart.flush()?;

        if sent != frame_len {
            log::error!("serial link: short write {}/{} bytes", sent, frame_len);
            return Err(Error::TransportError);
        }
        Ok(data.len())
    }

    fn try_recv(&mut self, buf: &mut [u8]) -> Result<(usize, u8)> {
        for _ in 0..MAX_READS_PER_POLL {
            if let Some(result) = self.drain_pending(buf) {
                return result;
            }

            let len = self.uart.try_read(&mut self.rx)?;
            if len == 0 {
                break;
            }
            self.rx_len = len;
            self.rx_pos = 0;
        }
        // Whatever was read last may still hold a complete frame
        self.drain_pending(buf).unwrap_or(Err(Error::WouldBlock))
    }

    fn mtu(&self) -> usize {
        MAX_FRAME_PAYLOAD
    }

    fn shutdown(&mut self) -> Result<()> {
        self.uart.flush()
    }
}

/// In-memory UART backed by two fixed-capacity byte queues
///
/// Bytes written by the owner land in `tx`; bytes the peer sends are
/// injected into `rx`. [`MemoryUart::transfer`] moves one side's TX into
/// the other side's RX, which is all a simulated cable needs.
#[derive(Debug, Default)]
pub struct MemoryUart<const N: usize> {
    tx: Deque<u8, N>,
    rx: Deque<u8, N>,
}

impl<const N: usize> MemoryUart<N> {
    /// Create an empty UART
    pub const fn new() -> Self {
        Self {
            tx: Deque::new(),
            rx: Deque::new(),
        }
    }

    /// Queue bytes on the RX side, returning how many fit
    pub fn inject(&mut self, data: &[u8]) -> usize {
        data.iter()
            .take_while(|&&b| self.rx.push_back(b).is_ok())
            .count()
    }

    /// Take up to `buf.len()` bytes from the TX side
    pub fn take_tx(&mut self, buf: &mut [u8]) -> usize {
        let mut n = 0;
        while n < buf.len() {
            match self.tx.pop_front() {
                Some(b) => {
                    buf[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        n
    }

    /// Bytes written and not yet taken
    pub fn tx_pending(&self) -> usize {
        self.tx.len()
    }

    /// Move everything `from` has written into `to`'s RX side
    pub fn transfer<const M: usize>(from: &mut MemoryUart<N>, to: &mut MemoryUart<M>) -> usize {
        let mut moved = 0;
        while let Some(&b) = from.tx.front() {
            if to.rx.push_back(b).is_err() {
                break;
            }
            from.tx.pop_front();
            moved += 1;
        }
        moved
    }
}

impl<const N: usize> Uart for MemoryUart<N> {
    fn write(&mut self, data: &[u8]) -> Result<usize> {
        Ok(data
            .iter()
            .take_while(|&&b| self.tx.push_back(b).is_ok())
            .count())
    }

    fn try_read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut n = 0;
        while n < buf.len() {
            match self.rx.pop_front() {
                Some(b) => {
                    buf[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn available(&self) -> usize {
        self.rx.len()
    }
}
