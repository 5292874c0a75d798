// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Channel framing for the serial byte stream
//!
//! The link between the stations is a raw UART, so record boundaries are
//! marked explicitly and every frame names the channel it travels on.
//!
//! ## Frame Format
//!
//! ```text
//! +------+------+---------+--------+---------+------+
//! | SYNC | LEN  | CHANNEL | RECORD |   CRC   | SYNC |
//! +------+------+---------+--------+---------+------+
//!   0xAA   1B      1B       0-70B     2B BE    0x55
//! ```
//!
//! The CRC-16-CCITT covers LEN, CHANNEL and RECORD.

use crate::error::{Error, Result};
use crate::record::RECORD_MAX_SIZE;

/// Frame start marker
pub const SYNC_START: u8 = 0xAA;

/// Frame end marker
pub const SYNC_END: u8 = 0x55;

/// Largest record carried by one frame
pub const MAX_FRAME_PAYLOAD: usize = RECORD_MAX_SIZE;

/// start(1) + len(1) + channel(1) + crc(2) + end(1)
pub const FRAME_OVERHEAD: usize = 6;

/// Largest frame on the wire
pub const MAX_FRAME_SIZE: usize = MAX_FRAME_PAYLOAD + FRAME_OVERHEAD;

/// Write one frame for `channel` around `data`, returning the frame length
pub fn encode_frame(channel: u8, data: &[u8], buf: &mut [u8]) -> Result<usize> {
    if data.len() > MAX_FRAME_PAYLOAD {
        return Err(Error::MessageTooLong);
    }
    let frame_len = data.len() + FRAME_OVERHEAD;
    if buf.len() < frame_len {
        return Err(Error::BufferTooSmall);
    }

    let body_end = 3 + data.len();
    buf[0] = SYNC_START;
    buf[1] = data.len() as u8;
    buf[2] = channel;
    buf[3..body_end].copy_from_slice(data);

    let crc = crc16_ccitt(&buf[1..body_end]);
    buf[body_end..body_end + 2].copy_from_slice(&crc.to_be_bytes());
    buf[body_end + 2] = SYNC_END;

    Ok(frame_len)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Length,
    Channel,
    Body,
    CrcHigh,
    CrcLow,
    End,
}

/// Byte-at-a-time frame parser
///
/// Garbage between frames is skipped. A bad length, CRC or end marker
/// drops the partial frame and counts it in [`FrameDecoder::rejected`].
#[derive(Debug)]
pub struct FrameDecoder {
    state: State,
    // len + channel + record, kept together for the CRC
    body: [u8; MAX_FRAME_PAYLOAD + 2],
    len: usize,
    filled: usize,
    crc: u16,
    rejected: u32,
}

impl FrameDecoder {
    /// Create an idle decoder
    pub const fn new() -> Self {
        Self {
            state: State::Idle,
            body: [0u8; MAX_FRAME_PAYLOAD + 2],
            len: 0,
            filled: 0,
            crc: 0,
            rejected: 0,
        }
    }

    /// Drop any partial frame
    pub fn reset(&mut self) {
        self.state = State::Idle;
        self.len = 0;
        self.filled = 0;
        self.crc = 0;
    }

    /// Check if a frame is partially received
    pub const fn is_receiving(&self) -> bool {
        !matches!(self.state, State::Idle)
    }

    /// Number of frames dropped since creation
    pub const fn rejected(&self) -> u32 {
        self.rejected
    }

    /// Feed one byte
    ///
    /// Returns `(channel, record)` when `byte` completes a valid frame.
    pub fn feed(&mut self, byte: u8) -> Option<(u8, &[u8])> {
        match self.state {
            State::Idle => {
                if byte == SYNC_START {
                    self.state = State::Length;
                }
            }
            State::Length => {
                if byte as usize > MAX_FRAME_PAYLOAD {
                    log::warn!("frame length {} out of range", byte);
                    self.reject(byte);
                    return None;
                }
                self.len = byte as usize;
                self.body[0] = byte;
                self.state = State::Channel;
            }
            State::Channel => {
                self.body[1] = byte;
                self.filled = 0;
                self.state = if self.len == 0 {
                    State::CrcHigh
                } else {
                    State::Body
                };
            }
            State::Body => {
                self.body[2 + self.filled] = byte;
                self.filled += 1;
                if self.filled == self.len {
                    self.state = State::CrcHigh;
                }
            }
            State::CrcHigh => {
                self.crc = u16::from(byte) << 8;
                self.state = State::CrcLow;
            }
            State::CrcLow => {
                self.crc |= u16::from(byte);
                self.state = State::End;
            }
            State::End => {
                let end = 2 + self.len;
                if byte == SYNC_END && self.crc == crc16_ccitt(&self.body[..end]) {
                    self.state = State::Idle;
                    return Some((self.body[1], &self.body[2..end]));
                }
                log::warn!("dropping corrupted frame ({} byte record)", self.len);
                self.reject(byte);
            }
        }
        None
    }

    // A rejected byte may itself open the next frame
    fn reject(&mut self, byte: u8) {
        self.rejected = self.rejected.wrapping_add(1);
        self.reset();
        if byte == SYNC_START {
            self.state = State::Length;
        }
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// CRC-16-CCITT (polynomial 0x1021, initial 0xFFFF)
pub fn crc16_ccitt(data: &[u8]) -> u16 {
    data.iter().fold(0xFFFF_u16, |crc, &byte| {
        (0..8).fold(crc ^ (u16::from(byte) << 8), |crc, _| {
            if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            }
        })
    })
}
