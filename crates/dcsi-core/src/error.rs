// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for the DCSI core

use core::fmt;

/// Result type for DCSI core operations
pub type Result<T> = core::result::Result<T, Error>;

/// Error type for the DCSI core
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Buffer too small for operation
    BufferTooSmall,

    /// All pool slots are in use
    PoolExhausted,

    /// Queue is full, element not queued
    QueueFull,

    /// Payload exceeds MAX_MESSAGE_SIZE
    MessageTooLong,

    /// Handle is nil, stale or belongs to another pool
    InvalidHandle,

    /// Message claims to originate from the receiving station
    SelfOrigin,

    /// Protocol not handled by this station role
    UnsupportedProtocol,

    /// Record encoding error
    EncodingError,

    /// Record decoding error
    DecodingError,

    /// Invalid or corrupted frame
    InvalidFrame,

    /// Transport error
    TransportError,

    /// Nothing available right now (non-blocking read)
    WouldBlock,

    /// Target network client is not connected
    ClientDisconnected,

    /// Command name not found in the command table
    UnknownCommand,

    /// Invalid parameter (count or type)
    InvalidParameter,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BufferTooSmall => write!(f, "Buffer too small"),
            Error::PoolExhausted => write!(f, "Message pool exhausted"),
            Error::QueueFull => write!(f, "Queue is full"),
            Error::MessageTooLong => write!(f, "Message too long"),
            Error::InvalidHandle => write!(f, "Invalid pool handle"),
            Error::SelfOrigin => write!(f, "Message originates from this station"),
            Error::UnsupportedProtocol => write!(f, "Protocol not supported on this station"),
            Error::EncodingError => write!(f, "Record encoding error"),
            Error::DecodingError => write!(f, "Record decoding error"),
            Error::InvalidFrame => write!(f, "Invalid or corrupted frame"),
            Error::TransportError => write!(f, "Transport error"),
            Error::WouldBlock => write!(f, "No data available"),
            Error::ClientDisconnected => write!(f, "Client not connected"),
            Error::UnknownCommand => write!(f, "Unknown command"),
            Error::InvalidParameter => write!(f, "Invalid parameter"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}
