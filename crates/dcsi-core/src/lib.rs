// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # DCSI Core - Station bridge for DCC command stations
//!
//! A `no_std` core linking a command station (which drives the layout) to a
//! network station (which talks to throttles and browsers) over one serial
//! line, for microcontrollers such as the Arduino Mega and ESP32.
//!
//! ## Design Constraints
//!
//! - **No heap allocations** - pools, queues and buffers are fixed at compile time
//! - **Bounded work per loop pass** - one message per `pump`
//! - **Malformed input is dropped, never fatal**
//! - **`no_std` compatible**
//!
//! ## Architecture
//!
//! ```text
//! +-----------------------------------------+
//! |  Network clients (TCP)                  |
//! +-----------------------------------------+
//!           v                    ^
//! +-----------------------------------------+
//! |  Sniffer / CommandTokenizer             |
//! +-----------------------------------------+
//!           v                    ^
//! +-----------------------------------------+
//! |  Router (Pool, Queue, dispatch table)   |
//! +-----------------------------------------+
//!           v                    ^
//! +-----------------------------------------+
//! |  Record codec                           |
//! +-----------------------------------------+
//!           v                    ^
//! +-----------------------------------------+
//! |  Link (framed serial channel)           |
//! +-----------------------------------------+
//! ```
//!
//! ## Feature Flags
//!
//! - `mega` -- Arduino Mega build of the command station
//! - `esp32` -- ESP32 build of the network station
//! - `std` -- Enable std (for host builds and testing)

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Compile-time limits and channel identifiers
pub mod config;

/// Administrative command parsing and table
pub mod control;

/// Error types for the DCSI core
pub mod error;

/// Message envelope, station and protocol tags
pub mod message;

/// Fixed-capacity slot pool
pub mod pool;

/// Fixed-capacity circular queue
pub mod queue;

/// Binary record codec for messages
pub mod record;

/// Station router and dispatch
pub mod router;

/// First-bytes protocol detection
pub mod sniffer;

/// Multi-grammar command tokenizer
pub mod tokenizer;

/// Link abstraction, framing and serial link
pub mod transport;

// Re-exports for convenience
pub use crate::control::{CommandLine, ControlAction, ControlTable};
pub use crate::error::{Error, Result};
pub use crate::message::{Action, Message, Payload, ProtocolTag, StationId};
pub use crate::pool::{Handle, Pool};
pub use crate::queue::Queue;
pub use crate::router::{Handler, Router, RouterStats, StationServices};
pub use crate::tokenizer::CommandTokenizer;
pub use crate::transport::{Link, NullLink};

/// Version of DCSI Core
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
