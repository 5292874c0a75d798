// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Build configuration shared by both stations.

/// Maximum payload length of one message (command or reply).
pub const MAX_MESSAGE_SIZE: usize = 64;

/// Capacity of the message pool and the message queue.
///
/// The queue holds one element less than this.
pub const MAX_QUEUE_SIZE: usize = 10;

/// Maximum number of concurrent network clients.
pub const MAX_SOCK_NUM: usize = 8;

/// Maximum number of network listeners on the network station.
pub const MAX_INTERFACES: usize = 4;

/// Maximum number of bytes read from a network client in one go.
pub const MAX_READ_BUFFER: usize = 512;

/// Capacity of the tokenizer carry-over buffer.
pub const OVERFLOW_SIZE: usize = MAX_MESSAGE_SIZE / 2;

/// Maximum number of parameters of a control command.
pub const MAX_PARAMS: usize = 5;

/// Serial channel carrying frames addressed to the command station.
pub const CHANNEL_TO_COMMAND_STATION: u8 = 0x12;

/// Serial channel carrying frames addressed to the network station.
pub const CHANNEL_TO_NETWORK_STATION: u8 = 0x34;

/// Default TCP listen port of the network station.
pub const LISTEN_PORT: u16 = 2560;
