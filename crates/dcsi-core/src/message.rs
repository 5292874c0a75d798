// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Message envelope exchanged between the two stations

use core::fmt;

use crate::config::MAX_MESSAGE_SIZE;
use crate::error::{Error, Result};

/// Bounded message payload
pub type Payload = heapless::String<MAX_MESSAGE_SIZE>;

const STATION_NAMES: [&str; 3] = ["CommandStation", "NetworkStation", "Unknown"];

const PROTOCOL_NAMES: [&str; 8] = [
    "DccEx",
    "WiThrottle",
    "Reply",
    "Diag",
    "Json",
    "Http",
    "Ctrl",
    "Unknown",
];

/// Role of a participant on the serial link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[repr(i8)]
pub enum StationId {
    /// Executes layout commands
    CommandStation = 0,
    /// Talks to network clients
    NetworkStation = 1,
    /// Not set up, or an out-of-range wire value
    #[default]
    Unknown = 2,
}

impl StationId {
    /// Map a wire value; anything out of range becomes `Unknown`
    pub const fn from_raw(raw: i8) -> Self {
        match raw {
            0 => StationId::CommandStation,
            1 => StationId::NetworkStation,
            _ => StationId::Unknown,
        }
    }

    /// Wire value
    pub const fn as_raw(self) -> i8 {
        self as i8
    }

    /// Human readable name
    pub const fn name(self) -> &'static str {
        STATION_NAMES[self as usize]
    }

    /// Name of a raw wire value, `"Unknown"` when out of range
    pub fn decode(raw: i8) -> &'static str {
        usize::try_from(raw)
            .ok()
            .and_then(|i| STATION_NAMES.get(i))
            .copied()
            .unwrap_or(STATION_NAMES[StationId::Unknown as usize])
    }

    /// The station at the other end of the link
    pub const fn counterpart(self) -> Self {
        match self {
            StationId::CommandStation => StationId::NetworkStation,
            StationId::NetworkStation => StationId::CommandStation,
            StationId::Unknown => StationId::Unknown,
        }
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Wire grammar / payload kind of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[repr(i8)]
pub enum ProtocolTag {
    /// `<...>` command protocol
    Command = 0,
    /// Newline terminated throttle protocol
    Throttle = 1,
    /// Reply from the command station to a network client
    Reply = 2,
    /// Diagnostic output from the command station
    Diag = 3,
    /// `{...}` JSON payload
    Json = 4,
    /// HTTP request text
    Http = 5,
    /// `<! ...>` administrative command
    Ctrl = 6,
    /// Unrecognized
    #[default]
    Unknown = 7,
}

impl ProtocolTag {
    /// Number of dispatchable tags (everything but `Unknown`)
    pub const COUNT: usize = 7;

    /// All dispatchable tags, in wire order
    pub const ALL: [ProtocolTag; Self::COUNT] = [
        ProtocolTag::Command,
        ProtocolTag::Throttle,
        ProtocolTag::Reply,
        ProtocolTag::Diag,
        ProtocolTag::Json,
        ProtocolTag::Http,
        ProtocolTag::Ctrl,
    ];

    /// Map a wire value; anything out of range becomes `Unknown`
    pub const fn from_raw(raw: i8) -> Self {
        match raw {
            0 => ProtocolTag::Command,
            1 => ProtocolTag::Throttle,
            2 => ProtocolTag::Reply,
            3 => ProtocolTag::Diag,
            4 => ProtocolTag::Json,
            5 => ProtocolTag::Http,
            6 => ProtocolTag::Ctrl,
            _ => ProtocolTag::Unknown,
        }
    }

    /// Wire value
    pub const fn as_raw(self) -> i8 {
        self as i8
    }

    /// Human readable name
    pub const fn name(self) -> &'static str {
        PROTOCOL_NAMES[self as usize]
    }

    /// Name of a raw wire value, `"Unknown"` when out of range
    pub fn decode(raw: i8) -> &'static str {
        usize::try_from(raw)
            .ok()
            .and_then(|i| PROTOCOL_NAMES.get(i))
            .copied()
            .unwrap_or(PROTOCOL_NAMES[ProtocolTag::Unknown as usize])
    }
}

impl fmt::Display for ProtocolTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What the router does with a message when it is popped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Action {
    /// Arrived over the link: dispatch through the protocol table
    #[default]
    Receive,
    /// Produced locally: serialize onto the link
    Transmit,
}

/// One command or reply crossing the serial link
///
/// The footprint is fixed at compile time; the payload never grows past
/// [`MAX_MESSAGE_SIZE`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    /// Station that produced the message
    pub origin: StationId,
    /// Sequence number assigned by the producing router
    pub sequence: u64,
    /// Originating network client (0 for station-internal traffic)
    pub client: u16,
    /// Payload kind
    pub protocol: ProtocolTag,
    /// Next step in the router
    pub action: Action,
    payload: Payload,
}

impl Message {
    /// Build a message, checking the payload length
    pub fn new(
        origin: StationId,
        sequence: u64,
        client: u16,
        protocol: ProtocolTag,
        payload: &str,
    ) -> Result<Self> {
        let mut msg = Self {
            origin,
            sequence,
            client,
            protocol,
            action: Action::Receive,
            payload: Payload::new(),
        };
        msg.set_payload(payload)?;
        Ok(msg)
    }

    /// Payload text
    pub fn payload(&self) -> &str {
        self.payload.as_str()
    }

    /// Replace the payload
    ///
    /// Fails with `Error::MessageTooLong` (payload untouched) if `text`
    /// exceeds [`MAX_MESSAGE_SIZE`].
    pub fn set_payload(&mut self, text: &str) -> Result<()> {
        if text.len() > MAX_MESSAGE_SIZE {
            return Err(Error::MessageTooLong);
        }
        self.payload.clear();
        self.payload
            .push_str(text)
            .map_err(|_| Error::MessageTooLong)
    }

    /// Copy every field of `src` except the action
    pub fn copy_from(&mut self, src: &Message) {
        self.origin = src.origin;
        self.sequence = src.sequence;
        self.client = src.client;
        self.protocol = src.protocol;
        self.payload.clone_from(&src.payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_station_decode() {
        assert_eq!(StationId::decode(0), "CommandStation");
        assert_eq!(StationId::decode(1), "NetworkStation");
        assert_eq!(StationId::decode(2), "Unknown");
        assert_eq!(StationId::decode(3), "Unknown");
        assert_eq!(StationId::decode(-1), "Unknown");
        assert_eq!(StationId::from_raw(42), StationId::Unknown);
    }

    #[test]
    fn test_protocol_decode() {
        assert_eq!(ProtocolTag::decode(0), "DccEx");
        assert_eq!(ProtocolTag::decode(6), "Ctrl");
        assert_eq!(ProtocolTag::decode(7), "Unknown");
        assert_eq!(ProtocolTag::decode(8), "Unknown");
        assert_eq!(ProtocolTag::decode(i8::MIN), "Unknown");
        assert_eq!(ProtocolTag::from_raw(100), ProtocolTag::Unknown);
    }

    #[test]
    fn test_protocol_raw_roundtrip() {
        for tag in ProtocolTag::ALL {
            assert_eq!(ProtocolTag::from_raw(tag.as_raw()), tag);
        }
    }

    #[test]
    fn test_counterpart() {
        assert_eq!(
            StationId::CommandStation.counterpart(),
            StationId::NetworkStation
        );
        assert_eq!(StationId::Unknown.counterpart(), StationId::Unknown);
    }

    #[test]
    fn test_payload_limit() {
        let ok = [b'a'; MAX_MESSAGE_SIZE];
        let ok = core::str::from_utf8(&ok).unwrap();
        assert!(Message::new(StationId::NetworkStation, 0, 1, ProtocolTag::Command, ok).is_ok());

        let long = [b'a'; MAX_MESSAGE_SIZE + 1];
        let long = core::str::from_utf8(&long).unwrap();
        assert_eq!(
            Message::new(StationId::NetworkStation, 0, 1, ProtocolTag::Command, long),
            Err(Error::MessageTooLong)
        );
    }

    #[test]
    fn test_set_payload_keeps_old_on_error() {
        let mut msg =
            Message::new(StationId::CommandStation, 1, 2, ProtocolTag::Reply, "<O>").unwrap();
        let long = [b'x'; MAX_MESSAGE_SIZE + 10];
        let long = core::str::from_utf8(&long).unwrap();

        assert_eq!(msg.set_payload(long), Err(Error::MessageTooLong));
        assert_eq!(msg.payload(), "<O>");
    }
}
