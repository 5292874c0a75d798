// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Station router
//!
//! One [`Router`] per station owns the message pool, the message queue,
//! the link to the counterpart station and the protocol dispatch table.
//! Everything runs from one cooperative loop:
//!
//! ```text
//!  network tokens --enqueue_outbound--> [Queue] --pump--> Transmit --> Link
//!  Link --service_link--> on_wire_receive --> [Queue] --pump--> Receive --> handler
//! ```
//!
//! `pump` drains at most one message per call and then services the link,
//! so every loop pass does a bounded amount of work.

use crate::config::{
    CHANNEL_TO_COMMAND_STATION, CHANNEL_TO_NETWORK_STATION, MAX_QUEUE_SIZE,
};
use crate::control::{CommandLine, ControlAction, ControlTable};
use crate::error::{Error, Result};
use crate::message::{Action, Message, Payload, ProtocolTag, StationId};
use crate::pool::{Handle, Pool};
use crate::queue::Queue;
use crate::record::{decode_message, encode_message, RECORD_MAX_SIZE};
use crate::transport::Link;

/// Reply sent to a client when its command fails
pub const ERROR_REPLY: &str = "<X>";

/// Collaborators the router calls into while dispatching
pub trait StationServices {
    /// Run a command on the local executor
    ///
    /// Text written to `reply` is sent back to the originating client.
    fn execute(&mut self, line: &CommandLine<'_>, reply: &mut Payload) -> Result<()>;

    /// Write text to network client `client`
    ///
    /// Returns `Error::ClientDisconnected` when the client is gone.
    fn deliver(&mut self, client: u16, text: &str) -> Result<()>;
}

/// What to do with a received message of a given protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    /// Run on the local command executor and reply
    Command,
    /// Apply an administrative command
    Control,
    /// Accepted and dropped (reserved)
    Ignore,
    /// Forward a reply to the originating client
    Reply,
    /// Forward diagnostic text to the bound client
    Diag,
    /// Not valid on this station role
    NotYetSupported,
}

/// Dispatch table for `station`, indexed by protocol tag
pub const fn dispatch_table(station: StationId) -> [Handler; ProtocolTag::COUNT] {
    let mut table = [Handler::NotYetSupported; ProtocolTag::COUNT];
    match station {
        StationId::CommandStation => {
            table[ProtocolTag::Command as usize] = Handler::Command;
            table[ProtocolTag::Ctrl as usize] = Handler::Control;
        }
        StationId::NetworkStation => {
            table[ProtocolTag::Reply as usize] = Handler::Reply;
            table[ProtocolTag::Diag as usize] = Handler::Diag;
            table[ProtocolTag::Ctrl as usize] = Handler::Ignore;
        }
        StationId::Unknown => {}
    }
    table
}

/// Serial channel on which `station` receives
pub const fn channel_of(station: StationId) -> Option<u8> {
    match station {
        StationId::CommandStation => Some(CHANNEL_TO_COMMAND_STATION),
        StationId::NetworkStation => Some(CHANNEL_TO_NETWORK_STATION),
        StationId::Unknown => None,
    }
}

/// Router counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterStats {
    /// Messages queued for transmission
    pub enqueued: u64,
    /// Messages queued after arriving over the link
    pub received: u64,
    /// Received messages handed to a handler
    pub dispatched: u64,
    /// Records written to the link
    pub transmitted: u64,
    /// Drops because the pool was exhausted
    pub pool_drops: u64,
    /// Drops because the queue was full
    pub queue_drops: u64,
    /// Records claiming to come from this station
    pub self_origin: u64,
    /// Messages whose protocol this station does not handle
    pub unsupported: u64,
    /// Records that failed to encode or decode
    pub codec_errors: u64,
    /// Link send failures and frames on a foreign channel
    pub link_errors: u64,
}

/// Message router of one station
pub struct Router<L: Link> {
    station: StationId,
    pool: Pool<Message, MAX_QUEUE_SIZE>,
    queue: Queue<Handle, MAX_QUEUE_SIZE>,
    sequence: u64,
    link: L,
    table: [Handler; ProtocolTag::COUNT],
    diag_client: Option<u16>,
    stats: RouterStats,
}

impl<L: Link> Router<L> {
    /// Create the router of `station` over `link`
    ///
    /// The station identity is fixed for the router's lifetime.
    pub fn new(station: StationId, link: L) -> Self {
        Self {
            station,
            pool: Pool::with_tag(station.as_raw() as u8),
            queue: Queue::new(),
            sequence: 0,
            link,
            table: dispatch_table(station),
            diag_client: None,
            stats: RouterStats::default(),
        }
    }

    /// Initialize the link
    pub fn init(&mut self) -> Result<()> {
        log::info!("{} router starting", self.station);
        self.link.init()
    }

    /// Station identity
    pub const fn station(&self) -> StationId {
        self.station
    }

    /// Borrow the link
    pub fn link(&self) -> &L {
        &self.link
    }

    /// Mutably borrow the link
    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    /// Counters
    pub const fn stats(&self) -> &RouterStats {
        &self.stats
    }

    /// Messages waiting in the queue
    pub const fn pending(&self) -> usize {
        self.queue.size()
    }

    /// Sequence number the next outbound message will carry
    pub const fn next_sequence(&self) -> u64 {
        self.sequence
    }

    /// Client currently receiving diagnostics
    pub const fn diag_client(&self) -> Option<u16> {
        self.diag_client
    }

    /// Handler installed for `protocol`
    pub fn handler(&self, protocol: ProtocolTag) -> Handler {
        self.table
            .get(protocol as usize)
            .copied()
            .unwrap_or(Handler::NotYetSupported)
    }

    /// Name of a raw protocol tag, `"Unknown"` when out of range
    pub fn decode(&self, tag: i8) -> &'static str {
        ProtocolTag::decode(tag)
    }

    /// Queue a locally produced message for transmission
    ///
    /// Stamps origin and the next sequence number. A full pool or queue
    /// drops the message (logged); nothing blocks.
    pub fn enqueue_outbound(
        &mut self,
        client: u16,
        protocol: ProtocolTag,
        payload: &str,
    ) -> Result<()> {
        let handle = self.allocate()?;
        let origin = self.station;
        let sequence = self.sequence;
        self.sequence += 1;

        if let Err(e) = self.fill(handle, |slot| {
            slot.origin = origin;
            slot.sequence = sequence;
            slot.client = client;
            slot.protocol = protocol;
            slot.action = Action::Transmit;
            slot.set_payload(payload)
        }) {
            log::error!("outbound {} message for client {}: {}", protocol, client, e);
            return Err(e);
        }

        self.push(handle)?;
        self.stats.enqueued += 1;
        log::debug!(
            "queued #{} {} for client {}: {}",
            sequence,
            protocol,
            client,
            payload
        );
        Ok(())
    }

    /// Queue a message that arrived over the link
    ///
    /// A message claiming this station as origin is a protocol violation
    /// and is dropped.
    pub fn on_wire_receive(&mut self, msg: &Message) -> Result<()> {
        if msg.origin == self.station {
            log::error!(
                "dropping #{} {}: originates from this station",
                msg.sequence,
                msg.protocol
            );
            self.stats.self_origin += 1;
            return Err(Error::SelfOrigin);
        }

        let handle = self.allocate()?;
        self.fill(handle, |slot| {
            slot.copy_from(msg);
            slot.action = Action::Receive;
            Ok(())
        })?;
        self.push(handle)?;
        self.stats.received += 1;
        Ok(())
    }

    /// Decode one record received on `channel` and queue it
    pub fn receive_record(&mut self, channel: u8, record: &[u8]) -> Result<()> {
        if Some(channel) != channel_of(self.station) {
            log::warn!("dropping frame on foreign channel {:#04x}", channel);
            self.stats.link_errors += 1;
            return Err(Error::InvalidFrame);
        }
        let msg = decode_message(record).map_err(|e| {
            log::error!("undecodable record ({} bytes): {}", record.len(), e);
            self.stats.codec_errors += 1;
            e
        })?;
        self.on_wire_receive(&msg)
    }

    /// Queue diagnostic text for the bound diagnostic client
    ///
    /// Does nothing until a client has been bound with `<!diag n>`.
    pub fn enqueue_diagnostic(&mut self, text: &str) -> Result<()> {
        match self.diag_client {
            Some(client) => self.enqueue_outbound(client, ProtocolTag::Diag, text),
            None => {
                log::trace!("no diagnostic client bound, dropped: {}", text);
                Ok(())
            }
        }
    }

    /// One loop step
    ///
    /// Processes at most one queued message, then services the link once.
    /// Returns `true` if a message was processed.
    pub fn pump<S: StationServices>(&mut self, services: &mut S) -> bool {
        let processed = match self.next_message() {
            Some((handle, msg)) => {
                match msg.action {
                    Action::Receive => self.dispatch(&msg, services),
                    Action::Transmit => self.transmit(&msg),
                }
                let _ = self.pool.release(handle);
                true
            }
            None => false,
        };
        self.service_link();
        processed
    }

    /// Move complete records from the link into the queue
    ///
    /// Stops when the link has nothing more or the queue is full; records
    /// left in the link wait for the next pass. Returns the number of
    /// records read.
    pub fn service_link(&mut self) -> usize {
        let mut record = [0u8; RECORD_MAX_SIZE];
        let mut count = 0;

        while count < MAX_QUEUE_SIZE && !self.queue.is_full() {
            match self.link.try_recv(&mut record) {
                Ok((len, channel)) => {
                    count += 1;
                    let _ = self.receive_record(channel, &record[..len]);
                }
                Err(Error::WouldBlock) => break,
                Err(e) => {
                    log::error!("link receive failed: {}", e);
                    self.stats.link_errors += 1;
                    break;
                }
            }
        }
        count
    }

    /// Shutdown the link
    pub fn shutdown(&mut self) -> Result<()> {
        log::info!("{} router stopping", self.station);
        self.link.shutdown()
    }

    fn next_message(&mut self) -> Option<(Handle, Message)> {
        if self.queue.is_empty() {
            return None;
        }
        let handle = self.queue.pop()?;
        match self.pool.get(handle) {
            Some(msg) => Some((handle, msg.clone())),
            None => {
                log::error!("queued handle {:?} is not live", handle);
                None
            }
        }
    }

    fn allocate(&mut self) -> Result<Handle> {
        let handle = self.pool.allocate();
        if self.pool.is_nil(handle) {
            log::error!("message pool exhausted, message dropped");
            self.stats.pool_drops += 1;
            return Err(Error::PoolExhausted);
        }
        Ok(handle)
    }

    // Fill a fresh slot; the slot goes back to the pool on failure
    fn fill<F>(&mut self, handle: Handle, f: F) -> Result<()>
    where
        F: FnOnce(&mut Message) -> Result<()>,
    {
        let result = match self.pool.get_mut(handle) {
            Some(slot) => f(slot),
            None => Err(Error::InvalidHandle),
        };
        if result.is_err() {
            let _ = self.pool.release(handle);
        }
        result
    }

    fn push(&mut self, handle: Handle) -> Result<()> {
        if let Err(e) = self.queue.push(handle) {
            self.stats.queue_drops += 1;
            let _ = self.pool.release(handle);
            return Err(e);
        }
        Ok(())
    }

    fn transmit(&mut self, msg: &Message) {
        let Some(channel) = channel_of(self.station.counterpart()) else {
            log::error!("{} has no counterpart channel", self.station);
            self.stats.link_errors += 1;
            return;
        };

        let mut record = [0u8; RECORD_MAX_SIZE];
        let len = match encode_message(msg, &mut record) {
            Ok(len) => len,
            Err(e) => {
                log::error!("cannot encode #{}: {}", msg.sequence, e);
                self.stats.codec_errors += 1;
                return;
            }
        };

        match self.link.send(channel, &record[..len]) {
            Ok(_) => {
                self.stats.transmitted += 1;
                log::trace!("sent #{} {} ({} bytes)", msg.sequence, msg.protocol, len);
            }
            Err(e) => {
                log::error!("link send of #{} failed: {}", msg.sequence, e);
                self.stats.link_errors += 1;
            }
        }
    }

    fn dispatch<S: StationServices>(&mut self, msg: &Message, services: &mut S) {
        let handler = self.handler(msg.protocol);
        log::debug!(
            "dispatch #{} {} from {} client {} -> {:?}",
            msg.sequence,
            msg.protocol,
            msg.origin,
            msg.client,
            handler
        );

        match handler {
            Handler::Command => self.handle_command(msg, services),
            Handler::Control => self.handle_control(msg),
            Handler::Ignore => log::debug!("control message ignored on {}", self.station),
            Handler::Reply | Handler::Diag => {
                match services.deliver(msg.client, msg.payload()) {
                    Ok(()) => {}
                    Err(Error::ClientDisconnected) => {
                        log::warn!("client {} disconnected, reply dropped", msg.client)
                    }
                    Err(e) => log::error!("delivery to client {} failed: {}", msg.client, e),
                }
            }
            Handler::NotYetSupported => {
                log::warn!(
                    "{} ({}) not supported on {}",
                    msg.protocol,
                    msg.protocol.as_raw(),
                    self.station
                );
                self.stats.unsupported += 1;
                return;
            }
        }
        self.stats.dispatched += 1;
    }

    fn handle_command<S: StationServices>(&mut self, msg: &Message, services: &mut S) {
        let mut reply = Payload::new();
        let outcome = CommandLine::parse(msg.payload())
            .and_then(|line| services.execute(&line, &mut reply));

        let text = match outcome {
            Ok(()) if reply.is_empty() => return,
            Ok(()) => reply.as_str(),
            Err(e) => {
                log::warn!("command '{}' failed: {}", msg.payload(), e);
                ERROR_REPLY
            }
        };
        let _ = self.enqueue_outbound(msg.client, ProtocolTag::Reply, text);
    }

    fn handle_control(&mut self, msg: &Message) {
        let action = CommandLine::parse(msg.payload()).and_then(|line| ControlTable::resolve(&line));
        match action {
            Ok(ControlAction::SetLogLevel(level)) => {
                log::set_max_level(level);
                log::info!("log level set to {}", level);
            }
            Ok(ControlAction::BindDiagnostic(client)) => {
                self.diag_client = Some(client);
                log::info!("diagnostics bound to client {}", client);
            }
            Err(e) => log::warn!("control command '{}' rejected: {}", msg.payload(), e),
        }
    }
}
