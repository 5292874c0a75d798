// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Inter-station byte stream.
//!
//! On the host the serial cable between the two stations is a TCP
//! connection. [`StreamUart`] exposes it through the core [`Uart`] trait so
//! the core `SerialLink` frames records over it unchanged.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use dcsi_core::transport::{SerialLink, Uart};
use dcsi_core::{Error, Result};

use crate::config::{LinkConfig, LinkMode, StationConfig};

/// Attempts made on a full socket buffer before a write gives up
const MAX_WRITE_RETRIES: usize = 50;

/// Delay between retries (write) and between accept/connect attempts
const RETRY_DELAY: Duration = Duration::from_millis(1);
const ESTABLISH_DELAY: Duration = Duration::from_millis(200);

/// The serial link used by the host station
pub type StationLink = SerialLink<StreamUart>;

/// [`Uart`] over a non-blocking TCP stream
#[derive(Debug)]
pub struct StreamUart {
    stream: TcpStream,
    peer: SocketAddr,
    closed: bool,
}

impl StreamUart {
    /// Wrap a connected stream
    pub fn new(stream: TcpStream) -> io::Result<Self> {
        stream.set_nonblocking(true)?;
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;
        Ok(Self {
            stream,
            peer,
            closed: false,
        })
    }

    /// Peer station address
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// True once the peer has hung up or the stream failed
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn fail(&mut self, what: &str, e: &io::Error) -> Error {
        tracing::error!("link {} {} failed: {}", self.peer, what, e);
        self.closed = true;
        Error::TransportError
    }
}

impl Uart for StreamUart {
    fn write(&mut self, data: &[u8]) -> Result<usize> {
        if self.closed {
            return Err(Error::TransportError);
        }

        let mut written = 0;
        let mut retries = 0;
        while written < data.len() {
            match self.stream.write(&data[written..]) {
                Ok(0) => {
                    let e = io::Error::from(io::ErrorKind::WriteZero);
                    return Err(self.fail("write", &e));
                }
                Ok(n) => written += n,
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    retries += 1;
                    if retries > MAX_WRITE_RETRIES {
                        tracing::warn!("link {} stalled, {} bytes unsent", self.peer, data.len() - written);
                        break;
                    }
                    thread::sleep(RETRY_DELAY);
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(self.fail("write", &e)),
            }
        }
        Ok(written)
    }

    fn try_read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.closed {
            return Err(Error::TransportError);
        }

        match self.stream.read(buf) {
            Ok(0) => {
                tracing::warn!("link peer {} closed the connection", self.peer);
                self.closed = true;
                Err(Error::TransportError)
            }
            Ok(n) => Ok(n),
            Err(ref e)
                if e.kind() == io::ErrorKind::WouldBlock
                    || e.kind() == io::ErrorKind::Interrupted =>
            {
                Ok(0)
            }
            Err(e) => Err(self.fail("read", &e)),
        }
    }

    fn flush(&mut self) -> Result<()> {
        match self.stream.flush() {
            Ok(()) => Ok(()),
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => Ok(()),
            Err(e) => Err(self.fail("flush", &e)),
        }
    }

    fn available(&self) -> usize {
        let mut probe = [0u8; 64];
        self.stream.peek(&mut probe).unwrap_or(0)
    }
}

/// Establish the inter-station stream described by `config`
///
/// Blocks, retrying, until the peer is reached or `running` is cleared.
/// Returns `Ok(None)` when interrupted.
pub fn establish(config: &StationConfig, running: &AtomicBool) -> io::Result<Option<StreamUart>> {
    let addr = config
        .link_address()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
    match config.link.mode {
        LinkMode::Connect => connect(addr, running),
        LinkMode::Listen => {
            let listener = bind(&config.link)?;
            accept(&listener, running)
        }
    }
}

fn connect(addr: SocketAddr, running: &AtomicBool) -> io::Result<Option<StreamUart>> {
    let mut attempts = 0u32;
    while running.load(Ordering::Relaxed) {
        match TcpStream::connect_timeout(&addr, Duration::from_secs(1)) {
            Ok(stream) => {
                tracing::info!("link connected to {}", addr);
                return StreamUart::new(stream).map(Some);
            }
            Err(e) => {
                attempts += 1;
                if attempts == 1 || attempts % 25 == 0 {
                    tracing::warn!("link connect to {} failed ({}), retrying", addr, e);
                }
                thread::sleep(ESTABLISH_DELAY);
            }
        }
    }
    Ok(None)
}

/// Bind the link listener (listen mode)
pub fn bind(link: &LinkConfig) -> io::Result<TcpListener> {
    let listener = TcpListener::bind(link.address.trim())?;
    listener.set_nonblocking(true)?;
    tracing::info!("link waiting for peer on {}", listener.local_addr()?);
    Ok(listener)
}

/// Wait for the peer station on `listener`
pub fn accept(listener: &TcpListener, running: &AtomicBool) -> io::Result<Option<StreamUart>> {
    while running.load(Ordering::Relaxed) {
        match listener.accept() {
            Ok((stream, addr)) => {
                tracing::info!("link peer {} connected", addr);
                return StreamUart::new(stream).map(Some);
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => thread::sleep(ESTABLISH_DELAY),
            Err(e) => return Err(e),
        }
    }
    Ok(None)
}
