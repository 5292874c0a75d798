// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Network front-end of the network station.
//!
//! Accepts TCP clients on up to [`MAX_INTERFACES`] listeners into a shared
//! table of [`MAX_SOCK_NUM`] connections. The slot index is the client id
//! carried by every message, so replies find their way back.
//!
//! The first read of a connection binds its protocol for good:
//!
//! - command / throttle / JSON: fed to the connection's own tokenizer,
//!   command, throttle and control tokens are queued on the router
//! - HTTP: the request head is collected and answered by an [`HttpHandler`]
//! - anything else: the content is echoed back as malformed

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;

use dcsi_core::config::{MAX_INTERFACES, MAX_READ_BUFFER, MAX_SOCK_NUM};
use dcsi_core::transport::Link;
use dcsi_core::{
    sniffer, CommandLine, CommandTokenizer, Error, Payload, ProtocolTag, Router, StationServices,
};

use crate::stats::StationStats;

/// Longest HTTP request head kept before the request is rejected
pub const MAX_HTTP_HEAD: usize = 2 * MAX_READ_BUFFER;

/// Line end written after every reply delivered to a client
pub const REPLY_TERMINATOR: &str = "\r\n";

/// Request line of an HTTP request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest<'a> {
    /// Request method, e.g. `GET`
    pub method: &'a str,
    /// Request target as sent
    pub uri: &'a str,
    /// Protocol version, always starting with `HTTP/`
    pub version: &'a str,
}

impl<'a> HttpRequest<'a> {
    /// Parse the first line of a request head
    pub fn parse(head: &'a str) -> Option<Self> {
        let line = head.lines().next()?;
        let mut parts = line.split_whitespace();
        let request = Self {
            method: parts.next()?,
            uri: parts.next()?,
            version: parts.next()?,
        };
        if parts.next().is_some() || !request.version.starts_with("HTTP/") {
            return None;
        }
        Some(request)
    }
}

/// Answers HTTP requests arriving on network connections
pub trait HttpHandler {
    /// Full response (status line, headers and body) for `request`
    fn respond(&mut self, request: &HttpRequest<'_>) -> String;
}

/// Default handler: nothing is served over HTTP
#[derive(Debug, Default, Clone, Copy)]
pub struct NotImplemented;

impl HttpHandler for NotImplemented {
    fn respond(&mut self, request: &HttpRequest<'_>) -> String {
        tracing::debug!("HTTP {} {} not implemented", request.method, request.uri);
        status_response("501 Not Implemented")
    }
}

fn status_response(status: &str) -> String {
    format!(
        "HTTP/1.1 {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        status
    )
}

/// Text sent back to a connection that speaks no known protocol
pub fn malformed_reply(content: &[u8]) -> String {
    format!(
        "ERROR: malformed content in [{}]",
        String::from_utf8_lossy(content)
    )
}

/// What to do with a connection after processing a read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Keep,
    Close,
}

/// One client connection
struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    protocol: Option<ProtocolTag>,
    tokenizer: CommandTokenizer,
    http_head: Vec<u8>,
}

impl Connection {
    fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self {
            stream,
            peer,
            protocol: None,
            tokenizer: CommandTokenizer::new(),
            http_head: Vec::new(),
        }
    }

    fn write_text(&mut self, text: &str) -> io::Result<()> {
        // A write that cannot complete fails the connection
        self.stream.write_all(text.as_bytes())
    }
}

/// TCP listeners plus the client connection table
pub struct NetworkFrontEnd<H: HttpHandler = NotImplemented> {
    listeners: Vec<TcpListener>,
    slots: [Option<Connection>; MAX_SOCK_NUM],
    http: H,
    stats: Arc<StationStats>,
}

impl NetworkFrontEnd<NotImplemented> {
    /// Bind every address in `addrs`
    pub fn bind(addrs: &[SocketAddr], stats: Arc<StationStats>) -> io::Result<Self> {
        Self::with_http_handler(addrs, NotImplemented, stats)
    }
}

impl<H: HttpHandler> NetworkFrontEnd<H> {
    /// Bind every address in `addrs`, answering HTTP with `http`
    pub fn with_http_handler(
        addrs: &[SocketAddr],
        http: H,
        stats: Arc<StationStats>,
    ) -> io::Result<Self> {
        if addrs.is_empty() || addrs.len() > MAX_INTERFACES {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} listeners requested, 1..={} supported", addrs.len(), MAX_INTERFACES),
            ));
        }

        let mut listeners = Vec::with_capacity(addrs.len());
        for addr in addrs {
            let listener = TcpListener::bind(addr)?;
            listener.set_nonblocking(true)?;
            tracing::info!("listening for clients on {}", listener.local_addr()?);
            listeners.push(listener);
        }

        Ok(Self {
            listeners,
            slots: std::array::from_fn(|_| None),
            http,
            stats,
        })
    }

    /// Bound listener addresses (resolves port 0)
    pub fn local_addrs(&self) -> Vec<SocketAddr> {
        self.listeners
            .iter()
            .filter_map(|l| l.local_addr().ok())
            .collect()
    }

    /// Number of open client connections
    pub fn connected(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// True if `client` is an open connection
    pub fn is_connected(&self, client: u16) -> bool {
        self.slots
            .get(client as usize)
            .map_or(false, |s| s.is_some())
    }

    /// Protocol bound to `client`, if it has sent anything yet
    pub fn protocol(&self, client: u16) -> Option<ProtocolTag> {
        self.slots
            .get(client as usize)
            .and_then(|s| s.as_ref())
            .and_then(|c| c.protocol)
    }

    /// Accept new clients, then read each connection once
    ///
    /// Returns the number of bytes read from clients.
    pub fn poll<L: Link>(&mut self, router: &mut Router<L>) -> usize {
        self.accept_new();

        let mut buf = [0u8; MAX_READ_BUFFER];
        let mut total = 0;
        for client in 0..MAX_SOCK_NUM {
            let Some(conn) = self.slots[client].as_mut() else {
                continue;
            };

            let verdict = match conn.stream.read(&mut buf) {
                Ok(0) => {
                    tracing::info!("client {} ({}) disconnected", client, conn.peer);
                    Verdict::Close
                }
                Ok(n) => {
                    total += n;
                    self.stats.record_rx(n);
                    ingest(conn, client as u16, &buf[..n], router, &mut self.http, &self.stats)
                }
                Err(ref e)
                    if e.kind() == io::ErrorKind::WouldBlock
                        || e.kind() == io::ErrorKind::Interrupted =>
                {
                    Verdict::Keep
                }
                Err(e) => {
                    tracing::warn!("client {} read failed: {}", client, e);
                    Verdict::Close
                }
            };

            if verdict == Verdict::Close {
                self.close(client as u16);
            }
        }
        total
    }

    /// Write `text` to `client`, followed by [`REPLY_TERMINATOR`]
    ///
    /// Fails with `Error::ClientDisconnected` if no such connection is open;
    /// a failed write closes the connection.
    pub fn deliver(&mut self, client: u16, text: &str) -> dcsi_core::Result<()> {
        let Some(conn) = self.slots.get_mut(client as usize).and_then(|s| s.as_mut()) else {
            self.stats.record_undeliverable();
            return Err(Error::ClientDisconnected);
        };

        let line = format!("{}{}", text, REPLY_TERMINATOR);
        match conn.write_text(&line) {
            Ok(()) => {
                tracing::trace!("client {} <- {}", client, text);
                self.stats.record_delivery(line.len());
                Ok(())
            }
            Err(e) => {
                tracing::warn!("write to client {} failed: {}", client, e);
                self.close(client);
                self.stats.record_undeliverable();
                Err(Error::ClientDisconnected)
            }
        }
    }

    /// Close `client` and free its slot
    pub fn close(&mut self, client: u16) {
        if let Some(conn) = self.slots.get_mut(client as usize).and_then(Option::take) {
            let _ = conn.stream.shutdown(Shutdown::Both);
            self.stats.record_close();
            tracing::debug!("client {} ({}) slot freed", client, conn.peer);
        }
    }

    /// Close every client
    pub fn close_all(&mut self) {
        for client in 0..MAX_SOCK_NUM {
            self.close(client as u16);
        }
    }

    fn accept_new(&mut self) {
        for listener in &self.listeners {
            loop {
                let (stream, peer) = match listener.accept() {
                    Ok(accepted) => accepted,
                    Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                    Err(e) => {
                        tracing::warn!("accept failed: {}", e);
                        break;
                    }
                };

                let Some(client) = self.slots.iter().position(|s| s.is_none()) else {
                    tracing::warn!(
                        "connection from {} refused, all {} client slots in use",
                        peer,
                        MAX_SOCK_NUM
                    );
                    let _ = stream.shutdown(Shutdown::Both);
                    self.stats.record_refuse();
                    continue;
                };

                if let Err(e) = stream.set_nonblocking(true) {
                    tracing::warn!("client {} setup failed: {}", peer, e);
                    continue;
                }
                let _ = stream.set_nodelay(true);

                tracing::info!("client {} connected from {}", client, peer);
                self.slots[client] = Some(Connection::new(stream, peer));
                self.stats.record_accept();
            }
        }
    }
}

impl<H: HttpHandler> StationServices for NetworkFrontEnd<H> {
    fn execute(&mut self, line: &CommandLine<'_>, _reply: &mut Payload) -> dcsi_core::Result<()> {
        tracing::warn!("network station cannot execute '{}'", line.name());
        Err(Error::UnsupportedProtocol)
    }

    fn deliver(&mut self, client: u16, text: &str) -> dcsi_core::Result<()> {
        NetworkFrontEnd::deliver(self, client, text)
    }
}

fn ingest<L: Link, H: HttpHandler>(
    conn: &mut Connection,
    client: u16,
    data: &[u8],
    router: &mut Router<L>,
    http: &mut H,
    stats: &StationStats,
) -> Verdict {
    let protocol = match conn.protocol {
        Some(p) => p,
        None => {
            let Some(p) = sniffer::bind_bytes(data) else {
                return Verdict::Keep;
            };
            tracing::debug!("client {} speaks {}", client, p);
            conn.protocol = Some(p);
            p
        }
    };

    match protocol {
        ProtocolTag::Command | ProtocolTag::Throttle | ProtocolTag::Json => {
            conn.tokenizer.scan(data, |tag, text| {
                queue_token(router, stats, client, tag, text)
            });
            Verdict::Keep
        }
        ProtocolTag::Http => serve_http(conn, client, data, http, stats),
        _ => {
            stats.record_malformed();
            let reply = malformed_reply(data);
            tracing::warn!("client {}: {}", client, reply);
            match conn.write_text(&reply) {
                Ok(()) => Verdict::Keep,
                Err(_) => Verdict::Close,
            }
        }
    }
}

fn queue_token<L: Link>(
    router: &mut Router<L>,
    stats: &StationStats,
    client: u16,
    tag: ProtocolTag,
    text: &str,
) {
    let tag = if tag == ProtocolTag::Command && text.starts_with("<!") {
        ProtocolTag::Ctrl
    } else {
        tag
    };

    match tag {
        ProtocolTag::Command | ProtocolTag::Throttle | ProtocolTag::Ctrl => {
            match router.enqueue_outbound(client, tag, text) {
                Ok(()) => stats.record_token(),
                Err(e) => {
                    tracing::error!("client {} token '{}' dropped: {}", client, text, e);
                    stats.record_token_drop();
                }
            }
        }
        _ => {
            tracing::warn!("client {}: {} token not forwarded: {}", client, tag, text);
            stats.record_token_drop();
        }
    }
}

fn serve_http<H: HttpHandler>(
    conn: &mut Connection,
    client: u16,
    data: &[u8],
    http: &mut H,
    stats: &StationStats,
) -> Verdict {
    conn.http_head.extend_from_slice(data);

    let end = conn
        .http_head
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .or_else(|| conn.http_head.windows(2).position(|w| w == b"\n\n"));

    let response = match end {
        Some(end) => {
            let head = String::from_utf8_lossy(&conn.http_head[..end]).into_owned();
            match HttpRequest::parse(&head) {
                Some(request) => {
                    tracing::debug!("client {} HTTP {} {}", client, request.method, request.uri);
                    http.respond(&request)
                }
                None => status_response("400 Bad Request"),
            }
        }
        None if conn.http_head.len() > MAX_HTTP_HEAD => {
            tracing::warn!("client {} HTTP request head too long", client);
            status_response("431 Request Header Fields Too Large")
        }
        None => return Verdict::Keep,
    };

    conn.http_head.clear();
    if let Err(e) = conn.write_text(&response) {
        tracing::warn!("client {} HTTP response failed: {}", client, e);
    } else {
        stats.record_http(response.len());
    }
    Verdict::Close
}
