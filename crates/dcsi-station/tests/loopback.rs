// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Both stations on localhost: clients talk to the network station, which
//! forwards to the command station over a TCP link.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use dcsi_core::transport::SerialLink;
use dcsi_core::RouterStats;
use dcsi_station::{
    LocalExecutor, NetworkFrontEnd, Station, StationConfig, StationError, StationStats,
    StreamUart,
};

type Outcome = Result<RouterStats, StationError>;

struct Bridge {
    clients: SocketAddr,
    nw_running: Arc<AtomicBool>,
    cs_running: Arc<AtomicBool>,
    nw_stats: Arc<StationStats>,
    nw: JoinHandle<Outcome>,
    cs: JoinHandle<Outcome>,
}

impl Bridge {
    fn start() -> Self {
        let link_listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let link_addr = link_listener.local_addr().unwrap();

        let mut nw_config = StationConfig::network_station();
        nw_config.poll_interval_ms = 1;
        nw_config.stats_interval_secs = 0;
        let nw_station = Station::new(nw_config).unwrap();
        let nw_running = nw_station.running_flag();
        let nw_stats = nw_station.stats();

        let client_addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let mut front = NetworkFrontEnd::bind(&[client_addr], nw_station.stats()).unwrap();
        let clients = front.local_addrs()[0];

        let nw = thread::spawn(move || {
            let stream = TcpStream::connect(link_addr).unwrap();
            let link = SerialLink::new(StreamUart::new(stream).unwrap());
            nw_station.serve_network(link, &mut front)
        });

        let (cs_stream, _) = link_listener.accept().unwrap();
        let mut cs_config = StationConfig::command_station();
        cs_config.poll_interval_ms = 1;
        let cs_station = Station::new(cs_config).unwrap();
        let cs_running = cs_station.running_flag();
        let cs = thread::spawn(move || {
            let link = SerialLink::new(StreamUart::new(cs_stream).unwrap());
            cs_station.serve_command(link, &mut LocalExecutor::default())
        });

        Self {
            clients,
            nw_running,
            cs_running,
            nw_stats,
            nw,
            cs,
        }
    }

    fn client(&self) -> TcpStream {
        let stream = TcpStream::connect(self.clients).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_millis(100)))
            .unwrap();
        stream
    }

    fn stop(self) {
        self.cs_running.store(false, Ordering::SeqCst);
        let cs = self.cs.join().unwrap();
        assert!(cs.is_ok(), "command station: {:?}", cs.err());

        self.nw_running.store(false, Ordering::SeqCst);
        let nw = self.nw.join().unwrap();
        // The command station may hang up first
        assert!(
            matches!(nw, Ok(_) | Err(StationError::Link(_))),
            "network station: {:?}",
            nw.err()
        );
    }
}

/// Read from `stream` until `want` shows up, the peer closes, or 5s pass
fn read_until(stream: &mut TcpStream, want: &str) -> String {
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut text = String::new();
    let mut buf = [0u8; 256];
    while Instant::now() < deadline && !text.contains(want) {
        match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => text.push_str(&String::from_utf8_lossy(&buf[..n])),
            Err(_) => {}
        }
    }
    text
}

#[test]
fn command_reply_returns_to_its_client() {
    let bridge = Bridge::start();
    let mut client = bridge.client();

    client.write_all(b"<s>").unwrap();
    let text = read_until(&mut client, "<* reply from CS: s *>");
    assert!(text.contains("<* reply from CS: s *>"), "got {:?}", text);

    let snap = bridge.nw_stats.snapshot();
    assert_eq!(snap.accepted, 1);
    assert_eq!(snap.tokens_enqueued, 1);
    bridge.stop();
}

#[test]
fn command_split_across_writes() {
    let bridge = Bridge::start();
    let mut client = bridge.client();

    client.write_all(b"<t 3 ").unwrap();
    client.flush().unwrap();
    thread::sleep(Duration::from_millis(50));
    client.write_all(b"10 1>").unwrap();

    let want = "<* reply from CS: t 3 10 1 *>";
    let text = read_until(&mut client, want);
    assert!(text.contains(want), "got {:?}", text);
    bridge.stop();
}

#[test]
fn replies_go_to_the_right_client() {
    let bridge = Bridge::start();
    let mut first = bridge.client();
    let mut second = bridge.client();

    first.write_all(b"<a>").unwrap();
    second.write_all(b"<b>").unwrap();

    assert!(read_until(&mut second, "<* reply from CS: b *>").contains("from CS: b"));
    let text = read_until(&mut first, "<* reply from CS: a *>");
    assert!(text.contains("from CS: a"));
    assert!(!text.contains("from CS: b"));
    bridge.stop();
}

#[test]
fn http_request_is_answered_locally() {
    let bridge = Bridge::start();
    let mut client = bridge.client();

    client
        .write_all(b"GET /x HTTP/1.1\r\nHost: station\r\n\r\n")
        .unwrap();
    let text = read_until(&mut client, "\r\n\r\n");
    assert!(text.starts_with("HTTP/1.1 501 Not Implemented"), "got {:?}", text);

    let snap = bridge.nw_stats.snapshot();
    assert_eq!(snap.http_requests, 1);
    assert_eq!(snap.tokens_enqueued, 0);
    bridge.stop();
}

#[test]
fn unknown_protocol_is_echoed_as_malformed() {
    let bridge = Bridge::start();
    let mut client = bridge.client();

    client.write_all(b"xyz").unwrap();
    let want = "ERROR: malformed content in [xyz]";
    let text = read_until(&mut client, want);
    assert!(text.contains(want), "got {:?}", text);
    assert_eq!(bridge.nw_stats.snapshot().malformed, 1);
    bridge.stop();
}

#[test]
fn unknown_client_stays_unknown() {
    let bridge = Bridge::start();
    let mut client = bridge.client();

    client.write_all(b"xyz").unwrap();
    let first = "ERROR: malformed content in [xyz]";
    assert!(read_until(&mut client, first).contains(first));

    client.write_all(b"<s>").unwrap();
    let second = "ERROR: malformed content in [<s>]";
    let text = read_until(&mut client, second);
    assert!(text.contains(second), "got {:?}", text);
    assert!(!text.contains("reply from CS"));

    let snap = bridge.nw_stats.snapshot();
    assert_eq!(snap.malformed, 2);
    assert_eq!(snap.tokens_enqueued, 0);
    bridge.stop();
}

#[test]
fn command_client_is_not_served_http() {
    let bridge = Bridge::start();
    let mut client = bridge.client();

    client.write_all(b"<s>").unwrap();
    assert!(read_until(&mut client, "<* reply from CS: s *>").contains("from CS: s"));

    client.write_all(b"GET / HTTP/1.1\r\n\r\n").unwrap();
    client.flush().unwrap();
    thread::sleep(Duration::from_millis(50));
    client.write_all(b"<t>").unwrap();

    let text = read_until(&mut client, "<* reply from CS: t *>");
    assert!(text.contains("from CS: t"), "got {:?}", text);
    assert!(!text.contains("HTTP/1.1 501"));

    let snap = bridge.nw_stats.snapshot();
    assert_eq!(snap.http_requests, 0);
    assert_eq!(snap.closed, 0);
    bridge.stop();
}

#[test]
fn replies_end_with_a_line_break() {
    let bridge = Bridge::start();
    let mut client = bridge.client();

    client.write_all(b"<a><b>").unwrap();
    let want = "<* reply from CS: a *>\r\n<* reply from CS: b *>\r\n";
    let text = read_until(&mut client, want);
    assert!(text.contains(want), "got {:?}", text);
    bridge.stop();
}
