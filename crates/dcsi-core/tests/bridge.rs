// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! End-to-end tests: a network station and a command station wired
//! together through in-memory UARTs.

use dcsi_core::config::{CHANNEL_TO_COMMAND_STATION, MAX_QUEUE_SIZE};
use dcsi_core::record::{encode_message, RECORD_MAX_SIZE};
use dcsi_core::sniffer;
use dcsi_core::transport::{encode_frame, MemoryUart, SerialLink, MAX_FRAME_SIZE};
use dcsi_core::{
    CommandLine, CommandTokenizer, Error, Message, Payload, ProtocolTag, Result, Router,
    StationId, StationServices,
};

type Uart = MemoryUart<2048>;
type Station = Router<SerialLink<Uart>>;

/// Command station side: records every command and answers it
#[derive(Default)]
struct Executor {
    commands: Vec<(String, Vec<String>)>,
}

impl StationServices for Executor {
    fn execute(&mut self, line: &CommandLine<'_>, reply: &mut Payload) -> Result<()> {
        self.commands.push((
            line.name().to_string(),
            line.params().iter().map(|p| p.to_string()).collect(),
        ));
        if line.name() == "bad" {
            return Err(Error::UnknownCommand);
        }
        reply
            .push_str("<r ")
            .and_then(|_| reply.push_str(line.name()))
            .and_then(|_| reply.push_str(">"))
            .map_err(|_| Error::MessageTooLong)
    }

    fn deliver(&mut self, _client: u16, _text: &str) -> Result<()> {
        Err(Error::UnsupportedProtocol)
    }
}

/// Network station side: collects what would be written to each client
#[derive(Default)]
struct Clients {
    connected: Vec<u16>,
    written: Vec<(u16, String)>,
}

impl StationServices for Clients {
    fn execute(&mut self, _line: &CommandLine<'_>, _reply: &mut Payload) -> Result<()> {
        Err(Error::UnsupportedProtocol)
    }

    fn deliver(&mut self, client: u16, text: &str) -> Result<()> {
        if !self.connected.contains(&client) {
            return Err(Error::ClientDisconnected);
        }
        self.written.push((client, text.to_string()));
        Ok(())
    }
}

fn stations() -> (Station, Station) {
    let mut nw = Router::new(StationId::NetworkStation, SerialLink::new(Uart::new()));
    let mut cs = Router::new(StationId::CommandStation, SerialLink::new(Uart::new()));
    nw.init().unwrap();
    cs.init().unwrap();
    (nw, cs)
}

fn shuttle(nw: &mut Station, cs: &mut Station) {
    MemoryUart::transfer(nw.link_mut().uart_mut(), cs.link_mut().uart_mut());
    MemoryUart::transfer(cs.link_mut().uart_mut(), nw.link_mut().uart_mut());
}

fn run(nw: &mut Station, cs: &mut Station, clients: &mut Clients, exec: &mut Executor, passes: usize) {
    for _ in 0..passes {
        nw.pump(clients);
        shuttle(nw, cs);
        cs.pump(exec);
        shuttle(nw, cs);
    }
}

/// What the network front-end does with one read from a command connection
fn feed(nw: &mut Station, tokenizer: &mut CommandTokenizer, client: u16, data: &[u8]) {
    let mut tokens = Vec::new();
    tokenizer.scan(data, |tag, text| tokens.push((tag, text.to_string())));
    for (tag, text) in tokens {
        let tag = if text.starts_with("<!") { ProtocolTag::Ctrl } else { tag };
        nw.enqueue_outbound(client, tag, &text).unwrap();
    }
}

fn inject(station: &mut Station, channel: u8, msg: &Message) {
    let mut record = [0u8; RECORD_MAX_SIZE];
    let len = encode_message(msg, &mut record).unwrap();
    let mut frame = [0u8; MAX_FRAME_SIZE];
    let n = encode_frame(channel, &record[..len], &mut frame).unwrap();
    assert_eq!(station.link_mut().uart_mut().inject(&frame[..n]), n);
}

#[test]
fn command_round_trip() {
    let (mut nw, mut cs) = stations();
    let mut clients = Clients {
        connected: vec![3],
        ..Clients::default()
    };
    let mut exec = Executor::default();
    let mut tokenizer = CommandTokenizer::new();

    assert_eq!(sniffer::bind_bytes(b"<2>"), Some(ProtocolTag::Command));
    let seq = nw.next_sequence();
    feed(&mut nw, &mut tokenizer, 3, b"<2>");
    assert_eq!(nw.pending(), 1);
    assert_eq!(nw.next_sequence(), seq + 1);

    run(&mut nw, &mut cs, &mut clients, &mut exec, 6);

    assert_eq!(exec.commands, vec![("2".to_string(), vec![])]);
    assert_eq!(clients.written, vec![(3, "<r 2>".to_string())]);
    assert_eq!(nw.stats().transmitted, 1);
    assert_eq!(cs.stats().transmitted, 1);
    assert_eq!(nw.pending(), 0);
    assert_eq!(cs.pending(), 0);
}

#[test]
fn fragmented_commands_keep_order() {
    let (mut nw, mut cs) = stations();
    let mut clients = Clients {
        connected: vec![1],
        ..Clients::default()
    };
    let mut exec = Executor::default();
    let mut tokenizer = CommandTokenizer::new();

    feed(&mut nw, &mut tokenizer, 1, b"<t 3 10");
    feed(&mut nw, &mut tokenizer, 1, b" 1><s");
    assert_eq!(nw.pending(), 1);
    feed(&mut nw, &mut tokenizer, 1, b">");
    assert_eq!(nw.pending(), 2);

    run(&mut nw, &mut cs, &mut clients, &mut exec, 12);

    let names: Vec<&str> = exec.commands.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, ["t", "s"]);
    assert_eq!(exec.commands[0].1, ["3", "10", "1"]);
    assert_eq!(
        clients.written,
        vec![(1, "<r t>".to_string()), (1, "<r s>".to_string())]
    );
}

#[test]
fn failed_command_replies_error() {
    let (mut nw, mut cs) = stations();
    let mut clients = Clients {
        connected: vec![2],
        ..Clients::default()
    };
    let mut exec = Executor::default();

    nw.enqueue_outbound(2, ProtocolTag::Command, "<bad 1>").unwrap();
    run(&mut nw, &mut cs, &mut clients, &mut exec, 6);

    assert_eq!(clients.written, vec![(2, "<X>".to_string())]);
}

#[test]
fn reply_to_disconnected_client_is_dropped() {
    let (mut nw, mut cs) = stations();
    let mut clients = Clients::default();
    let mut exec = Executor::default();

    nw.enqueue_outbound(4, ProtocolTag::Command, "<s>").unwrap();
    run(&mut nw, &mut cs, &mut clients, &mut exec, 6);

    assert_eq!(exec.commands.len(), 1);
    assert!(clients.written.is_empty());
    assert_eq!(nw.stats().dispatched, 1);
}

#[test]
fn diagnostics_follow_bound_client() {
    let (mut nw, mut cs) = stations();
    let mut clients = Clients {
        connected: vec![5],
        ..Clients::default()
    };
    let mut exec = Executor::default();
    let mut tokenizer = CommandTokenizer::new();

    feed(&mut nw, &mut tokenizer, 5, b"<!diag 5>");
    run(&mut nw, &mut cs, &mut clients, &mut exec, 4);
    assert_eq!(cs.diag_client(), Some(5));
    assert!(exec.commands.is_empty());

    cs.enqueue_diagnostic("<* track power on *>").unwrap();
    run(&mut nw, &mut cs, &mut clients, &mut exec, 4);
    assert_eq!(clients.written, vec![(5, "<* track power on *>".to_string())]);
}

#[test]
fn http_protocol_never_reaches_the_router() {
    let data = b"GET /x HTTP/1.1\r\n";
    assert_eq!(sniffer::bind_bytes(data), Some(ProtocolTag::Http));

    // The command station does not handle HTTP even if one slips through
    let (mut nw, mut cs) = stations();
    let mut clients = Clients::default();
    let mut exec = Executor::default();
    nw.enqueue_outbound(1, ProtocolTag::Http, "GET /x HTTP/1.1").unwrap();
    run(&mut nw, &mut cs, &mut clients, &mut exec, 4);

    assert!(exec.commands.is_empty());
    assert_eq!(cs.stats().unsupported, 1);
}

#[test]
fn wire_message_from_self_is_dropped() {
    let (_, mut cs) = stations();
    let mut exec = Executor::default();

    let forged = Message::new(StationId::CommandStation, 9, 1, ProtocolTag::Command, "<s>").unwrap();
    inject(&mut cs, CHANNEL_TO_COMMAND_STATION, &forged);

    cs.pump(&mut exec);
    cs.pump(&mut exec);
    assert!(exec.commands.is_empty());
    assert_eq!(cs.stats().self_origin, 1);
    assert_eq!(cs.pending(), 0);
}

#[test]
fn burst_larger_than_queue_is_not_lost() {
    let (_, mut cs) = stations();
    let mut exec = Executor::default();
    let burst = 2 * MAX_QUEUE_SIZE;

    for i in 0..burst {
        let msg = Message::new(
            StationId::NetworkStation,
            i as u64,
            1,
            ProtocolTag::Command,
            &format!("<c{i}>"),
        )
        .unwrap();
        inject(&mut cs, CHANNEL_TO_COMMAND_STATION, &msg);
    }

    for _ in 0..4 * burst {
        cs.pump(&mut exec);
    }

    assert_eq!(exec.commands.len(), burst);
    assert_eq!(exec.commands[0].0, "c0");
    assert_eq!(exec.commands[burst - 1].0, format!("c{}", burst - 1));
    assert_eq!(cs.stats().queue_drops, 0);
    assert_eq!(cs.stats().pool_drops, 0);
    assert_eq!(cs.stats().transmitted, burst as u64);
}

#[test]
fn corrupted_frames_are_skipped() {
    let (_, mut cs) = stations();
    let mut exec = Executor::default();

    let msg = Message::new(StationId::NetworkStation, 1, 1, ProtocolTag::Command, "<s>").unwrap();
    let mut record = [0u8; RECORD_MAX_SIZE];
    let len = encode_message(&msg, &mut record).unwrap();
    let mut frame = [0u8; MAX_FRAME_SIZE];
    let n = encode_frame(CHANNEL_TO_COMMAND_STATION, &record[..len], &mut frame).unwrap();

    let mut broken = frame;
    broken[4] ^= 0x5A;
    let uart = cs.link_mut().uart_mut();
    uart.inject(b"noise");
    uart.inject(&broken[..n]);
    uart.inject(&frame[..n]);

    for _ in 0..4 {
        cs.pump(&mut exec);
    }
    assert_eq!(exec.commands.len(), 1);
    assert_eq!(cs.link().rejected_frames(), 1);
}
