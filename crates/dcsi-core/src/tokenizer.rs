// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Multi-grammar command tokenizer
//!
//! Carves complete commands out of arbitrarily fragmented network reads.
//! Every supported grammar is described by a [`TokenDescriptor`]: a set of
//! start bytes, a set of end bytes and the protocol tag to report. Several
//! grammars may be interleaved in one read; each token is reported with its
//! own tag, left to right.
//!
//! A command cut in two by the read boundary is kept in a small carry
//! buffer ([`OVERFLOW_SIZE`] bytes) and rejoined on the next call. Nothing
//! is allocated: the carry and the new input are scanned through one
//! virtual index instead of being concatenated.
//!
//! ```text
//!   StartScan --start byte--> StartToken --> InToken --end byte--> EndToken
//!       ^  |                                    |                     |
//!       |  +--input exhausted--> Final <--------+-- Overflow <--------+
//!       +------------------------ more input -------------------------+
//! ```

use crate::config::{MAX_MESSAGE_SIZE, OVERFLOW_SIZE};
use crate::message::ProtocolTag;

/// One supported wire grammar
#[derive(Debug, Clone, Copy)]
pub struct TokenDescriptor {
    /// Grammar name, for logs
    pub name: &'static str,
    /// Any of these bytes opens a token
    pub start: &'static [u8],
    /// Any of these bytes closes it
    pub end: &'static [u8],
    /// Tag reported with each token
    pub protocol: ProtocolTag,
}

/// Grammars in lookup order; the first descriptor whose start set holds
/// the current byte wins.
pub static TOKEN_DESCRIPTORS: [TokenDescriptor; 4] = [
    TokenDescriptor {
        name: "DccEx",
        start: b"<",
        end: b">",
        protocol: ProtocolTag::Command,
    },
    TokenDescriptor {
        name: "WiThrottle",
        start: b"*DPTRHMQN",
        end: b"\n",
        protocol: ProtocolTag::Throttle,
    },
    TokenDescriptor {
        name: "Json",
        start: b"{",
        end: b"}",
        protocol: ProtocolTag::Json,
    },
    TokenDescriptor {
        name: "Http",
        start: b"PGDCTOH",
        end: b"\0\n",
        protocol: ProtocolTag::Http,
    },
];

fn lookup(byte: u8) -> Option<&'static TokenDescriptor> {
    TOKEN_DESCRIPTORS.iter().find(|d| d.start.contains(&byte))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    StartScan,
    StartToken,
    InToken,
    EndToken,
    Overflow,
    Final,
}

/// Carry buffer followed by the current input, indexed as one run
struct Window<'a> {
    carry: &'a [u8],
    input: &'a [u8],
}

impl Window<'_> {
    fn len(&self) -> usize {
        self.carry.len() + self.input.len()
    }

    fn at(&self, i: usize) -> u8 {
        match i.checked_sub(self.carry.len()) {
            None => self.carry[i],
            Some(j) => self.input[j],
        }
    }

    fn copy_to(&self, from: usize, out: &mut [u8]) {
        for (k, slot) in out.iter_mut().enumerate() {
            *slot = self.at(from + k);
        }
    }
}

/// Tokenizer with its cross-read carry buffer
///
/// One instance per byte stream: the carry belongs to the connection it
/// was fed from.
#[derive(Debug, Default)]
pub struct CommandTokenizer {
    overflow: heapless::Vec<u8, OVERFLOW_SIZE>,
}

impl CommandTokenizer {
    /// Create a tokenizer with an empty carry
    pub const fn new() -> Self {
        Self {
            overflow: heapless::Vec::new(),
        }
    }

    /// Bytes carried over from the previous call
    pub fn pending(&self) -> &[u8] {
        &self.overflow
    }

    /// Forget any carried fragment
    pub fn reset(&mut self) {
        self.overflow.clear();
    }

    /// Scan `input`, calling `on_token` for every complete token
    ///
    /// Token text includes its delimiters. Tokens of [`MAX_MESSAGE_SIZE`]
    /// bytes or more are dropped; an unterminated tail is carried into the
    /// next call. Returns the number of tokens reported.
    pub fn scan<F>(&mut self, input: &[u8], mut on_token: F) -> usize
    where
        F: FnMut(ProtocolTag, &str),
    {
        let mut carry = [0u8; OVERFLOW_SIZE];
        let carry_len = self.overflow.len();
        carry[..carry_len].copy_from_slice(&self.overflow);
        self.overflow.clear();

        let window = Window {
            carry: &carry[..carry_len],
            input,
        };
        let total = window.len();

        let mut state = ScanState::StartScan;
        let mut current = 0;
        let mut start = 0;
        let mut end = 0;
        let mut kind: Option<&TokenDescriptor> = None;
        let mut emitted = 0;

        loop {
            match state {
                ScanState::StartScan => {
                    if current >= total {
                        state = ScanState::Final;
                    } else if let Some(desc) = lookup(window.at(current)) {
                        start = current;
                        kind = Some(desc);
                        state = ScanState::StartToken;
                    } else {
                        current += 1;
                    }
                }
                ScanState::StartToken => {
                    current += 1;
                    state = ScanState::InToken;
                }
                ScanState::InToken => {
                    let Some(desc) = kind else {
                        state = ScanState::StartScan;
                        continue;
                    };
                    if current >= total {
                        state = ScanState::Overflow;
                    } else if desc.end.contains(&window.at(current)) {
                        end = current;
                        state = ScanState::EndToken;
                    } else {
                        current += 1;
                    }
                }
                ScanState::EndToken => {
                    let len = end - start + 1;
                    let protocol = kind.map_or(ProtocolTag::Unknown, |d| d.protocol);

                    if len >= MAX_MESSAGE_SIZE {
                        log::error!(
                            "{} token of {} bytes exceeds {} bytes, dropped",
                            protocol,
                            len,
                            MAX_MESSAGE_SIZE
                        );
                    } else {
                        let mut text = [0u8; MAX_MESSAGE_SIZE];
                        window.copy_to(start, &mut text[..len]);
                        match core::str::from_utf8(&text[..len]) {
                            Ok(token) => {
                                log::trace!("token [{}] {}", protocol, token);
                                on_token(protocol, token);
                                emitted += 1;
                            }
                            Err(_) => log::warn!("non UTF-8 {} token dropped", protocol),
                        }
                    }

                    current = end + 1;
                    kind = None;
                    state = if current >= total {
                        ScanState::Final
                    } else {
                        ScanState::StartScan
                    };
                }
                ScanState::Overflow => {
                    let remainder = total - start;
                    let kept = remainder.min(OVERFLOW_SIZE);
                    if remainder > OVERFLOW_SIZE {
                        log::warn!(
                            "unterminated token too long ({} bytes), keeping {}",
                            remainder,
                            kept
                        );
                    }
                    let mut tail = [0u8; OVERFLOW_SIZE];
                    window.copy_to(start, &mut tail[..kept]);
                    // kept <= OVERFLOW_SIZE and the carry is empty here
                    let _ = self.overflow.extend_from_slice(&tail[..kept]);
                    state = ScanState::Final;
                }
                ScanState::Final => break,
            }
        }

        emitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Tokens = heapless::Vec<(ProtocolTag, heapless::String<MAX_MESSAGE_SIZE>), 8>;

    fn scan(tokenizer: &mut CommandTokenizer, input: &[u8]) -> Tokens {
        let mut out = Tokens::new();
        tokenizer.scan(input, |tag, text| {
            out.push((tag, heapless::String::try_from(text).unwrap()))
                .unwrap();
        });
        out
    }

    fn texts(tokens: &Tokens) -> heapless::Vec<&str, 8> {
        tokens.iter().map(|(_, t)| t.as_str()).collect()
    }

    #[test]
    fn test_single_command() {
        let mut t = CommandTokenizer::new();
        let tokens = scan(&mut t, b"<s>");

        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].0, ProtocolTag::Command);
        assert_eq!(tokens[0].1.as_str(), "<s>");
        assert!(t.pending().is_empty());
    }

    #[test]
    fn test_adjacent_commands() {
        let mut t = CommandTokenizer::new();
        let tokens = scan(&mut t, b"<a><b>");
        assert_eq!(&texts(&tokens)[..], &["<a>", "<b>"]);
    }

    #[test]
    fn test_noise_is_skipped() {
        let mut t = CommandTokenizer::new();
        assert!(scan(&mut t, b"xyz").is_empty());
        assert!(t.pending().is_empty());

        let tokens = scan(&mut t, b"  \r<1 2>zz");
        assert_eq!(&texts(&tokens)[..], &["<1 2>"]);
    }

    #[test]
    fn test_split_command_rejoined() {
        let mut t = CommandTokenizer::new();

        assert!(scan(&mut t, b"<a").is_empty());
        assert_eq!(t.pending(), b"<a");

        let tokens = scan(&mut t, b"b>");
        assert_eq!(&texts(&tokens)[..], &["<ab>"]);
        assert!(t.pending().is_empty());
    }

    #[test]
    fn test_split_over_three_reads() {
        let mut t = CommandTokenizer::new();

        assert!(scan(&mut t, b"<t 3").is_empty());
        assert!(scan(&mut t, b" 1 ").is_empty());
        let tokens = scan(&mut t, b"1>");
        assert_eq!(&texts(&tokens)[..], &["<t 3 1 1>"]);
    }

    #[test]
    fn test_long_token_dropped_and_scan_resumes() {
        let mut t = CommandTokenizer::new();
        let mut input = [b'a'; MAX_MESSAGE_SIZE + 5];
        input[0] = b'<';
        input[MAX_MESSAGE_SIZE + 1] = b'>';
        input[MAX_MESSAGE_SIZE + 2] = b'<';
        input[MAX_MESSAGE_SIZE + 3] = b'b';
        input[MAX_MESSAGE_SIZE + 4] = b'>';

        let tokens = scan(&mut t, &input);
        assert_eq!(&texts(&tokens)[..], &["<b>"]);
    }

    #[test]
    fn test_token_just_under_limit() {
        let mut t = CommandTokenizer::new();
        let mut input = [b'a'; MAX_MESSAGE_SIZE - 1];
        input[0] = b'<';
        input[MAX_MESSAGE_SIZE - 2] = b'>';

        let tokens = scan(&mut t, &input);
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].1.len(), MAX_MESSAGE_SIZE - 1);

        let mut input = [b'a'; MAX_MESSAGE_SIZE];
        input[0] = b'<';
        input[MAX_MESSAGE_SIZE - 1] = b'>';
        assert!(scan(&mut t, &input).is_empty());
    }

    #[test]
    fn test_overflow_truncated_to_capacity() {
        let mut t = CommandTokenizer::new();
        let mut input = [b'x'; OVERFLOW_SIZE + 10];
        input[0] = b'<';

        assert!(scan(&mut t, &input).is_empty());
        assert_eq!(t.pending().len(), OVERFLOW_SIZE);
        assert_eq!(t.pending()[0], b'<');
    }

    #[test]
    fn test_interleaved_grammars() {
        let mut t = CommandTokenizer::new();
        let tokens = scan(&mut t, b"<s>*10\n{\"a\":1}");

        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0].0, ProtocolTag::Command);
        assert_eq!(tokens[1].0, ProtocolTag::Throttle);
        assert_eq!(tokens[1].1.as_str(), "*10\n");
        assert_eq!(tokens[2].0, ProtocolTag::Json);
        assert_eq!(tokens[2].1.as_str(), "{\"a\":1}");
    }

    #[test]
    fn test_table_order_breaks_ties() {
        // 'P' opens both throttle and HTTP tokens; throttle is listed first
        let mut t = CommandTokenizer::new();
        let tokens = scan(&mut t, b"PPA1\n");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].0, ProtocolTag::Throttle);
    }

    #[test]
    fn test_reset_drops_carry() {
        let mut t = CommandTokenizer::new();
        scan(&mut t, b"<abc");
        t.reset();
        assert!(scan(&mut t, b"d>").is_empty());
    }

    #[test]
    fn test_random_fragmentation() {
        let stream = b"<s><t 3 10 1><1 JOIN>*10\n<f 3 128>";
        let expected = ["<s>", "<t 3 10 1>", "<1 JOIN>", "*10\n", "<f 3 128>"];
        let mut rng = fastrand::Rng::with_seed(99);

        for _ in 0..200 {
            let mut t = CommandTokenizer::new();
            let mut seen: heapless::Vec<heapless::String<MAX_MESSAGE_SIZE>, 8> =
                heapless::Vec::new();
            let mut pos = 0;
            while pos < stream.len() {
                let step = rng.usize(1..=8).min(stream.len() - pos);
                t.scan(&stream[pos..pos + step], |_, text| {
                    seen.push(heapless::String::try_from(text).unwrap()).unwrap();
                });
                pos += step;
            }
            let seen: heapless::Vec<&str, 8> = seen.iter().map(|s| s.as_str()).collect();
            assert_eq!(&seen[..], &expected[..]);
        }
    }
}
