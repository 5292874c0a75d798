// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! First-bytes protocol detection for a new network connection

use crate::message::ProtocolTag;

/// Guess the grammar a connection speaks from its first two bytes
///
/// The command protocol is unambiguous (`<`). Throttle opcodes and HTTP
/// verbs share several leading letters, so the second byte breaks the tie:
///
/// | first | second    | result   | reason                  |
/// |-------|-----------|----------|-------------------------|
/// | `P`   | `T` / `R` | Throttle | `PT` / `PR` opcodes     |
/// | `P`   | other     | Http     | `PUT` / `POST` / `PATCH`|
/// | `D`   | `E`       | Http     | `DELETE`                |
/// | `D`   | other     | Throttle | `D` opcode              |
/// | `H`   | `U`       | Throttle | `HU` opcode             |
/// | `H`   | other     | Http     | `HEAD`                  |
pub fn bind(first: u8, second: u8) -> ProtocolTag {
    match (first, second) {
        (b'<', _) => ProtocolTag::Command,
        (b'G' | b'C' | b'O' | b'T', _) => ProtocolTag::Http,
        (b'D', b'E') => ProtocolTag::Http,
        (b'D', _) => ProtocolTag::Throttle,
        (b'P', b'T' | b'R') => ProtocolTag::Throttle,
        (b'P', _) => ProtocolTag::Http,
        (b'H', b'U') => ProtocolTag::Throttle,
        (b'H', _) => ProtocolTag::Http,
        (b'M' | b'*' | b'R' | b'Q' | b'N', _) => ProtocolTag::Throttle,
        _ => ProtocolTag::Unknown,
    }
}

/// [`bind`] over the start of a read; a single byte is paired with NUL
pub fn bind_bytes(data: &[u8]) -> Option<ProtocolTag> {
    match data {
        [] => None,
        [first] => Some(bind(*first, 0)),
        [first, second, ..] => Some(bind(*first, *second)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_protocol() {
        assert_eq!(bind(b'<', b's'), ProtocolTag::Command);
        assert_eq!(bind(b'<', 0), ProtocolTag::Command);
    }

    #[test]
    fn test_http_verbs() {
        for verb in ["GET", "CONNECT", "OPTIONS", "TRACE", "PUT", "POST", "PATCH", "DELETE", "HEAD"] {
            let b = verb.as_bytes();
            assert_eq!(bind(b[0], b[1]), ProtocolTag::Http, "{verb}");
        }
    }

    #[test]
    fn test_throttle_opcodes() {
        for op in ["PTA", "PRX", "D1", "HU123", "MT+", "*10", "N", "Q", "R"] {
            assert_eq!(bind_bytes(op.as_bytes()), Some(ProtocolTag::Throttle), "{op}");
        }
    }

    #[test]
    fn test_unknown_and_empty() {
        assert_eq!(bind(b'x', b'y'), ProtocolTag::Unknown);
        assert_eq!(bind(b'{', b'"'), ProtocolTag::Unknown);
        assert_eq!(bind_bytes(b""), None);
    }
}
