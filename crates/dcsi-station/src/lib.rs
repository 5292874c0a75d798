// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! DCSI host station
//!
//! Runs one side of the command station / network station bridge on a
//! regular host. The serial cable between the two stations is a TCP
//! stream; everything carried over it is framed by `dcsi-core`.
//!
//! # Features
//!
//! - **Network station**: accepts command, throttle and HTTP clients and
//!   forwards commands to the command station
//! - **Command station**: executes commands and answers the originating client
//! - **Control commands**: `<!llv n>` and `<!diag client>` from any client
//!
//! # Quick Start
//!
//! ```bash
//! # Command station waiting for its peer
//! dcsi-station --role command --link-listen 127.0.0.1:2561
//!
//! # Network station serving clients on port 2560
//! dcsi-station --role network --link-connect 127.0.0.1:2561 --listen 0.0.0.0:2560
//!
//! # Using config file
//! dcsi-station --config station.toml
//! ```
//!
//! # Configuration File
//!
//! ```toml
//! name = "layout-gateway"
//! role = "network"
//! listen = ["0.0.0.0:2560"]
//!
//! [link]
//! mode = "connect"
//! address = "192.168.1.20:2561"
//! ```

pub mod config;
pub mod link;
pub mod network;
pub mod station;
pub mod stats;

pub use config::{ConfigError, LinkConfig, LinkMode, Role, StationConfig};
pub use link::{StationLink, StreamUart};
pub use network::{HttpHandler, HttpRequest, NetworkFrontEnd, NotImplemented};
pub use station::{LocalExecutor, Station, StationError};
pub use stats::{StationStats, StatsSnapshot};
