// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Station configuration.
//!
//! Loaded from TOML or assembled from command line flags.

use dcsi_core::config::{LISTEN_PORT, MAX_INTERFACES};
use dcsi_core::StationId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Which side of the serial link this process plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Executes commands (drives the layout).
    Command,
    /// Terminates network clients.
    Network,
}

impl Role {
    /// Station identity used by the router.
    pub const fn station(self) -> StationId {
        match self {
            Role::Command => StationId::CommandStation,
            Role::Network => StationId::NetworkStation,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Command => write!(f, "command"),
            Role::Network => write!(f, "network"),
        }
    }
}

/// How the inter-station byte stream is established.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkMode {
    /// Dial the peer station.
    #[default]
    Connect,
    /// Wait for the peer station to dial in.
    Listen,
}

/// Inter-station link settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkConfig {
    #[serde(default)]
    pub mode: LinkMode,

    /// Peer address (connect) or local bind address (listen).
    #[serde(default = "default_link_address")]
    pub address: String,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            mode: LinkMode::Connect,
            address: default_link_address(),
        }
    }
}

/// Station configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationConfig {
    /// Station name (for identification in logs).
    #[serde(default = "default_station_name")]
    pub name: String,

    pub role: Role,

    #[serde(default)]
    pub link: LinkConfig,

    /// TCP addresses accepting network clients (network role only).
    #[serde(default)]
    pub listen: Vec<String>,

    /// Enable statistics collection.
    #[serde(default = "default_true")]
    pub enable_stats: bool,

    /// Statistics reporting interval (seconds, 0 disables the report).
    #[serde(default = "default_stats_interval")]
    pub stats_interval_secs: u64,

    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Sleep between two loop passes (milliseconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

fn default_station_name() -> String {
    "dcsi-station".to_string()
}

fn default_link_address() -> String {
    format!("127.0.0.1:{}", LISTEN_PORT + 1)
}

fn default_true() -> bool {
    true
}

fn default_stats_interval() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_poll_interval() -> u64 {
    2
}

impl StationConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Network station listening on the default port, dialing the command station.
    pub fn network_station() -> Self {
        Self::with_role(Role::Network, vec![format!("0.0.0.0:{}", LISTEN_PORT)])
    }

    /// Command station waiting for the network station to dial in.
    pub fn command_station() -> Self {
        let mut config = Self::with_role(Role::Command, Vec::new());
        config.link.mode = LinkMode::Listen;
        config.link.address = format!("0.0.0.0:{}", LISTEN_PORT + 1);
        config
    }

    fn with_role(role: Role, listen: Vec<String>) -> Self {
        Self {
            name: default_station_name(),
            role,
            link: LinkConfig::default(),
            listen,
            enable_stats: true,
            stats_interval_secs: default_stats_interval(),
            log_level: default_log_level(),
            poll_interval_ms: default_poll_interval(),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.link_address()?;

        match self.role {
            Role::Network => {
                if self.listen.is_empty() {
                    return Err(ConfigError::Invalid(
                        "Network station needs at least one listen address".into(),
                    ));
                }
                if self.listen.len() > MAX_INTERFACES {
                    return Err(ConfigError::Invalid(format!(
                        "{} listen addresses configured, at most {} supported",
                        self.listen.len(),
                        MAX_INTERFACES
                    )));
                }
            }
            Role::Command => {
                if !self.listen.is_empty() {
                    return Err(ConfigError::Invalid(
                        "Command station does not accept network clients".into(),
                    ));
                }
            }
        }

        let mut seen = HashSet::new();
        for addr in self.listen_addresses()? {
            if !seen.insert(addr) {
                return Err(ConfigError::Invalid(format!(
                    "Duplicate listen address {}",
                    addr
                )));
            }
        }

        if self.poll_interval_ms > 1000 {
            return Err(ConfigError::Invalid(format!(
                "poll_interval_ms {} is above 1000",
                self.poll_interval_ms
            )));
        }

        Ok(())
    }

    /// Parsed inter-station link address.
    pub fn link_address(&self) -> Result<SocketAddr, ConfigError> {
        parse_address("link", &self.link.address)
    }

    /// Parsed listen addresses, in configuration order.
    pub fn listen_addresses(&self) -> Result<Vec<SocketAddr>, ConfigError> {
        self.listen
            .iter()
            .map(|addr| parse_address("listen", addr))
            .collect()
    }
}

fn parse_address(what: &str, addr: &str) -> Result<SocketAddr, ConfigError> {
    if addr.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("Empty {} address", what)));
    }
    addr.trim()
        .parse()
        .map_err(|e| ConfigError::Invalid(format!("Bad {} address '{}': {}", what, addr, e)))
}
