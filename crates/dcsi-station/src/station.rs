// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Station run loop.

use std::io;
use std::net::AddrParseError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use dcsi_core::transport::SerialLink;
use dcsi_core::{CommandLine, Error, Payload, Router, RouterStats, StationServices};
use thiserror::Error as ThisError;

use crate::config::{ConfigError, Role, StationConfig};
use crate::link::{self, StationLink};
use crate::network::{HttpHandler, NetworkFrontEnd};
use crate::stats::StationStats;

/// Station errors.
#[derive(Debug, ThisError)]
pub enum StationError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Link error: {0}")]
    Link(Error),

    #[error("Invalid address: {0}")]
    AddrParse(#[from] AddrParseError),
}

impl From<Error> for StationError {
    fn from(e: Error) -> Self {
        StationError::Link(e)
    }
}

/// Command executor of the host command station
///
/// There is no layout behind a host build, so every command is
/// acknowledged with a reply naming it.
#[derive(Debug, Default)]
pub struct LocalExecutor {
    executed: u64,
}

impl LocalExecutor {
    /// Commands executed so far
    pub fn executed(&self) -> u64 {
        self.executed
    }
}

impl StationServices for LocalExecutor {
    fn execute(&mut self, line: &CommandLine<'_>, reply: &mut Payload) -> dcsi_core::Result<()> {
        self.executed += 1;
        tracing::debug!("execute '{}' {:?}", line.name(), line.params());

        let mut text = format!("<* reply from CS: {}", line.name());
        for param in line.params() {
            text.push(' ');
            text.push_str(param);
        }
        text.push_str(" *>");
        reply.push_str(&text).map_err(|_| Error::MessageTooLong)
    }

    fn deliver(&mut self, client: u16, text: &str) -> dcsi_core::Result<()> {
        tracing::warn!("command station has no clients, dropped for {}: {}", client, text);
        Err(Error::UnsupportedProtocol)
    }
}

/// A configured station, ready to run
pub struct Station {
    config: StationConfig,
    stats: Arc<StationStats>,
    running: Arc<AtomicBool>,
}

impl Station {
    /// Create a station from a validated configuration
    pub fn new(config: StationConfig) -> Result<Self, StationError> {
        config.validate()?;
        Ok(Self {
            config,
            stats: Arc::new(StationStats::new()),
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    /// Station configuration
    pub fn config(&self) -> &StationConfig {
        &self.config
    }

    /// Shared statistics
    pub fn stats(&self) -> Arc<StationStats> {
        Arc::clone(&self.stats)
    }

    /// Flag that keeps the loop running; clear it to stop
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Ask the loop to stop after the current pass
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Check whether the loop is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run the configured role until stopped
    pub fn run(&self) -> Result<RouterStats, StationError> {
        match self.config.role {
            Role::Network => {
                let addrs = self.config.listen_addresses()?;
                let mut front = NetworkFrontEnd::bind(&addrs, self.stats())?;
                match self.connect_link()? {
                    Some(link) => self.serve_network(link, &mut front),
                    None => Ok(RouterStats::default()),
                }
            }
            Role::Command => match self.connect_link()? {
                Some(link) => self.serve_command(link, &mut LocalExecutor::default()),
                None => Ok(RouterStats::default()),
            },
        }
    }

    /// Establish the inter-station link; `None` if stopped first
    pub fn connect_link(&self) -> Result<Option<StationLink>, StationError> {
        Ok(link::establish(&self.config, &self.running)?.map(SerialLink::new))
    }

    /// Network role loop: clients in, replies out
    pub fn serve_network<H: HttpHandler>(
        &self,
        link: StationLink,
        front: &mut NetworkFrontEnd<H>,
    ) -> Result<RouterStats, StationError> {
        let mut router = Router::new(Role::Network.station(), link);
        router.init()?;
        tracing::info!("{} serving as network station", self.config.name);

        let mut reporter = Reporter::new(&self.config);
        let result = loop {
            if !self.is_running() {
                break Ok(());
            }

            let read = front.poll(&mut router);
            let processed = router.pump(front);
            if let Err(e) = check_link(&router) {
                break Err(e);
            }

            if reporter.due() {
                tracing::info!("{}", self.stats.format_summary(router.stats()));
            }
            if read == 0 && !processed {
                self.idle();
            }
        };

        front.close_all();
        finish(router, result)
    }

    /// Command role loop: execute what the network station sends
    pub fn serve_command<S: StationServices>(
        &self,
        link: StationLink,
        services: &mut S,
    ) -> Result<RouterStats, StationError> {
        let mut router = Router::new(Role::Command.station(), link);
        router.init()?;
        tracing::info!("{} serving as command station", self.config.name);

        let mut reporter = Reporter::new(&self.config);
        let result = loop {
            if !self.is_running() {
                break Ok(());
            }

            let processed = router.pump(services);
            if let Err(e) = check_link(&router) {
                break Err(e);
            }

            if reporter.due() {
                let stats = router.stats();
                tracing::info!("{}", self.stats.format_summary(stats));
                let line = format!(
                    "<* up {}s, {} dispatched *>",
                    self.stats.uptime().as_secs(),
                    stats.dispatched
                );
                if let Err(e) = router.enqueue_diagnostic(&line) {
                    tracing::debug!("diagnostic dropped: {}", e);
                }
            }
            if !processed {
                self.idle();
            }
        };

        finish(router, result)
    }

    fn idle(&self) {
        thread::sleep(Duration::from_millis(self.config.poll_interval_ms));
    }
}

fn check_link(router: &Router<StationLink>) -> Result<(), StationError> {
    if router.link().uart().is_closed() {
        tracing::error!("link to peer station {} lost", router.link().uart().peer());
        return Err(StationError::Link(Error::TransportError));
    }
    Ok(())
}

fn finish(
    mut router: Router<StationLink>,
    result: Result<(), StationError>,
) -> Result<RouterStats, StationError> {
    let stats = *router.stats();
    if let Err(e) = router.shutdown() {
        tracing::debug!("link shutdown: {}", e);
    }
    result.map(|()| stats)
}

/// Periodic statistics trigger
struct Reporter {
    interval: Option<Duration>,
    last: Instant,
}

impl Reporter {
    fn new(config: &StationConfig) -> Self {
        let interval = (config.enable_stats && config.stats_interval_secs > 0)
            .then(|| Duration::from_secs(config.stats_interval_secs));
        Self {
            interval,
            last: Instant::now(),
        }
    }

    fn due(&mut self) -> bool {
        match self.interval {
            Some(interval) if self.last.elapsed() >= interval => {
                self.last = Instant::now();
                true
            }
            _ => false,
        }
    }
}
