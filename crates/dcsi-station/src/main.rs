// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! DCSI station CLI
//!
//! # Usage
//!
//! ```bash
//! # Command station, waiting for the network station
//! dcsi-station --role command --link-listen 0.0.0.0:2561
//!
//! # Network station on two interfaces
//! dcsi-station --role network --link-connect 10.0.0.2:2561 \
//!     --listen 0.0.0.0:2560,0.0.0.0:8080
//!
//! # Using configuration file
//! dcsi-station --config station.toml
//! ```

use clap::{Parser, Subcommand};
use dcsi_station::{ConfigError, LinkMode, Role, Station, StationConfig, StationError};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// DCSI command station / network station bridge
#[derive(Parser, Debug)]
#[command(name = "dcsi-station")]
#[command(about = "DCSI station - serial bridge between a DCC command station and its network front-end")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Station role (command or network)
    #[arg(long, value_parser = parse_role, conflicts_with = "config")]
    role: Option<Role>,

    /// Dial the peer station at this address
    #[arg(long, conflicts_with_all = ["config", "link_listen"])]
    link_connect: Option<String>,

    /// Wait for the peer station on this address
    #[arg(long, conflicts_with = "config")]
    link_listen: Option<String>,

    /// Client listen addresses (comma-separated, can repeat)
    #[arg(short, long, value_delimiter = ',')]
    listen: Option<Vec<String>>,

    /// Statistics reporting interval (seconds, 0 to disable)
    #[arg(long)]
    stats_interval: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate example configuration file
    GenConfig {
        /// Output file path
        #[arg(short, long, default_value = "station.toml")]
        output: PathBuf,

        /// Role of the generated configuration
        #[arg(long, value_parser = parse_role, default_value = "network")]
        role: Role,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file path
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn parse_role(s: &str) -> Result<Role, String> {
    match s.to_ascii_lowercase().as_str() {
        "command" | "cs" => Ok(Role::Command),
        "network" | "nw" => Ok(Role::Network),
        _ => Err(format!("unknown role '{}' (expected command or network)", s)),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Handle subcommands
    if let Some(cmd) = args.command {
        init_logging(args.log_level.as_deref().unwrap_or("info"));
        return match cmd {
            Commands::GenConfig { output, role } => cmd_gen_config(output, role),
            Commands::Validate { config } => cmd_validate(config),
        };
    }

    // Build configuration
    let config = build_config(&args)?;
    init_logging(&config.log_level);

    let station = Station::new(config)?;

    println!("DCSI Station v{}", env!("CARGO_PKG_VERSION"));
    println!("=====================================");
    println!();
    print_config(station.config());
    println!();
    println!("Press Ctrl+C to stop...");
    println!();

    let running = station.running_flag();
    ctrlc::set_handler(move || {
        running.store(false, std::sync::atomic::Ordering::SeqCst);
    })?;

    let router_stats = station.run()?;
    println!("\nShutting down...");

    println!("\nFinal Statistics:");
    println!("{}", station.stats().format_summary(&router_stats));

    Ok(())
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn build_config(args: &Args) -> Result<StationConfig, StationError> {
    let mut config = match (&args.config, args.role) {
        // Load from file if specified
        (Some(path), _) => StationConfig::from_file(path)?,
        (None, Some(Role::Network)) => StationConfig::network_station(),
        (None, Some(Role::Command)) => StationConfig::command_station(),
        (None, None) => {
            return Err(StationError::Config(ConfigError::Invalid(
                "Missing --role (or use --config)".into(),
            )))
        }
    };

    if let Some(ref addr) = args.link_connect {
        config.link.mode = LinkMode::Connect;
        config.link.address = addr.clone();
    }
    if let Some(ref addr) = args.link_listen {
        config.link.mode = LinkMode::Listen;
        config.link.address = addr.clone();
    }
    if let Some(ref listen) = args.listen {
        config.listen = listen.clone();
    }
    if let Some(secs) = args.stats_interval {
        config.stats_interval_secs = secs;
    }
    if let Some(ref level) = args.log_level {
        config.log_level = level.clone();
    }

    config.validate()?;
    Ok(config)
}

fn cmd_gen_config(output: PathBuf, role: Role) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match role {
        Role::Network => StationConfig::network_station(),
        Role::Command => StationConfig::command_station(),
    };
    config.name = format!("example-{}-station", role);

    let toml_str = toml::to_string_pretty(&config)?;

    // Add comments
    let content = format!(
        r#"# DCSI Station Configuration
# Generated by dcsi-station gen-config

{}
"#,
        toml_str
    );

    std::fs::write(&output, content)?;
    println!("Generated configuration file: {}", output.display());
    Ok(())
}

fn cmd_validate(config_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    match StationConfig::from_file(&config_path) {
        Ok(config) => {
            println!("Configuration valid!");
            println!();
            print_config(&config);
            Ok(())
        }
        Err(e) => {
            eprintln!("Configuration invalid: {}", e);
            std::process::exit(1);
        }
    }
}

fn print_config(config: &StationConfig) {
    println!("Station: {} ({} role)", config.name, config.role);
    let mode = match config.link.mode {
        LinkMode::Connect => "connect to",
        LinkMode::Listen => "listen on",
    };
    println!("Link:    {} {}", mode, config.link.address);
    for (i, addr) in config.listen.iter().enumerate() {
        println!("  [{}] clients on {}", i, addr);
    }
}
