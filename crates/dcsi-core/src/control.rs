// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Command line parsing and the administrative command table

use log::LevelFilter;

use crate::config::MAX_PARAMS;
use crate::error::{Error, Result};

/// A command split into its name and ordered parameters
///
/// `<t 3 10 1>` parses to name `t` and parameters `3`, `10`, `1`. The
/// delimiters `<`, `>` and the control marker `!` are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine<'a> {
    name: &'a str,
    params: heapless::Vec<&'a str, MAX_PARAMS>,
}

impl<'a> CommandLine<'a> {
    /// Split `text` on whitespace
    ///
    /// Fails with `Error::UnknownCommand` on an empty command and
    /// `Error::InvalidParameter` on more than [`MAX_PARAMS`] parameters.
    pub fn parse(text: &'a str) -> Result<Self> {
        let body = text.trim_matches(|c: char| matches!(c, '<' | '>' | '!') || c.is_whitespace());
        let mut words = body.split_whitespace();

        let name = words.next().ok_or(Error::UnknownCommand)?;
        let mut params = heapless::Vec::new();
        for word in words {
            params.push(word).map_err(|_| Error::InvalidParameter)?;
        }
        Ok(Self { name, params })
    }

    /// Command name (first word)
    pub fn name(&self) -> &'a str {
        self.name
    }

    /// Parameters after the name
    pub fn params(&self) -> &[&'a str] {
        &self.params
    }

    /// Parameter `index` as a number
    pub fn number(&self, index: usize) -> Result<i32> {
        self.params
            .get(index)
            .and_then(|p| p.parse().ok())
            .ok_or(Error::InvalidParameter)
    }
}

/// Parameter type of a control command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Decimal integer
    Num,
    /// Free text
    Text,
}

/// Entry of the control command table
#[derive(Debug, Clone, Copy)]
pub struct ControlCommand {
    /// Name as typed after `<!`
    pub name: &'static str,
    /// Expected parameters, in order
    pub params: &'static [ParamKind],
    /// One line usage text
    pub help: &'static str,
}

/// What a validated control command asks the station to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    /// Change the runtime log level
    SetLogLevel(LevelFilter),
    /// Route diagnostics to this network client
    BindDiagnostic(u16),
}

/// Administrative commands, looked up by name
pub static CONTROL_COMMANDS: [ControlCommand; 2] = [
    ControlCommand {
        name: "llv",
        params: &[ParamKind::Num],
        help: "<!llv level> set log level (0 off .. 5 trace)",
    },
    ControlCommand {
        name: "diag",
        params: &[ParamKind::Num],
        help: "<!diag client> send diagnostics to a network client",
    },
];

/// Validation of control commands against [`CONTROL_COMMANDS`]
pub struct ControlTable;

impl ControlTable {
    /// Find a command by name
    pub fn find(name: &str) -> Option<&'static ControlCommand> {
        CONTROL_COMMANDS.iter().find(|c| c.name == name)
    }

    /// Check `line` against the table and turn it into an action
    pub fn resolve(line: &CommandLine<'_>) -> Result<ControlAction> {
        let Some(cmd) = Self::find(line.name()) else {
            log::error!("control command '{}' not found", line.name());
            return Err(Error::UnknownCommand);
        };

        if line.params().len() != cmd.params.len() {
            log::error!(
                "'{}' expects {} parameter(s), got {}: {}",
                cmd.name,
                cmd.params.len(),
                line.params().len(),
                cmd.help
            );
            return Err(Error::InvalidParameter);
        }
        for (i, kind) in cmd.params.iter().enumerate() {
            if *kind == ParamKind::Num && line.number(i).is_err() {
                log::error!("'{}' parameter {} is not a number: {}", cmd.name, i + 1, cmd.help);
                return Err(Error::InvalidParameter);
            }
        }

        match cmd.name {
            "llv" => level_filter(line.number(0)?).map(ControlAction::SetLogLevel),
            "diag" => u16::try_from(line.number(0)?)
                .map(ControlAction::BindDiagnostic)
                .map_err(|_| Error::InvalidParameter),
            _ => Err(Error::UnknownCommand),
        }
    }
}

fn level_filter(level: i32) -> Result<LevelFilter> {
    Ok(match level {
        0 => LevelFilter::Off,
        1 => LevelFilter::Error,
        2 => LevelFilter::Warn,
        3 => LevelFilter::Info,
        4 => LevelFilter::Debug,
        5 => LevelFilter::Trace,
        _ => {
            log::error!("log level {} out of range 0..=5", level);
            return Err(Error::InvalidParameter);
        }
    })
}
