//! Trace events emitted while driving units of work, and the sinks that
//! receive them.
//!
//! The engine never formats output itself. It hands each [`TraceEvent`] to a
//! [`TraceSink`]; [`TracingSink`] forwards to `tracing`, where the subscriber
//! installed by [`crate::logging::init`] presents it.

use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{Level, debug, error, info, trace, warn};

use crate::core::address::Address;

/// Target used for every trace line, so filters can single it out.
pub const TRACE_TARGET: &str = "trellis::trace";

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Trace => "trace",
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Error => "error",
        }
    }

    /// One step more verbose, saturating at `trace`.
    pub fn more_verbose(self) -> Self {
        match self {
            Severity::Error => Severity::Warn,
            Severity::Warn => Severity::Info,
            Severity::Info => Severity::Debug,
            Severity::Debug | Severity::Trace => Severity::Trace,
        }
    }
}

impl From<Severity> for Level {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Trace => Level::TRACE,
            Severity::Debug => Level::DEBUG,
            Severity::Info => Level::INFO,
            Severity::Warn => Level::WARN,
            Severity::Error => Level::ERROR,
        }
    }
}

impl FromStr for Severity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Severity::Trace),
            "debug" => Ok(Severity::Debug),
            "info" => Ok(Severity::Info),
            "warn" | "warning" => Ok(Severity::Warn),
            "error" => Ok(Severity::Error),
            other => Err(anyhow!("unknown severity {other:?}")),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceKind {
    Start,
    Done,
    Failed,
}

/// One trace line: severity, address, rendered unit text, and optional
/// diagnostic detail (only for caught attempt failures).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEvent {
    pub severity: Severity,
    pub address: Address,
    pub kind: TraceKind,
    pub text: String,
    pub detail: Option<String>,
}

impl TraceEvent {
    pub fn start(severity: Severity, address: Address, text: String) -> Self {
        Self {
            severity,
            address,
            kind: TraceKind::Start,
            text,
            detail: None,
        }
    }

    pub fn done(address: Address, text: String) -> Self {
        Self {
            severity: Severity::Debug,
            address,
            kind: TraceKind::Done,
            text,
            detail: None,
        }
    }

    pub fn failed(address: Address, text: String, detail: Option<String>) -> Self {
        Self {
            severity: Severity::Error,
            address,
            kind: TraceKind::Failed,
            text,
            detail,
        }
    }

    /// `<address> <text>`, `<address> DONE <text>` or `<address> FAILED <text>`;
    /// the separating space is dropped for the root address.
    pub fn line(&self) -> String {
        let sep = if self.address.is_root() { "" } else { " " };
        let marker = match self.kind {
            TraceKind::Start => "",
            TraceKind::Done => "DONE ",
            TraceKind::Failed => "FAILED ",
        };
        format!("{}{sep}{marker}{}", self.address, self.text)
    }
}

/// Receiver of trace events.
pub trait TraceSink {
    fn emit(&self, event: TraceEvent);
}

/// Forwards trace events to `tracing` at their severity.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TraceSink for TracingSink {
    fn emit(&self, event: TraceEvent) {
        let line = event.line();
        let message = match &event.detail {
            Some(detail) => format!("{line}\n{detail}"),
            None => line,
        };
        match event.severity {
            Severity::Trace => trace!(target: TRACE_TARGET, "{message}"),
            Severity::Debug => debug!(target: TRACE_TARGET, "{message}"),
            Severity::Info => info!(target: TRACE_TARGET, "{message}"),
            Severity::Warn => warn!(target: TRACE_TARGET, "{message}"),
            Severity::Error => error!(target: TRACE_TARGET, "{message}"),
        }
    }
}

/// Keeps every event in memory, in emission order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<TraceEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TraceEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn lines(&self) -> Vec<String> {
        self.events().iter().map(TraceEvent::line).collect()
    }
}

impl TraceSink for RecordingSink {
    fn emit(&self, event: TraceEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}
