//! Telemetry source abstraction.
//!
//! Provides a unified trait for reading fleet telemetry from different
//! sources: line streams (stdin or any async reader), TCP with reconnect,
//! and the random simulator.

use std::collections::VecDeque;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::warn;

use super::simulator::TelemetrySimulator;
use super::tcp_client::{backoff_delay, TelemetryClient};
use super::wire::parse_line;
use crate::config::defaults::MAX_RECONNECT_ATTEMPTS;
use crate::types::{StatusColor, TelemetryEvent};

/// Events produced by a telemetry source.
#[derive(Debug)]
pub enum SourceEvent {
    /// A valid telemetry event was read.
    Event(TelemetryEvent),
    /// Source reached end of data.
    Eof,
}

/// Trait abstracting where telemetry comes from.
///
/// Implementations handle format parsing, reconnection and pacing
/// internally. The source pump calls [`next_event`](TelemetrySource::next_event)
/// in a `select!` with cancellation.
#[async_trait]
pub trait TelemetrySource: Send + 'static {
    /// Returns `Err` only on unrecoverable errors (e.g. a failing stdin).
    async fn next_event(&mut self) -> Result<SourceEvent>;

    /// Human-readable name for logging (e.g. "stdin", "tcp").
    fn source_name(&self) -> &str;
}

// ============================================================================
// Line Source (stdin / any async reader)
// ============================================================================

/// Reads wire-format lines from an async reader, skipping malformed ones.
pub struct LineSource<R> {
    reader: R,
    name: String,
    line_buffer: Vec<u8>,
    skipped: u64,
}

/// Telemetry piped in on stdin.
pub type StdinSource = LineSource<BufReader<tokio::io::Stdin>>;

impl StdinSource {
    pub fn stdin() -> Self {
        LineSource::new(BufReader::new(tokio::io::stdin()), "stdin")
    }
}

impl<R: AsyncBufRead + Unpin + Send + 'static> LineSource<R> {
    pub fn new(reader: R, name: impl Into<String>) -> Self {
        Self {
            reader,
            name: name.into(),
            line_buffer: Vec::with_capacity(512),
            skipped: 0,
        }
    }

    /// Lines that failed to parse so far.
    pub const fn skipped(&self) -> u64 {
        self.skipped
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send + 'static> TelemetrySource for LineSource<R> {
    async fn next_event(&mut self) -> Result<SourceEvent> {
        loop {
            self.line_buffer.clear();
            let bytes = self.reader.read_until(b'\n', &mut self.line_buffer).await?;
            if bytes == 0 {
                return Ok(SourceEvent::Eof);
            }
            // Invalid UTF-8 is replaced, never fatal
            let line = String::from_utf8_lossy(&self.line_buffer);
            match parse_line(&line) {
                Ok(Some(event)) => return Ok(SourceEvent::Event(event)),
                Ok(None) => {}
                Err(e) => {
                    self.skipped += 1;
                    warn!(source = %self.name, error = %e, "Skipping malformed telemetry line");
                }
            }
        }
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}

// ============================================================================
// TCP Source
// ============================================================================

/// Health of the telemetry link, published for the render context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkState {
    Connecting,
    Up,
    Down { reason: String },
}

impl LinkState {
    /// Notice text for the operator; `Connecting` has none.
    pub fn notice(&self, addr: &str) -> Option<(String, StatusColor)> {
        match self {
            LinkState::Connecting => None,
            LinkState::Up => Some((format!("Telemetry link up ({addr})"), StatusColor::Neutral)),
            LinkState::Down { reason } => Some((
                format!("Telemetry link down ({addr}): {reason}, retrying"),
                StatusColor::Red,
            )),
        }
    }
}

/// Reads wire-format lines from a TCP endpoint.
///
/// Wraps [`TelemetryClient`], which handles reconnection and timeouts. The
/// source never gives up: once the client exhausts its reconnect attempts it
/// waits out the capped backoff and starts over, so a lost link leaves the
/// dashboard running on its last known state.
pub struct TcpSource {
    client: TelemetryClient,
    retry_delay: Duration,
    link: Option<watch::Sender<LinkState>>,
}

impl TcpSource {
    /// Lazily connecting source; nothing is dialed until the first read.
    pub fn new(addr: impl Into<String>) -> Self {
        Self::from_client(TelemetryClient::new(addr))
    }

    pub fn from_client(client: TelemetryClient) -> Self {
        Self {
            client,
            retry_delay: backoff_delay(MAX_RECONNECT_ATTEMPTS),
            link: None,
        }
    }

    /// Publish link changes on `link`.
    pub fn with_link_state(mut self, link: watch::Sender<LinkState>) -> Self {
        self.link = Some(link);
        self
    }

    /// Pause between rounds of reconnect attempts.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn addr(&self) -> &str {
        self.client.addr()
    }

    fn set_link(&self, state: LinkState) {
        if let Some(link) = &self.link {
            link.send_if_modified(|current| {
                if *current == state {
                    false
                } else {
                    *current = state;
                    true
                }
            });
        }
    }
}

#[async_trait]
impl TelemetrySource for TcpSource {
    async fn next_event(&mut self) -> Result<SourceEvent> {
        loop {
            // read_line() reconnects internally; an error means a whole round
            // of attempts failed
            let line = match self.client.read_line().await {
                Ok(line) => {
                    self.set_link(LinkState::Up);
                    line
                }
                Err(e) => {
                    warn!(
                        address = %self.client.addr(),
                        error = %e,
                        retry_secs = self.retry_delay.as_secs(),
                        "Telemetry link down, retrying"
                    );
                    self.set_link(LinkState::Down { reason: e.to_string() });
                    tokio::time::sleep(self.retry_delay).await;
                    continue;
                }
            };
            match parse_line(&line) {
                Ok(Some(event)) => return Ok(SourceEvent::Event(event)),
                Ok(None) => {}
                Err(e) => warn!(source = "tcp", error = %e, "Skipping malformed telemetry line"),
            }
        }
    }

    fn source_name(&self) -> &str {
        "tcp"
    }
}

// ============================================================================
// Simulated Source
// ============================================================================

/// Emits simulator frames at a fixed interval, one event at a time.
pub struct SimulatedSource {
    simulator: TelemetrySimulator,
    interval: Duration,
    pending: VecDeque<TelemetryEvent>,
    max_frames: Option<u64>,
}

impl SimulatedSource {
    pub fn new(simulator: TelemetrySimulator, interval: Duration) -> Self {
        Self {
            simulator,
            interval,
            pending: VecDeque::new(),
            max_frames: None,
        }
    }

    /// Stop with `Eof` after this many frames.
    pub fn with_max_frames(mut self, frames: u64) -> Self {
        self.max_frames = Some(frames);
        self
    }
}

#[async_trait]
impl TelemetrySource for SimulatedSource {
    async fn next_event(&mut self) -> Result<SourceEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(SourceEvent::Event(event));
            }
            if self.max_frames.is_some_and(|max| self.simulator.frames() >= max) {
                return Ok(SourceEvent::Eof);
            }
            if self.simulator.frames() > 0 {
                tokio::time::sleep(self.interval).await;
            }
            self.pending.extend(self.simulator.frame());
        }
    }

    fn source_name(&self) -> &str {
        "simulator"
    }
}
