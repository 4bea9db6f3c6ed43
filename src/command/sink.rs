//! Command sinks: where dispatched command strings end up.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::OutboundCommand;
use crate::config::defaults::TCP_CONNECT_TIMEOUT_SECS;
use crate::telemetry::tcp_client::connect_stream;

/// External consumer of command strings.
///
/// Called from the background dispatcher only; implementations may block on
/// I/O. Each call delivers exactly one command, and failures are reported,
/// not retried.
#[async_trait]
pub trait CommandSink: Send + 'static {
    async fn send(&mut self, command: &OutboundCommand) -> Result<()>;

    fn sink_name(&self) -> &str;
}

// ============================================================================
// Log Sink
// ============================================================================

/// Writes commands to the log. Used when no command endpoint is configured.
#[derive(Debug, Default)]
pub struct LogSink {
    published: u64,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn published(&self) -> u64 {
        self.published
    }
}

#[async_trait]
impl CommandSink for LogSink {
    async fn send(&mut self, command: &OutboundCommand) -> Result<()> {
        self.published += 1;
        info!(id = command.id, "Publishing command: \"{}\"", command.text);
        Ok(())
    }

    fn sink_name(&self) -> &str {
        "log"
    }
}

// ============================================================================
// Channel Sink
// ============================================================================

/// Forwards command strings into an in-process channel.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<String>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl CommandSink for ChannelSink {
    async fn send(&mut self, command: &OutboundCommand) -> Result<()> {
        self.tx
            .send(command.text.clone())
            .map_err(|_| anyhow::anyhow!("command receiver is gone"))
    }

    fn sink_name(&self) -> &str {
        "channel"
    }
}

// ============================================================================
// TCP Sink
// ============================================================================

/// Writes one line per command to a TCP endpoint.
///
/// Connects lazily; a failed write drops the connection so the next command
/// reconnects.
pub struct TcpCommandSink {
    addr: String,
    stream: Option<TcpStream>,
    connect_timeout: Duration,
}

impl TcpCommandSink {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            stream: None,
            connect_timeout: Duration::from_secs(TCP_CONNECT_TIMEOUT_SECS),
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }
}

#[async_trait]
impl CommandSink for TcpCommandSink {
    async fn send(&mut self, command: &OutboundCommand) -> Result<()> {
        if self.stream.is_none() {
            let stream = connect_stream(&self.addr, self.connect_timeout)
                .await
                .with_context(|| format!("connect to command endpoint {}", self.addr))?;
            info!(address = %self.addr, "Command endpoint connected");
            self.stream = Some(stream);
        }

        let Some(stream) = self.stream.as_mut() else {
            anyhow::bail!("command endpoint {} not connected", self.addr);
        };
        let line = format!("{}\n", command.text);
        if let Err(e) = stream.write_all(line.as_bytes()).await {
            warn!(address = %self.addr, error = %e, "Command write failed, dropping connection");
            self.stream = None;
            return Err(e).context("write command");
        }
        Ok(())
    }

    fn sink_name(&self) -> &str {
        "tcp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::FleetCommand;
    use chrono::Utc;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::TcpListener;

    fn outbound(id: u64, command: FleetCommand) -> OutboundCommand {
        OutboundCommand {
            id,
            command,
            text: command.text(),
            issued_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_log_sink_counts() {
        let mut sink = LogSink::new();
        sink.send(&outbound(1, FleetCommand::LoadMissions)).await.unwrap();
        assert_eq!(sink.published(), 1);
    }

    #[tokio::test]
    async fn test_channel_sink_forwards_text() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut sink = ChannelSink::new(tx);
        sink.send(&outbound(1, FleetCommand::StartMissions)).await.unwrap();
        assert_eq!(rx.recv().await.as_deref(), Some("Starting the missions..."));

        drop(rx);
        assert!(sink.send(&outbound(2, FleetCommand::StartMissions)).await.is_err());
    }

    #[tokio::test]
    async fn test_tcp_sink_writes_lines() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut lines = BufReader::new(socket).lines();
            let mut received = Vec::new();
            while let Some(line) = lines.next_line().await.unwrap() {
                received.push(line);
                if received.len() == 2 {
                    break;
                }
            }
            received
        });

        let mut sink = TcpCommandSink::new(addr);
        sink.send(&outbound(1, FleetCommand::RecallVehicles)).await.unwrap();
        sink.send(&outbound(2, FleetCommand::AbortAll)).await.unwrap();

        let received = server.await.unwrap();
        assert_eq!(received, vec!["Recalling the Cougs...", "Aborting all missions..."]);
    }

    #[tokio::test]
    async fn test_tcp_sink_reports_unreachable_endpoint() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let mut sink = TcpCommandSink::new(addr);
        assert!(sink.send(&outbound(1, FleetCommand::LoadMissions)).await.is_err());
    }
}
