//! Telemetry TCP client
//!
//! Reads newline-delimited telemetry from a TCP endpoint. Read timeouts and
//! dropped connections trigger a reconnect with exponential backoff; the
//! client only gives up after `MAX_RECONNECT_ATTEMPTS` consecutive failures.

use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{error, info, warn};

use crate::config::defaults::{
    INITIAL_RECONNECT_DELAY_SECS, MAX_RECONNECT_ATTEMPTS, MAX_RECONNECT_DELAY_SECS,
    TCP_CONNECT_TIMEOUT_SECS, TELEMETRY_READ_TIMEOUT_SECS,
};

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Timeout waiting for data")]
    Timeout,

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Failed to reconnect after {0} attempts")]
    ReconnectExhausted(u32),
}

/// Open a TCP stream with a connect timeout and keepalive enabled.
pub async fn connect_stream(addr: &str, timeout: Duration) -> Result<TcpStream, TelemetryError> {
    let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| TelemetryError::Timeout)?
        .map_err(|e| TelemetryError::ConnectionFailed(e.to_string()))?;

    // Keepalive detects a vehicle link that died without a FIN
    let sock_ref = socket2::SockRef::from(&stream);
    let keepalive = socket2::TcpKeepalive::new()
        .with_time(Duration::from_secs(30))
        .with_interval(Duration::from_secs(10));
    if let Err(e) = sock_ref.set_tcp_keepalive(&keepalive) {
        warn!(address = %addr, error = %e, "Failed to enable TCP keepalive");
    }
    Ok(stream)
}

/// Reconnect delay for a 1-based attempt number.
pub(crate) fn backoff_delay(attempt: u32) -> Duration {
    let secs = INITIAL_RECONNECT_DELAY_SECS
        .saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
        .min(MAX_RECONNECT_DELAY_SECS);
    Duration::from_secs(secs)
}

/// Line reader over a reconnecting TCP connection.
pub struct TelemetryClient {
    addr: String,
    stream: Option<BufReader<TcpStream>>,
    line_buffer: Vec<u8>,
    read_timeout: Duration,
    /// Lines received since creation
    lines_received: u64,
    reconnections: u64,
    timeouts: u64,
}

impl TelemetryClient {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            stream: None,
            line_buffer: Vec::with_capacity(512),
            read_timeout: Duration::from_secs(TELEMETRY_READ_TIMEOUT_SECS),
            lines_received: 0,
            reconnections: 0,
            timeouts: 0,
        }
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    pub const fn lines_received(&self) -> u64 {
        self.lines_received
    }

    pub async fn connect(&mut self) -> Result<(), TelemetryError> {
        if self.stream.is_some() {
            return Ok(());
        }
        info!(address = %self.addr, "Connecting to telemetry endpoint");
        let stream = connect_stream(&self.addr, Duration::from_secs(TCP_CONNECT_TIMEOUT_SECS)).await?;
        self.stream = Some(BufReader::new(stream));
        info!(address = %self.addr, "Telemetry connection established");
        Ok(())
    }

    pub async fn disconnect(&mut self) {
        if let Some(mut reader) = self.stream.take() {
            let _ = reader.get_mut().shutdown().await;
        }
    }

    /// Reconnect with exponential backoff.
    pub async fn reconnect(&mut self) -> Result<(), TelemetryError> {
        self.disconnect().await;

        for attempt in 1..=MAX_RECONNECT_ATTEMPTS {
            let delay = backoff_delay(attempt);
            warn!(
                attempt = attempt,
                max_attempts = MAX_RECONNECT_ATTEMPTS,
                delay_secs = delay.as_secs(),
                "Telemetry reconnecting after failure"
            );
            tokio::time::sleep(delay).await;

            match self.connect().await {
                Ok(()) => {
                    self.reconnections += 1;
                    info!(
                        attempt = attempt,
                        total_reconnections = self.reconnections,
                        "Telemetry reconnection successful"
                    );
                    return Ok(());
                }
                Err(e) => {
                    warn!(attempt = attempt, error = %e, "Reconnection attempt failed");
                }
            }
        }

        error!(
            max_attempts = MAX_RECONNECT_ATTEMPTS,
            "Telemetry reconnection exhausted: all attempts failed"
        );
        Err(TelemetryError::ReconnectExhausted(MAX_RECONNECT_ATTEMPTS))
    }

    /// Read the next line, reconnecting on timeout or disconnect.
    pub async fn read_line(&mut self) -> Result<String, TelemetryError> {
        if self.stream.is_none() {
            self.connect().await?;
        }

        loop {
            match self.read_line_inner().await {
                Ok(line) => {
                    self.lines_received += 1;
                    return Ok(line);
                }
                Err(TelemetryError::Timeout) => {
                    self.timeouts += 1;
                    warn!(
                        timeout_secs = self.read_timeout.as_secs(),
                        total_timeouts = self.timeouts,
                        "Telemetry read timeout: attempting reconnect"
                    );
                    self.reconnect().await?;
                }
                Err(TelemetryError::ConnectionClosed) => {
                    warn!("Telemetry connection closed by peer: attempting reconnect");
                    self.reconnect().await?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn read_line_inner(&mut self) -> Result<String, TelemetryError> {
        let reader = self
            .stream
            .as_mut()
            .ok_or_else(|| TelemetryError::ConnectionFailed("Not connected".to_string()))?;

        self.line_buffer.clear();
        let bytes = match tokio::time::timeout(self.read_timeout, reader.read_until(b'\n', &mut self.line_buffer)).await {
            Ok(Ok(b)) => b,
            Ok(Err(e)) => {
                warn!(error = %e, "Telemetry read error");
                return Err(TelemetryError::ConnectionClosed);
            }
            Err(_) => return Err(TelemetryError::Timeout),
        };
        if bytes == 0 {
            return Err(TelemetryError::ConnectionClosed);
        }
        // Bytes that are not UTF-8 become replacement characters; the link stays up
        let line = String::from_utf8_lossy(&self.line_buffer);
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}
