//! Telemetry acquisition: wire format, sources, TCP client and simulator

pub mod simulator;
pub mod source;
pub mod tcp_client;
pub mod wire;

pub use simulator::TelemetrySimulator;
pub use source::{LinkState, LineSource, SimulatedSource, SourceEvent, StdinSource, TcpSource, TelemetrySource};
pub use tcp_client::{TelemetryClient, TelemetryError};
pub use wire::{encode_event, parse_line, WireError};
