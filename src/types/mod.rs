//! Shared data structures for the fleet status bridge
//!
//! - Fleet identity and channels: VehicleId, StatusKind, Channel
//! - Per-vehicle text state: StatusMessage, LastMessage, StatusColor
//! - Ingestion payload: TelemetryEvent

mod channel;
mod status;
mod telemetry;

pub use channel::*;
pub use status::*;
pub use telemetry::*;
