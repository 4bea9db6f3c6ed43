//! COUGARS Fleet Dashboard Bridge
//!
//! Moves asynchronously arriving status telemetry for a fleet of autonomous
//! underwater vehicles ("Cougs") into a render surface without tearing, and
//! carries operator commands back out.
//!
//! ## Architecture
//!
//! - **Fleet**: status store (copy-on-write snapshots) and the drop-oldest
//!   ingestion channel that feeds it
//! - **Pipeline**: source pump and the processing loop, the only store writer
//! - **Telemetry**: wire format, stdin/TCP/simulated sources
//! - **View**: snapshot diffing, render-surface contract, terminal surface,
//!   render loop
//! - **Command**: emitter with abort-all confirmation, background dispatcher,
//!   command sinks

pub mod command;
pub mod config;
pub mod console;
pub mod fleet;
pub mod pipeline;
pub mod telemetry;
pub mod types;
pub mod view;

// Re-export configuration
pub use config::{ConfigError, FleetConfig};

// Re-export commonly used types
pub use types::{
    Channel, ConnectionChannel, LastMessage, NodeChannel, SensorChannel, StatusColor, StatusKind,
    StatusMessage, TelemetryEvent, VehicleId,
};

// Re-export the store and ingestion channel
pub use fleet::{FleetStatusSnapshot, FleetStatusStore, InvalidChannelError, StoreReader};

// Re-export view components
pub use view::{RegionId, RenderInstruction, RenderSurface, ViewSynchronizer};

// Re-export command components
pub use command::{CommandEmitter, CommandOutcome, FleetCommand, SendFailure, VehicleCommand};
