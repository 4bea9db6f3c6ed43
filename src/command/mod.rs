//! Fleet commands: the only outbound path
//!
//! ```text
//! UiAction ─▶ CommandEmitter ──try_send──▶ CommandDispatcher ─▶ CommandSink
//!   (render context)                          (background)
//!                 ◀──────────── CommandReceipt ─────┘
//! ```
//!
//! The emitter never blocks: a full or closed outbound queue becomes a
//! rejection notice. Abort-all needs a confirmation step before emission.

pub mod dispatcher;
pub mod emitter;
pub mod sink;

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{StatusColor, VehicleId};

pub use dispatcher::{CommandDispatcher, DispatchStats};
pub use emitter::CommandEmitter;
pub use sink::{ChannelSink, CommandSink, LogSink, TcpCommandSink};

pub const ABORT_ALL_PROMPT: &str = "Are you sure that you want to abort all missions?";
pub const ABORT_ALL_CANCELED: &str = "Canceling abort missions command...";

/// Action against a single vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleCommand {
    LoadMission,
    StartMission,
    Recall,
    Abort,
}

/// A user-triggered command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FleetCommand {
    LoadMissions,
    StartMissions,
    RecallVehicles,
    AbortAll,
    Vehicle(VehicleId, VehicleCommand),
}

impl FleetCommand {
    /// The single human-readable string published for this command.
    pub fn text(&self) -> String {
        match self {
            FleetCommand::LoadMissions => "Loading the missions...".to_string(),
            FleetCommand::StartMissions => "Starting the missions...".to_string(),
            FleetCommand::RecallVehicles => "Recalling the Cougs...".to_string(),
            FleetCommand::AbortAll => "Aborting all missions...".to_string(),
            FleetCommand::Vehicle(vehicle, action) => {
                let coug = vehicle.label();
                match action {
                    VehicleCommand::LoadMission => format!("Loading the mission on {coug}..."),
                    VehicleCommand::StartMission => format!("Starting the mission on {coug}..."),
                    VehicleCommand::Recall => format!("Recalling {coug}..."),
                    VehicleCommand::Abort => format!("Aborting the mission on {coug}..."),
                }
            }
        }
    }

    pub const fn requires_confirmation(&self) -> bool {
        matches!(self, FleetCommand::AbortAll)
    }
}

impl fmt::Display for FleetCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

/// A command accepted by the emitter, on its way to the sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundCommand {
    pub id: u64,
    pub command: FleetCommand,
    pub text: String,
    pub issued_at: DateTime<Utc>,
}

/// Why the emitter could not hand a command to the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendFailure {
    #[error("outbound queue is full")]
    QueueFull,
    #[error("command channel is closed")]
    Closed,
}

/// Why the dispatcher could not deliver a command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("{0}")]
    Sink(String),
    #[error("no response from command sink within {0:?}")]
    Timeout(Duration),
    #[error("shutdown before the command could be sent")]
    Shutdown,
}

/// Result of a user command request, as seen by the render context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Dispatched { id: u64, notice: String },
    NeedsConfirmation { prompt: String },
    Canceled { notice: String },
    Rejected { notice: String, error: SendFailure },
}

impl CommandOutcome {
    /// Text and color for the notice region.
    pub fn notice(&self) -> (&str, StatusColor) {
        match self {
            CommandOutcome::Dispatched { notice, .. } => (notice, StatusColor::Neutral),
            CommandOutcome::NeedsConfirmation { prompt } => (prompt, StatusColor::Yellow),
            CommandOutcome::Canceled { notice } => (notice, StatusColor::Orange),
            CommandOutcome::Rejected { notice, .. } => (notice, StatusColor::Red),
        }
    }
}

/// Completion report for one dispatched command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReceipt {
    pub id: u64,
    pub text: String,
    pub result: Result<(), DeliveryError>,
}

impl CommandReceipt {
    /// Notice text for a failed delivery; successes leave the notice alone.
    pub fn failure_notice(&self) -> Option<String> {
        self.result
            .as_ref()
            .err()
            .map(|e| format!("Command failed: {e}"))
    }
}
