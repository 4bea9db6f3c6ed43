//! Telemetry update events carried by the ingestion channel

use serde::{Deserialize, Serialize};

use super::{Channel, StatusKind, VehicleId};

/// One inbound fleet-status update.
///
/// Serialized with a `type` tag, e.g.
/// `{"type":"channel","vehicle":2,"channel":"connection.wifi","status":"positive"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TelemetryEvent {
    /// New health value for one (vehicle, channel) pair
    #[serde(rename = "channel")]
    ChannelUpdate {
        vehicle: VehicleId,
        channel: Channel,
        status: StatusKind,
    },
    /// Free-text status flag for a vehicle
    #[serde(rename = "status_message")]
    StatusMessageUpdate { vehicle: VehicleId, text: String },
    /// Most recent inbound message from a vehicle
    #[serde(rename = "last_message")]
    LastMessageUpdate { vehicle: VehicleId, text: String },
}

impl TelemetryEvent {
    pub const fn vehicle(&self) -> VehicleId {
        match self {
            TelemetryEvent::ChannelUpdate { vehicle, .. }
            | TelemetryEvent::StatusMessageUpdate { vehicle, .. }
            | TelemetryEvent::LastMessageUpdate { vehicle, .. } => *vehicle,
        }
    }

    pub const fn kind_name(&self) -> &'static str {
        match self {
            TelemetryEvent::ChannelUpdate { .. } => "channel",
            TelemetryEvent::StatusMessageUpdate { .. } => "status_message",
            TelemetryEvent::LastMessageUpdate { .. } => "last_message",
        }
    }
}
