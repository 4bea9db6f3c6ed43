//! Fleet identity and status-channel types: VehicleId, StatusKind, Channel

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Vehicle Identity
// ============================================================================

/// Identifier of one fleet member ("Coug"), numbered from 1.
///
/// Zero is never a valid id. The upper bound is the configured fleet size and
/// is enforced by the status store, not by this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct VehicleId(u8);

impl VehicleId {
    /// Returns `None` for zero.
    pub const fn new(id: u8) -> Option<Self> {
        if id == 0 {
            None
        } else {
            Some(Self(id))
        }
    }

    pub const fn get(self) -> u8 {
        self.0
    }

    /// Operator-facing name, e.g. "Coug 2".
    pub fn label(self) -> String {
        format!("Coug {}", self.0)
    }

    /// All ids of a fleet of `count` vehicles, in order.
    pub fn fleet(count: u8) -> impl Iterator<Item = VehicleId> {
        (1..=count).map(VehicleId)
    }
}

impl TryFrom<u8> for VehicleId {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| "vehicle id must be >= 1".to_string())
    }
}

impl From<VehicleId> for u8 {
    fn from(id: VehicleId) -> Self {
        id.0
    }
}

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Status Kind
// ============================================================================

/// Health of one connection, sensor or node: boolean with a pending state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    Negative,
    Positive,
    #[default]
    Waiting,
}

impl StatusKind {
    pub const ALL: [StatusKind; 3] = [StatusKind::Negative, StatusKind::Positive, StatusKind::Waiting];
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusKind::Negative => write!(f, "negative"),
            StatusKind::Positive => write!(f, "positive"),
            StatusKind::Waiting => write!(f, "waiting"),
        }
    }
}

// ============================================================================
// Channel Categories
// ============================================================================

/// Communication links monitored per vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConnectionChannel {
    Wifi,
    Radio,
    Modem,
}

impl ConnectionChannel {
    pub const ALL: [ConnectionChannel; 3] = [Self::Wifi, Self::Radio, Self::Modem];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Wifi => "wifi",
            Self::Radio => "radio",
            Self::Modem => "modem",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Wifi => "Wifi",
            Self::Radio => "Radio",
            Self::Modem => "Modem",
        }
    }
}

/// On-board sensors monitored per vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SensorChannel {
    Modem,
    Dvl,
    Gps,
    Imu,
    Leak,
    Battery,
}

impl SensorChannel {
    pub const ALL: [SensorChannel; 6] = [
        Self::Modem,
        Self::Dvl,
        Self::Gps,
        Self::Imu,
        Self::Leak,
        Self::Battery,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Modem => "modem",
            Self::Dvl => "dvl",
            Self::Gps => "gps",
            Self::Imu => "imu",
            Self::Leak => "leak",
            Self::Battery => "battery",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Modem => "Modem",
            Self::Dvl => "DVL",
            Self::Gps => "GPS",
            Self::Imu => "IMU",
            Self::Leak => "Leak",
            Self::Battery => "Battery",
        }
    }
}

/// Software nodes running on each vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeChannel {
    SafetyMonitoring,
    DepthController,
    HeadingController,
    Localization,
}

impl NodeChannel {
    pub const ALL: [NodeChannel; 4] = [
        Self::SafetyMonitoring,
        Self::DepthController,
        Self::HeadingController,
        Self::Localization,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::SafetyMonitoring => "safety_monitoring",
            Self::DepthController => "depth_controller",
            Self::HeadingController => "heading_controller",
            Self::Localization => "localization",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::SafetyMonitoring => "Safety Monitoring",
            Self::DepthController => "Depth Controller",
            Self::HeadingController => "Heading Controller",
            Self::Localization => "Localization",
        }
    }
}

// ============================================================================
// Channel
// ============================================================================

/// One monitored status channel of a vehicle.
///
/// Text form is `<group>.<name>`, e.g. `connection.wifi`, `sensor.gps`,
/// `node.depth_controller`. The dashboard's legacy feed keys
/// (`Wifi_connections`, `GPS_sensors`) are accepted when parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Channel {
    Connection(ConnectionChannel),
    Sensor(SensorChannel),
    Node(NodeChannel),
}

impl Channel {
    /// Default dashboard layout: the three connection links and four sensors.
    pub const DEFAULT_SET: [Channel; 7] = [
        Channel::Connection(ConnectionChannel::Wifi),
        Channel::Connection(ConnectionChannel::Radio),
        Channel::Connection(ConnectionChannel::Modem),
        Channel::Sensor(SensorChannel::Modem),
        Channel::Sensor(SensorChannel::Dvl),
        Channel::Sensor(SensorChannel::Gps),
        Channel::Sensor(SensorChannel::Imu),
    ];

    /// Every channel the dashboard knows about.
    pub fn all() -> impl Iterator<Item = Channel> {
        ConnectionChannel::ALL
            .into_iter()
            .map(Channel::Connection)
            .chain(SensorChannel::ALL.into_iter().map(Channel::Sensor))
            .chain(NodeChannel::ALL.into_iter().map(Channel::Node))
    }

    pub const fn group(self) -> &'static str {
        match self {
            Channel::Connection(_) => "connection",
            Channel::Sensor(_) => "sensor",
            Channel::Node(_) => "node",
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Channel::Connection(c) => c.name(),
            Channel::Sensor(s) => s.name(),
            Channel::Node(n) => n.name(),
        }
    }

    /// Short label shown next to the status icon.
    pub const fn label(self) -> &'static str {
        match self {
            Channel::Connection(c) => c.label(),
            Channel::Sensor(s) => s.label(),
            Channel::Node(n) => n.label(),
        }
    }

    fn from_parts(group: &str, name: &str) -> Option<Self> {
        match group {
            "connection" | "connections" => ConnectionChannel::ALL
                .into_iter()
                .find(|c| c.name() == name)
                .map(Channel::Connection),
            "sensor" | "sensors" => SensorChannel::ALL
                .into_iter()
                .find(|s| s.name() == name)
                .map(Channel::Sensor),
            "node" | "nodes" => NodeChannel::ALL
                .into_iter()
                .find(|n| n.name() == name)
                .map(Channel::Node),
            _ => None,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.group(), self.name())
    }
}

/// Text did not name a known channel.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown channel '{0}' (expected e.g. connection.wifi, sensor.gps, node.depth_controller)")]
pub struct ParseChannelError(pub String);

impl FromStr for Channel {
    type Err = ParseChannelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let lower = trimmed.to_ascii_lowercase();

        let parsed = if let Some((group, name)) = lower.split_once('.') {
            Channel::from_parts(group, name)
        } else if let Some((name, group)) = lower.rsplit_once('_') {
            // Legacy feed keys: "<Name>_connections" / "<Name>_sensors"
            Channel::from_parts(group, name)
        } else {
            None
        };

        parsed.ok_or_else(|| ParseChannelError(trimmed.to_string()))
    }
}

impl TryFrom<String> for Channel {
    type Error = ParseChannelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Channel> for String {
    fn from(channel: Channel) -> Self {
        channel.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vehicle_id_rejects_zero() {
        assert!(VehicleId::new(0).is_none());
        assert_eq!(VehicleId::new(2).map(VehicleId::get), Some(2));
        assert!(serde_json::from_str::<VehicleId>("0").is_err());
        assert_eq!(serde_json::from_str::<VehicleId>("3").ok(), VehicleId::new(3));
    }

    #[test]
    fn test_fleet_ids_are_one_based() {
        let ids: Vec<u8> = VehicleId::fleet(3).map(VehicleId::get).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(VehicleId::fleet(0).count(), 0);
    }

    #[test]
    fn test_channel_text_form_roundtrips_for_every_channel() {
        for channel in Channel::all() {
            let text = channel.to_string();
            assert_eq!(text.parse::<Channel>(), Ok(channel), "failed on {text}");
        }
    }

    #[test]
    fn test_legacy_feed_keys_parse() {
        assert_eq!(
            "Wifi_connections".parse::<Channel>(),
            Ok(Channel::Connection(ConnectionChannel::Wifi))
        );
        assert_eq!(
            "GPS_sensors".parse::<Channel>(),
            Ok(Channel::Sensor(SensorChannel::Gps))
        );
        assert_eq!(
            "Modem_sensors".parse::<Channel>(),
            Ok(Channel::Sensor(SensorChannel::Modem))
        );
    }

    #[test]
    fn test_modem_is_distinct_per_group() {
        let link: Channel = "connection.modem".parse().unwrap();
        let sensor: Channel = "sensor.modem".parse().unwrap();
        assert_ne!(link, sensor);
        assert_eq!(link.label(), sensor.label());
    }

    #[test]
    fn test_unknown_channel_is_rejected() {
        assert!("sensor.sonar".parse::<Channel>().is_err());
        assert!("wifi".parse::<Channel>().is_err());
        assert!(serde_json::from_str::<Channel>("\"thruster.left\"").is_err());
    }
}
