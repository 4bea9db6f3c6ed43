//! Line-oriented telemetry wire format
//!
//! Each line is one of:
//!
//! ```text
//! {"type":"channel","vehicle":2,"channel":"connection.wifi","status":"positive"}
//! {"type":"status_message","vehicle":1,"text":"running"}
//! {"type":"last_message","vehicle":1,"text":"surfaced"}
//! 2: surfaced at waypoint 3
//! ```
//!
//! The last form is opaque text addressed to a vehicle and becomes a
//! last-message update.

use thiserror::Error;

use crate::types::{TelemetryEvent, VehicleId};

#[derive(Debug, Error)]
pub enum WireError {
    #[error("Malformed JSON event: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid vehicle id '{0}'")]
    InvalidVehicle(String),

    #[error("Unrecognized telemetry line: {0}")]
    Unrecognized(String),
}

/// Parse one line. Blank lines yield `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<TelemetryEvent>, WireError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Ok(None);
    }

    let trimmed = line.trim_start();
    if trimmed.starts_with('{') {
        return Ok(Some(serde_json::from_str(trimmed)?));
    }

    let Some((id, text)) = trimmed.split_once(':') else {
        return Err(WireError::Unrecognized(truncate(trimmed, 80)));
    };
    let id = id.trim();
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(WireError::Unrecognized(truncate(trimmed, 80)));
    }
    let vehicle = id
        .parse::<u8>()
        .ok()
        .and_then(VehicleId::new)
        .ok_or_else(|| WireError::InvalidVehicle(id.to_string()))?;

    let text = text.strip_prefix(' ').unwrap_or(text);
    Ok(Some(TelemetryEvent::LastMessageUpdate {
        vehicle,
        text: text.to_string(),
    }))
}

/// Encode an event as a single JSON line (no trailing newline).
pub fn encode_event(event: &TelemetryEvent) -> Result<String, WireError> {
    Ok(serde_json::to_string(event)?)
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
