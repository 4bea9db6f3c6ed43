//! Per-vehicle text state: status message classification and last message

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Display text for an empty status message.
pub const NO_STATUS_MESSAGE_TEXT: &str = "No message to be read";

/// Prefix applied to status text outside the recognized phrase table.
pub const UNRECOGNIZED_STATUS_PREFIX: &str = "Status flag unrecognized: ";

/// Display text before any message has arrived from a vehicle.
pub const NO_LAST_MESSAGE_TEXT: &str = "No messages have been received";

// ============================================================================
// Display Color
// ============================================================================

/// Color the render surface uses for a text region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusColor {
    Green,
    Red,
    Yellow,
    Orange,
    Blue,
    /// Surface default text color
    Neutral,
}

impl StatusColor {
    pub const fn as_str(self) -> &'static str {
        match self {
            StatusColor::Green => "green",
            StatusColor::Red => "red",
            StatusColor::Yellow => "yellow",
            StatusColor::Orange => "orange",
            StatusColor::Blue => "blue",
            StatusColor::Neutral => "neutral",
        }
    }
}

impl fmt::Display for StatusColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Status Message
// ============================================================================

/// Which entry of the phrase table a status message resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusClass {
    Running,
    NoConnection,
    Waiting,
    Empty,
    Unrecognized,
}

impl StatusClass {
    pub const fn color(self) -> StatusColor {
        match self {
            StatusClass::Running => StatusColor::Green,
            StatusClass::NoConnection => StatusColor::Red,
            StatusClass::Waiting => StatusColor::Yellow,
            StatusClass::Empty => StatusColor::Orange,
            StatusClass::Unrecognized => StatusColor::Blue,
        }
    }

    /// Total over all strings; matching ignores ASCII case.
    pub fn of(raw: &str) -> Self {
        if raw.is_empty() {
            StatusClass::Empty
        } else if raw.eq_ignore_ascii_case("running") {
            StatusClass::Running
        } else if raw.eq_ignore_ascii_case("no connection") {
            StatusClass::NoConnection
        } else if raw.eq_ignore_ascii_case("waiting") {
            StatusClass::Waiting
        } else {
            StatusClass::Unrecognized
        }
    }
}

/// Free-text status reported by a vehicle, with its resolved display form.
///
/// The raw text is always kept verbatim, including unrecognized phrases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    raw: String,
    display: String,
    class: StatusClass,
}

impl StatusMessage {
    pub fn classify(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let class = StatusClass::of(&raw);
        let display = match class {
            StatusClass::Empty => NO_STATUS_MESSAGE_TEXT.to_string(),
            StatusClass::Unrecognized => format!("{UNRECOGNIZED_STATUS_PREFIX}{raw}"),
            StatusClass::Running | StatusClass::NoConnection | StatusClass::Waiting => raw.clone(),
        };
        Self { raw, display, class }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn display_text(&self) -> &str {
        &self.display
    }

    pub const fn class(&self) -> StatusClass {
        self.class
    }

    pub const fn color(&self) -> StatusColor {
        self.class.color()
    }
}

impl Default for StatusMessage {
    fn default() -> Self {
        Self::classify("")
    }
}

// ============================================================================
// Last Message
// ============================================================================

/// Most recent inbound message from a vehicle.
///
/// `Received` with empty text is a real (empty) message, not the absence of one.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LastMessage {
    #[default]
    NotReceived,
    Received {
        text: String,
        received_at: DateTime<Utc>,
    },
}

impl LastMessage {
    pub fn received(text: impl Into<String>) -> Self {
        LastMessage::Received {
            text: text.into(),
            received_at: Utc::now(),
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            LastMessage::NotReceived => None,
            LastMessage::Received { text, .. } => Some(text),
        }
    }

    pub fn display_text(&self) -> &str {
        self.text().unwrap_or(NO_LAST_MESSAGE_TEXT)
    }

    pub const fn color(&self) -> StatusColor {
        match self {
            LastMessage::NotReceived => StatusColor::Orange,
            LastMessage::Received { .. } => StatusColor::Neutral,
        }
    }
}
