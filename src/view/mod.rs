//! View layer: snapshot diffing and the render-surface contract
//!
//! The synchronizer compares consecutive store snapshots and turns the
//! differences into [`RenderInstruction`]s. A [`RenderSurface`] applies them;
//! it owns layout, styling and widget identity. Nothing here runs on the
//! background runtime.

pub mod render_loop;
pub mod sync;
pub mod terminal;
pub mod widgets;

use std::fmt;

use crate::types::{Channel, StatusColor, StatusKind, VehicleId};

pub use render_loop::{RenderLoop, RenderLoopStats};
pub use sync::ViewSynchronizer;
pub use terminal::TerminalSurface;
pub use widgets::{WidgetHandle, WidgetKey, WidgetRegistry};

/// Text area of the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RegionId {
    /// Status message of one vehicle
    Status(VehicleId),
    /// Last inbound message of one vehicle
    LastMessage(VehicleId),
    /// Confirmation/rejection line shared by all command buttons
    Notice,
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionId::Status(v) => write!(f, "status[{v}]"),
            RegionId::LastMessage(v) => write!(f, "last_message[{v}]"),
            RegionId::Notice => f.write_str("notice"),
        }
    }
}

/// One change to apply to the render surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderInstruction {
    SetIcon {
        vehicle: VehicleId,
        channel: Channel,
        status: StatusKind,
    },
    SetText {
        region: RegionId,
        text: String,
        color: StatusColor,
    },
}

impl RenderInstruction {
    pub fn apply_to<S: RenderSurface + ?Sized>(&self, surface: &mut S) {
        match self {
            RenderInstruction::SetIcon {
                vehicle,
                channel,
                status,
            } => surface.set_icon(*vehicle, *channel, *status),
            RenderInstruction::SetText { region, text, color } => surface.set_text(*region, text, *color),
        }
    }
}

/// Narrow contract between the view synchronizer and a rendering toolkit.
pub trait RenderSurface {
    fn set_icon(&mut self, vehicle: VehicleId, channel: Channel, status: StatusKind);

    fn set_text(&mut self, region: RegionId, text: &str, color: StatusColor);

    /// Called once after every tick that applied at least one instruction.
    fn flush(&mut self) {}
}

/// Surface that records every instruction; used by tests and headless runs.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    pub instructions: Vec<RenderInstruction>,
    pub flushes: usize,
}

impl RenderSurface for RecordingSurface {
    fn set_icon(&mut self, vehicle: VehicleId, channel: Channel, status: StatusKind) {
        self.instructions.push(RenderInstruction::SetIcon {
            vehicle,
            channel,
            status,
        });
    }

    fn set_text(&mut self, region: RegionId, text: &str, color: StatusColor) {
        self.instructions.push(RenderInstruction::SetText {
            region,
            text: text.to_string(),
            color,
        });
    }

    fn flush(&mut self) {
        self.flushes += 1;
    }
}
