//! Terminal render surface
//!
//! Keeps one cell per registered widget and redraws the whole dashboard on
//! every flush. Colors come from `colored`; set `NO_COLOR` to disable them.

use std::io::Write;

use colored::{ColoredString, Colorize};
use tracing::{debug, warn};

use super::{RegionId, RenderSurface, WidgetKey, WidgetRegistry};
use crate::types::{Channel, StatusColor, StatusKind, VehicleId};

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

#[derive(Debug, Clone)]
enum Cell {
    Icon(StatusKind),
    Text { text: String, color: StatusColor },
}

pub struct TerminalSurface<W: Write> {
    out: W,
    registry: WidgetRegistry,
    vehicles: Vec<VehicleId>,
    channels: Vec<Channel>,
    cells: Vec<Cell>,
    clear_screen: bool,
    frames: u64,
}

impl TerminalSurface<std::io::Stdout> {
    pub fn stdout(vehicles: &[VehicleId], channels: &[Channel]) -> Self {
        Self::new(std::io::stdout(), vehicles, channels)
    }
}

impl<W: Write> TerminalSurface<W> {
    pub fn new(out: W, vehicles: &[VehicleId], channels: &[Channel]) -> Self {
        let registry = WidgetRegistry::build(vehicles, channels);
        let cells = registry
            .keys()
            .map(|key| match key {
                WidgetKey::Icon(..) => Cell::Icon(StatusKind::Waiting),
                WidgetKey::Text(_) => Cell::Text {
                    text: String::new(),
                    color: StatusColor::Neutral,
                },
            })
            .collect();
        Self {
            out,
            registry,
            vehicles: vehicles.to_vec(),
            channels: channels.to_vec(),
            cells,
            clear_screen: false,
            frames: 0,
        }
    }

    /// Clear the terminal before every frame.
    pub fn with_clear_screen(mut self, clear: bool) -> Self {
        self.clear_screen = clear;
        self
    }

    pub const fn frames(&self) -> u64 {
        self.frames
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn cell_mut(&mut self, key: WidgetKey) -> Option<&mut Cell> {
        let handle = self.registry.get(&key)?;
        self.cells.get_mut(handle.index())
    }

    fn cell(&self, key: WidgetKey) -> Option<&Cell> {
        let handle = self.registry.get(&key)?;
        self.cells.get(handle.index())
    }

    fn text(&self, region: RegionId) -> ColoredString {
        match self.cell(WidgetKey::Text(region)) {
            Some(Cell::Text { text, color }) => paint(text, *color),
            _ => paint("", StatusColor::Neutral),
        }
    }

    /// Full dashboard as text.
    pub fn render_frame(&self) -> String {
        let mut frame = String::new();
        frame.push_str(&format!("{}\n", "COUGARS Fleet Status".bold()));

        for &vehicle in &self.vehicles {
            frame.push_str(&format!("\n{}\n", vehicle.label().bold()));
            for group in ["connection", "sensor", "node"] {
                let icons: Vec<String> = self
                    .channels
                    .iter()
                    .filter(|c| c.group() == group)
                    .map(|&c| {
                        let status = match self.cell(WidgetKey::Icon(vehicle, c)) {
                            Some(Cell::Icon(kind)) => *kind,
                            _ => StatusKind::Waiting,
                        };
                        format!("{} {}", icon(status), c.label())
                    })
                    .collect();
                if !icons.is_empty() {
                    frame.push_str(&format!("  {:<12} {}\n", group_title(group), icons.join("  ")));
                }
            }
            frame.push_str(&format!("  {:<12} {}\n", "Status:", self.text(RegionId::Status(vehicle))));
            frame.push_str(&format!(
                "  {:<12} {}\n",
                "Last msg:",
                self.text(RegionId::LastMessage(vehicle))
            ));
        }

        frame.push_str(&format!("\n{} {}\n", ">>".blue().bold(), self.text(RegionId::Notice)));
        frame
    }
}

impl<W: Write> RenderSurface for TerminalSurface<W> {
    fn set_icon(&mut self, vehicle: VehicleId, channel: Channel, status: StatusKind) {
        match self.cell_mut(WidgetKey::Icon(vehicle, channel)) {
            Some(cell) => *cell = Cell::Icon(status),
            None => debug!(vehicle = %vehicle, channel = %channel, "No widget for icon"),
        }
    }

    fn set_text(&mut self, region: RegionId, text: &str, color: StatusColor) {
        match self.cell_mut(WidgetKey::Text(region)) {
            Some(cell) => {
                *cell = Cell::Text {
                    text: text.to_string(),
                    color,
                }
            }
            None => debug!(region = %region, "No widget for text region"),
        }
    }

    fn flush(&mut self) {
        let mut frame = self.render_frame();
        if self.clear_screen {
            frame.insert_str(0, CLEAR_SCREEN);
        }
        let result = self
            .out
            .write_all(frame.as_bytes())
            .and_then(|()| self.out.flush());
        match result {
            Ok(()) => self.frames += 1,
            Err(e) => warn!(error = %e, "Failed to write dashboard frame"),
        }
    }
}

fn group_title(group: &str) -> &'static str {
    match group {
        "connection" => "Connections:",
        "sensor" => "Sensors:",
        _ => "Nodes:",
    }
}

fn icon(status: StatusKind) -> ColoredString {
    match status {
        StatusKind::Positive => "✔".green().bold(),
        StatusKind::Negative => "✘".red().bold(),
        StatusKind::Waiting => "…".yellow(),
    }
}

fn paint(text: &str, color: StatusColor) -> ColoredString {
    match color {
        StatusColor::Green => text.green(),
        StatusColor::Red => text.red(),
        StatusColor::Yellow => text.yellow(),
        StatusColor::Orange => text.truecolor(255, 165, 0),
        StatusColor::Blue => text.blue(),
        StatusColor::Neutral => text.normal(),
    }
}
