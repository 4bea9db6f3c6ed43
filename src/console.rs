//! Console input: operator commands typed on stdin.
//!
//! Reading happens on a plain OS thread so a blocking `read_line` never
//! holds up either runtime; parsed actions are handed to the render context
//! over a channel.

use std::io::BufRead;
use std::thread;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::command::{FleetCommand, VehicleCommand};
use crate::types::VehicleId;

pub const HELP_TEXT: &str = "Commands: load | start | recall | abort [N]  (N = Coug number), y/n to confirm, q to quit";

/// What the operator asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiAction {
    Command(FleetCommand),
    Confirm(bool),
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseActionError {
    #[error("unknown command '{0}'")]
    Unknown(String),
    #[error("Coug '{0}' is not part of the fleet")]
    InvalidVehicle(String),
}

/// Parse one console line. Blank lines yield `Ok(None)`.
pub fn parse_action(line: &str, vehicle_count: u8) -> Result<Option<UiAction>, ParseActionError> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let target = words.next();
    if words.next().is_some() {
        return Err(ParseActionError::Unknown(line.trim().to_string()));
    }
    let verb = verb.to_ascii_lowercase();

    let action = match (verb.as_str(), target) {
        ("y" | "yes", None) => UiAction::Confirm(true),
        ("n" | "no", None) => UiAction::Confirm(false),
        ("q" | "quit" | "exit", None) => UiAction::Quit,
        ("h" | "help" | "?", None) => UiAction::Help,
        ("load", None) => UiAction::Command(FleetCommand::LoadMissions),
        ("start", None) => UiAction::Command(FleetCommand::StartMissions),
        ("recall", None) => UiAction::Command(FleetCommand::RecallVehicles),
        ("abort", None) => UiAction::Command(FleetCommand::AbortAll),
        ("load" | "start" | "recall" | "abort", Some(n)) => {
            let vehicle = n
                .parse::<u8>()
                .ok()
                .filter(|&id| id <= vehicle_count)
                .and_then(VehicleId::new)
                .ok_or_else(|| ParseActionError::InvalidVehicle(n.to_string()))?;
            let command = match verb.as_str() {
                "load" => VehicleCommand::LoadMission,
                "start" => VehicleCommand::StartMission,
                "recall" => VehicleCommand::Recall,
                _ => VehicleCommand::Abort,
            };
            UiAction::Command(FleetCommand::Vehicle(vehicle, command))
        }
        _ => return Err(ParseActionError::Unknown(line.trim().to_string())),
    };
    Ok(Some(action))
}

/// Read actions from `reader` until EOF or until the receiver is gone.
///
/// An EOF is reported as `Quit` so a closed console shuts the dashboard down.
pub fn read_actions<R: BufRead>(reader: R, vehicle_count: u8, actions: &mpsc::Sender<UiAction>) -> u64 {
    let mut sent = 0u64;
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "Console read failed");
                break;
            }
        };
        match parse_action(&line, vehicle_count) {
            Ok(Some(action)) => {
                if actions.blocking_send(action).is_err() {
                    return sent;
                }
                sent += 1;
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "{}", HELP_TEXT),
        }
    }
    debug!("Console input closed");
    let _ = actions.blocking_send(UiAction::Quit);
    sent
}

/// Spawn the stdin reader thread.
pub fn spawn_stdin_reader(
    vehicle_count: u8,
    actions: mpsc::Sender<UiAction>,
) -> std::io::Result<thread::JoinHandle<u64>> {
    thread::Builder::new()
        .name("console-input".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            read_actions(stdin.lock(), vehicle_count, &actions)
        })
}
