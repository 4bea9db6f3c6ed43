//! Command Emitter: lives in the render context.

use chrono::Utc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use super::{
    CommandOutcome, FleetCommand, OutboundCommand, SendFailure, ABORT_ALL_CANCELED, ABORT_ALL_PROMPT,
};

pub struct CommandEmitter {
    outbound: mpsc::Sender<OutboundCommand>,
    pending: Option<FleetCommand>,
    next_id: u64,
}

impl CommandEmitter {
    pub fn new(outbound: mpsc::Sender<OutboundCommand>) -> Self {
        Self {
            outbound,
            pending: None,
            next_id: 1,
        }
    }

    /// Emit a command, or park it when it needs confirmation first.
    ///
    /// A new request replaces any confirmation still pending; the replaced
    /// command is treated as declined.
    pub fn request(&mut self, command: FleetCommand) -> CommandOutcome {
        if let Some(old) = self.pending.take() {
            debug!(command = %old, "Pending confirmation superseded by a new request");
        }
        if command.requires_confirmation() {
            self.pending = Some(command);
            return CommandOutcome::NeedsConfirmation {
                prompt: ABORT_ALL_PROMPT.to_string(),
            };
        }
        self.emit(command)
    }

    /// Answer the pending confirmation. `None` when nothing is pending.
    pub fn resolve_confirmation(&mut self, confirmed: bool) -> Option<CommandOutcome> {
        let command = self.pending.take()?;
        if confirmed {
            Some(self.emit(command))
        } else {
            info!(command = ?command, "Command canceled at confirmation");
            Some(CommandOutcome::Canceled {
                notice: ABORT_ALL_CANCELED.to_string(),
            })
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    fn emit(&mut self, command: FleetCommand) -> CommandOutcome {
        let id = self.next_id;
        let text = command.text();
        let outbound = OutboundCommand {
            id,
            command,
            text: text.clone(),
            issued_at: Utc::now(),
        };

        match self.outbound.try_send(outbound) {
            Ok(()) => {
                self.next_id += 1;
                info!(id = id, command = %text, "Command emitted");
                CommandOutcome::Dispatched { id, notice: text }
            }
            Err(e) => {
                let error = match e {
                    TrySendError::Full(_) => SendFailure::QueueFull,
                    TrySendError::Closed(_) => SendFailure::Closed,
                };
                warn!(command = %text, error = %error, "Command rejected");
                CommandOutcome::Rejected {
                    notice: format!("Command rejected ({error}): {text}"),
                    error,
                }
            }
        }
    }
}
