//! Render loop: the cooperative event loop of the render context.
//!
//! Single task, single thread: it owns the synchronizer, the surface and the
//! command emitter. It redraws on a fixed tick or when the processing loop
//! signals a new generation, handles operator actions, and shows command
//! receipts. Nothing here awaits I/O.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{RenderSurface, ViewSynchronizer};
use crate::command::{CommandEmitter, CommandReceipt};
use crate::console::{UiAction, HELP_TEXT};
use crate::telemetry::LinkState;
use crate::types::StatusColor;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderLoopStats {
    pub ticks: u64,
    pub instructions: u64,
    pub commands_requested: u64,
    pub failed_receipts: u64,
}

pub struct RenderLoop<S: RenderSurface> {
    sync: ViewSynchronizer,
    surface: S,
    emitter: CommandEmitter,
    changed: watch::Receiver<u64>,
    actions: mpsc::Receiver<UiAction>,
    receipts: mpsc::UnboundedReceiver<CommandReceipt>,
    tick_interval: Duration,
    cancel_token: CancellationToken,
    link: Option<LinkWatch>,
    stats: RenderLoopStats,
}

/// Telemetry link state shown on the notice line.
struct LinkWatch {
    addr: String,
    state: watch::Receiver<LinkState>,
}

impl<S: RenderSurface> RenderLoop<S> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sync: ViewSynchronizer,
        surface: S,
        emitter: CommandEmitter,
        changed: watch::Receiver<u64>,
        actions: mpsc::Receiver<UiAction>,
        receipts: mpsc::UnboundedReceiver<CommandReceipt>,
        tick_interval: Duration,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            sync,
            surface,
            emitter,
            changed,
            actions,
            receipts,
            tick_interval,
            cancel_token,
            link: None,
            stats: RenderLoopStats::default(),
        }
    }

    /// Show changes of the telemetry link at `addr` on the notice line.
    pub fn with_link_state(mut self, addr: impl Into<String>, state: watch::Receiver<LinkState>) -> Self {
        self.link = Some(LinkWatch {
            addr: addr.into(),
            state,
        });
        self
    }

    /// Run until cancelled or until the operator quits. Quitting cancels the
    /// shared token so the background context shuts down too.
    pub async fn run(mut self) -> (RenderLoopStats, S) {
        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut watch_open = true;
        let mut actions_open = true;
        let mut receipts_open = true;
        let mut link = self.link.take();
        let mut link_open = link.is_some();

        loop {
            tokio::select! {
                biased;
                _ = self.cancel_token.cancelled() => {
                    debug!("[RenderLoop] Shutdown signal received");
                    break;
                }
                action = self.actions.recv(), if actions_open => match action {
                    Some(UiAction::Quit) => {
                        info!("Operator requested shutdown");
                        self.cancel_token.cancel();
                        break;
                    }
                    Some(action) => {
                        self.handle_action(action);
                        self.tick();
                    }
                    None => actions_open = false,
                },
                receipt = self.receipts.recv(), if receipts_open => match receipt {
                    Some(receipt) => {
                        self.handle_receipt(&receipt);
                        self.tick();
                    }
                    None => receipts_open = false,
                },
                changed = self.changed.changed(), if watch_open => match changed {
                    Ok(()) => {
                        self.changed.borrow_and_update();
                        self.tick();
                    }
                    Err(_) => watch_open = false,
                },
                state = link_changed(&mut link), if link_open => match (state, &link) {
                    (Some(state), Some(watch)) => {
                        if let Some((text, color)) = state.notice(&watch.addr) {
                            self.sync.post_notice(text, color);
                        }
                        self.tick();
                    }
                    _ => link_open = false,
                },
                _ = interval.tick() => self.tick(),
            }
        }

        // Final frame so the last accepted state is on screen
        self.tick();
        (self.stats, self.surface)
    }

    fn tick(&mut self) {
        let applied = self.sync.tick(&mut self.surface);
        self.stats.ticks += 1;
        self.stats.instructions += applied as u64;
    }

    fn handle_action(&mut self, action: UiAction) {
        match action {
            UiAction::Command(command) => {
                self.stats.commands_requested += 1;
                let outcome = self.emitter.request(command);
                let (text, color) = outcome.notice();
                self.sync.set_notice(text, color);
            }
            UiAction::Confirm(confirmed) => match self.emitter.resolve_confirmation(confirmed) {
                Some(outcome) => {
                    let (text, color) = outcome.notice();
                    self.sync.set_notice(text, color);
                }
                None => self.sync.set_notice("No command is waiting for confirmation", StatusColor::Neutral),
            },
            UiAction::Help => self.sync.set_notice(HELP_TEXT, StatusColor::Neutral),
            UiAction::Quit => {}
        }
    }

    fn handle_receipt(&mut self, receipt: &CommandReceipt) {
        match receipt.failure_notice() {
            Some(notice) => {
                self.stats.failed_receipts += 1;
                self.sync.set_notice(notice, StatusColor::Red);
            }
            None => debug!(id = receipt.id, command = %receipt.text, "Command delivered"),
        }
    }
}

/// Next link state, or `None` once the source is gone.
async fn link_changed(link: &mut Option<LinkWatch>) -> Option<LinkState> {
    match link {
        Some(watch) => match watch.state.changed().await {
            Ok(()) => Some(watch.state.borrow_and_update().clone()),
            Err(_) => None,
        },
        None => std::future::pending().await,
    }
}
