//! Command dispatcher: background delivery of emitted commands.
//!
//! On shutdown the outbound queue is closed so nothing new is accepted, and
//! commands already queued are delivered within the drain timeout. Anything
//! left after the deadline gets a `Shutdown` receipt.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{CommandReceipt, CommandSink, DeliveryError, OutboundCommand};
use crate::config::CommandConfig;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub delivered: u64,
    pub failed: u64,
    /// Queued at shutdown but not sent before the drain deadline
    pub abandoned: u64,
}

pub struct CommandDispatcher<S: CommandSink> {
    inbound: mpsc::Receiver<OutboundCommand>,
    sink: S,
    receipts: mpsc::UnboundedSender<CommandReceipt>,
    cancel_token: CancellationToken,
    send_timeout: Duration,
    drain_timeout: Duration,
    stats: DispatchStats,
}

impl<S: CommandSink> CommandDispatcher<S> {
    pub fn new(
        inbound: mpsc::Receiver<OutboundCommand>,
        sink: S,
        receipts: mpsc::UnboundedSender<CommandReceipt>,
        cancel_token: CancellationToken,
        config: &CommandConfig,
    ) -> Self {
        Self {
            inbound,
            sink,
            receipts,
            cancel_token,
            send_timeout: config.send_timeout(),
            drain_timeout: config.drain_timeout(),
            stats: DispatchStats::default(),
        }
    }

    pub async fn run(mut self) -> DispatchStats {
        info!(sink = self.sink.sink_name(), "Command dispatcher started");

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel_token.cancelled() => {
                    info!("[CommandDispatcher] Shutdown signal received");
                    break;
                }
                next = self.inbound.recv() => next,
            };
            match next {
                Some(command) => self.deliver(command).await,
                None => {
                    info!("[CommandDispatcher] Emitter gone, stopping");
                    return self.stats;
                }
            }
        }

        self.drain().await;
        info!(
            delivered = self.stats.delivered,
            failed = self.stats.failed,
            abandoned = self.stats.abandoned,
            "Command dispatcher stopped"
        );
        self.stats
    }

    async fn drain(&mut self) {
        self.inbound.close();
        let deadline = Instant::now() + self.drain_timeout;

        loop {
            let next = match tokio::time::timeout_at(deadline, self.inbound.recv()).await {
                Ok(next) => next,
                Err(_) => break,
            };
            let Some(command) = next else {
                return;
            };
            let (id, text) = (command.id, command.text.clone());
            if tokio::time::timeout_at(deadline, self.deliver(command)).await.is_err() {
                self.stats.abandoned += 1;
                self.report(CommandReceipt {
                    id,
                    text,
                    result: Err(DeliveryError::Shutdown),
                });
                break;
            }
        }

        warn!(drain_timeout_ms = self.drain_timeout.as_millis() as u64, "Command drain timed out");
        while let Ok(command) = self.inbound.try_recv() {
            self.stats.abandoned += 1;
            self.report(CommandReceipt {
                id: command.id,
                text: command.text,
                result: Err(DeliveryError::Shutdown),
            });
        }
    }

    async fn deliver(&mut self, command: OutboundCommand) {
        let result = match tokio::time::timeout(self.send_timeout, self.sink.send(&command)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(DeliveryError::Sink(format!("{e:#}"))),
            Err(_) => Err(DeliveryError::Timeout(self.send_timeout)),
        };

        match &result {
            Ok(()) => self.stats.delivered += 1,
            Err(e) => {
                self.stats.failed += 1;
                warn!(id = command.id, command = %command.text, error = %e, "Command delivery failed");
            }
        }

        self.report(CommandReceipt {
            id: command.id,
            text: command.text,
            result,
        });
    }

    fn report(&self, receipt: CommandReceipt) {
        // The render context may already be gone during shutdown
        let _ = self.receipts.send(receipt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{ChannelSink, CommandEmitter, FleetCommand};
    use anyhow::Result;
    use async_trait::async_trait;

    struct SlowSink {
        delay: Duration,
    }

    #[async_trait]
    impl CommandSink for SlowSink {
        async fn send(&mut self, _command: &OutboundCommand) -> Result<()> {
            tokio::time::sleep(self.delay).await;
            Ok(())
        }

        fn sink_name(&self) -> &str {
            "slow"
        }
    }

    struct FailingSink;

    #[async_trait]
    impl CommandSink for FailingSink {
        async fn send(&mut self, _command: &OutboundCommand) -> Result<()> {
            anyhow::bail!("radio link down")
        }

        fn sink_name(&self) -> &str {
            "failing"
        }
    }

    #[tokio::test]
    async fn test_delivers_and_reports_receipts() {
        let (out_tx, out_rx) = mpsc::channel(4);
        let (receipt_tx, mut receipt_rx) = mpsc::unbounded_channel();
        let (sink_tx, mut sink_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let dispatcher = CommandDispatcher::new(
            out_rx,
            ChannelSink::new(sink_tx),
            receipt_tx,
            cancel.clone(),
            &CommandConfig::default(),
        );
        let handle = tokio::spawn(dispatcher.run());

        let mut emitter = CommandEmitter::new(out_tx);
        emitter.request(FleetCommand::LoadMissions);

        assert_eq!(sink_rx.recv().await.as_deref(), Some("Loading the missions..."));
        let receipt = receipt_rx.recv().await.unwrap();
        assert_eq!(receipt.id, 1);
        assert!(receipt.result.is_ok());

        drop(emitter);
        let stats = handle.await.unwrap();
        assert_eq!(stats.delivered, 1);
    }

    #[tokio::test]
    async fn test_sink_failure_becomes_failed_receipt() {
        let (out_tx, out_rx) = mpsc::channel(4);
        let (receipt_tx, mut receipt_rx) = mpsc::unbounded_channel();
        let dispatcher = CommandDispatcher::new(
            out_rx,
            FailingSink,
            receipt_tx,
            CancellationToken::new(),
            &CommandConfig::default(),
        );
        let handle = tokio::spawn(dispatcher.run());

        CommandEmitter::new(out_tx).request(FleetCommand::RecallVehicles);
        let receipt = receipt_rx.recv().await.unwrap();
        assert_eq!(receipt.failure_notice().as_deref(), Some("Command failed: radio link down"));

        let stats = handle.await.unwrap();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.delivered, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_drain_is_bounded() {
        let (out_tx, out_rx) = mpsc::channel(8);
        let (receipt_tx, mut receipt_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let config = CommandConfig::default();

        let mut emitter = CommandEmitter::new(out_tx);
        for _ in 0..3 {
            emitter.request(FleetCommand::StartMissions);
        }
        cancel.cancel();

        // 1.5 s per command against a 2 s drain budget: one fits
        let sink = SlowSink {
            delay: Duration::from_millis(1_500),
        };
        let started = Instant::now();
        let stats = CommandDispatcher::new(out_rx, sink, receipt_tx, cancel, &config)
            .run()
            .await;

        assert!(started.elapsed() <= config.drain_timeout() + Duration::from_millis(10));
        assert_eq!(stats.delivered, 1);
        assert_eq!(stats.abandoned, 2);

        // New commands are refused once shutdown began
        assert!(matches!(
            emitter.request(FleetCommand::LoadMissions),
            crate::command::CommandOutcome::Rejected { .. }
        ));

        let mut shutdown_receipts = 0;
        while let Ok(receipt) = receipt_rx.try_recv() {
            if receipt.result == Err(DeliveryError::Shutdown) {
                shutdown_receipts += 1;
            }
        }
        assert_eq!(shutdown_receipts, 2);
    }
}
