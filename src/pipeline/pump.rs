//! Source pump: moves events from a telemetry source into the ingestion
//! channel until the source ends or shutdown is requested.

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::fleet::{IngestSender, OfferOutcome};
use crate::telemetry::{SourceEvent, TelemetrySource};

/// Returns the number of events offered. A source error ends the pump with
/// that error; EOF and cancellation end it cleanly.
pub async fn run_source<S: TelemetrySource>(
    source: &mut S,
    sender: IngestSender,
    cancel_token: CancellationToken,
) -> Result<u64> {
    let mut offered = 0u64;
    info!(source = source.source_name(), "Reading fleet telemetry");

    loop {
        let event = tokio::select! {
            _ = cancel_token.cancelled() => {
                info!(source = source.source_name(), "[SourcePump] Shutdown signal received");
                break;
            }
            result = source.next_event() => result?,
        };

        match event {
            SourceEvent::Event(event) => match sender.offer(event) {
                OfferOutcome::Queued | OfferOutcome::QueuedDroppedOldest => offered += 1,
                OfferOutcome::Closed => {
                    warn!("[SourcePump] Ingestion channel closed, stopping");
                    break;
                }
            },
            SourceEvent::Eof => {
                info!(
                    source = source.source_name(),
                    events = offered,
                    "[SourcePump] Source reached end"
                );
                break;
            }
        }
    }

    Ok(offered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fleet::ingest;
    use crate::telemetry::LineSource;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn test_pump_forwards_until_eof() {
        let input: &'static [u8] = b"1: one\ngarbage\n2: two\n";
        let mut source = LineSource::new(BufReader::new(input), "test");
        let (tx, mut rx) = ingest::channel(None);

        let offered = run_source(&mut source, tx, CancellationToken::new()).await.unwrap();
        assert_eq!(offered, 2);
        assert_eq!(rx.try_drain().len(), 2);
    }

    #[tokio::test]
    async fn test_pump_stops_when_channel_closed() {
        let input: &'static [u8] = b"1: one\n2: two\n";
        let mut source = LineSource::new(BufReader::new(input), "test");
        let (tx, rx) = ingest::channel(None);
        rx.close();

        let offered = run_source(&mut source, tx, CancellationToken::new()).await.unwrap();
        assert_eq!(offered, 0);
    }
}
