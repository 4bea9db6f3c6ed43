//! Bridge Scenario Tests
//!
//! End-to-end behavior of the dashboard bridge through the public API:
//! telemetry into the store, snapshots out to a render surface, and operator
//! commands through the emitter and dispatcher.

use std::time::Duration;

use tokio::io::BufReader;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use cougars_dashboard::command::{
    ChannelSink, CommandDispatcher, CommandEmitter, CommandOutcome, FleetCommand, VehicleCommand,
};
use cougars_dashboard::config::{defaults, CommandConfig, FleetConfig};
use cougars_dashboard::fleet::{ingest, FleetStatusStore, InvalidChannelError, OfferOutcome};
use cougars_dashboard::pipeline::{run_source, ProcessingLoop};
use cougars_dashboard::telemetry::LineSource;
use cougars_dashboard::types::{
    Channel, ConnectionChannel, NodeChannel, SensorChannel, StatusColor, StatusKind, TelemetryEvent, VehicleId,
};
use cougars_dashboard::view::{RecordingSurface, RegionId, RenderInstruction, TerminalSurface, ViewSynchronizer};

const WIFI: Channel = Channel::Connection(ConnectionChannel::Wifi);

fn vid(n: u8) -> VehicleId {
    VehicleId::new(n).unwrap()
}

fn default_store() -> FleetStatusStore {
    FleetStatusStore::from_config(&FleetConfig::default())
}

/// A synchronizer that has already rendered the initial state.
fn primed(store: &FleetStatusStore) -> (ViewSynchronizer, RecordingSurface) {
    let mut sync = ViewSynchronizer::new(store.reader());
    let mut surface = RecordingSurface::default();
    sync.tick(&mut surface);
    surface.instructions.clear();
    (sync, surface)
}

// ============================================================================
// Store -> View
// ============================================================================

#[test]
fn test_single_update_renders_single_icon() {
    let mut store = default_store();
    let (mut sync, mut surface) = primed(&store);

    store.apply_update(vid(2), WIFI, StatusKind::Positive).unwrap();
    let applied = sync.tick(&mut surface);

    assert_eq!(applied, 1);
    assert_eq!(
        surface.instructions,
        vec![RenderInstruction::SetIcon {
            vehicle: vid(2),
            channel: WIFI,
            status: StatusKind::Positive,
        }]
    );
}

#[test]
fn test_status_message_colors() {
    let mut store = default_store();
    let (mut sync, mut surface) = primed(&store);

    store.apply_status_message(vid(1), "running").unwrap();
    sync.tick(&mut surface);
    assert!(surface.instructions.contains(&RenderInstruction::SetText {
        region: RegionId::Status(vid(1)),
        text: "running".to_string(),
        color: StatusColor::Green,
    }));

    surface.instructions.clear();
    store.apply_status_message(vid(1), "").unwrap();
    sync.tick(&mut surface);
    assert!(surface.instructions.contains(&RenderInstruction::SetText {
        region: RegionId::Status(vid(1)),
        text: "No message to be read".to_string(),
        color: StatusColor::Orange,
    }));
}

#[test]
fn test_no_apply_means_no_instructions() {
    let store = default_store();
    let (mut sync, mut surface) = primed(&store);
    let flushes = surface.flushes;

    for _ in 0..5 {
        assert_eq!(sync.tick(&mut surface), 0);
    }
    assert!(surface.instructions.is_empty());
    assert_eq!(surface.flushes, flushes);
}

#[test]
fn test_invalid_update_leaves_store_unchanged() {
    let config = FleetConfig::default();
    let mut store = FleetStatusStore::from_config(&config);
    let before = store.snapshot();

    let err = store
        .apply_update(vid(9), WIFI, StatusKind::Negative)
        .unwrap_err();
    assert_eq!(err, InvalidChannelError::UnknownVehicle(vid(9)));

    let after = store.snapshot();
    assert_eq!(after.generation(), before.generation());
    assert_eq!(after.status(vid(1), WIFI), before.status(vid(1), WIFI));
}

#[test]
fn test_unconfigured_channel_is_rejected() {
    let mut store = FleetStatusStore::new(VehicleId::fleet(2), &[WIFI]);
    let gps = Channel::Sensor(SensorChannel::Gps);

    let err = store.apply_update(vid(1), gps, StatusKind::Positive).unwrap_err();
    assert!(matches!(err, InvalidChannelError::UnknownChannel { .. }));
    assert_eq!(store.snapshot().generation(), 0);
}

#[test]
fn test_batch_keeps_valid_events_when_some_are_rejected() {
    let safety = Channel::Node(NodeChannel::SafetyMonitoring);
    let mut store = FleetStatusStore::new(VehicleId::fleet(3), &[WIFI, safety]);
    let outcome = store.apply_batch(vec![
        TelemetryEvent::ChannelUpdate {
            vehicle: vid(1),
            channel: safety,
            status: StatusKind::Positive,
        },
        TelemetryEvent::StatusMessageUpdate {
            vehicle: vid(7),
            text: "running".to_string(),
        },
    ]);

    assert_eq!(outcome.applied, 1);
    assert_eq!(outcome.rejected.len(), 1);
    assert_eq!(outcome.generation, 1);
    assert_eq!(store.snapshot().status(vid(1), safety), Some(StatusKind::Positive));

    // A node channel outside the default layout is rejected there
    let mut default_layout = default_store();
    let outcome = default_layout.apply_batch(vec![TelemetryEvent::ChannelUpdate {
        vehicle: vid(1),
        channel: safety,
        status: StatusKind::Positive,
    }]);
    assert_eq!(outcome.applied, 0);
    assert!(!outcome.changed);
}

#[test]
fn test_terminal_surface_shows_notice_and_icons() {
    let mut store = default_store();
    let vehicles: Vec<_> = VehicleId::fleet(3).collect();
    let mut surface = TerminalSurface::new(Vec::new(), &vehicles, &Channel::DEFAULT_SET);
    let mut sync = ViewSynchronizer::new(store.reader());

    store.apply_update(vid(3), WIFI, StatusKind::Positive).unwrap();
    store.apply_last_message(vid(3), "surfaced").unwrap();
    sync.tick(&mut surface);

    let frame = surface.render_frame();
    assert!(frame.contains("Coug 3"));
    assert!(frame.contains("surfaced"));
    assert!(frame.contains(defaults::NOTICE_PLACEHOLDER));
}

// ============================================================================
// Ingestion
// ============================================================================

#[test]
fn test_overflow_keeps_most_recent_in_order() {
    let (tx, mut rx) = ingest::channel(Some(3));
    let events: Vec<_> = (0..5)
        .map(|i| TelemetryEvent::LastMessageUpdate {
            vehicle: vid(1),
            text: format!("msg {i}"),
        })
        .collect();

    let outcomes: Vec<_> = events.iter().cloned().map(|e| tx.offer(e)).collect();
    assert_eq!(outcomes[2], OfferOutcome::Queued);
    assert_eq!(outcomes[3], OfferOutcome::QueuedDroppedOldest);

    assert_eq!(rx.try_drain(), events[2..].to_vec());
    assert_eq!(tx.dropped(), 2);
}

#[tokio::test]
async fn test_line_source_through_processing_loop_to_view() {
    const INPUT: &[u8] = b"{\"type\":\"channel\",\"vehicle\":2,\"channel\":\"connection.wifi\",\"status\":\"positive\"}\n\
not telemetry\n\
{\"type\":\"status_message\",\"vehicle\":1,\"text\":\"waiting\"}\n\
3: hello from the deep\n";

    let config = FleetConfig::default();
    let store = FleetStatusStore::from_config(&config);
    let reader = store.reader();
    let (tx, rx) = ingest::channel(config.ingestion.effective_capacity());
    let (changed_tx, changed_rx) = watch::channel(0);
    let cancel = CancellationToken::new();

    let processing = tokio::spawn(ProcessingLoop::new(store, rx, changed_tx, cancel.clone()).run());

    let mut source = LineSource::new(BufReader::new(INPUT), "fixture");
    let forwarded = run_source(&mut source, tx, cancel).await.unwrap();
    assert_eq!(forwarded, 3);
    assert_eq!(source.skipped(), 1);

    let stats = processing.await.unwrap();
    assert_eq!(stats.events_applied, 3);
    assert_eq!(*changed_rx.borrow(), reader.generation());

    let mut sync = ViewSynchronizer::new(reader.clone());
    let mut surface = RecordingSurface::default();
    sync.tick(&mut surface);

    let snapshot = reader.snapshot();
    assert_eq!(snapshot.status(vid(2), WIFI), Some(StatusKind::Positive));
    assert_eq!(snapshot.last_message(vid(3)).and_then(|m| m.text()), Some("hello from the deep"));
    assert!(surface.instructions.contains(&RenderInstruction::SetText {
        region: RegionId::Status(vid(1)),
        text: "waiting".to_string(),
        color: StatusColor::Yellow,
    }));
}

// ============================================================================
// Commands
// ============================================================================

#[tokio::test]
async fn test_abort_all_decline_then_confirm() {
    let (out_tx, out_rx) = mpsc::channel(8);
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
    assert!(matches!(
        emitter.request(FleetCommand::AbortAll),
        CommandOutcome::NeedsConfirmation { .. }
    ));
    let canceled = emitter.resolve_confirmation(false).unwrap();
    assert!(matches!(canceled, CommandOutcome::Canceled { .. }));
    assert_eq!(canceled.notice().0, "Canceling abort missions command...");
    assert!(emitter.resolve_confirmation(true).is_none());

    emitter.request(FleetCommand::AbortAll);
    assert!(matches!(
        emitter.resolve_confirmation(true),
        Some(CommandOutcome::Dispatched { .. })
    ));
    emitter.request(FleetCommand::Vehicle(vid(2), VehicleCommand::Recall));

    assert_eq!(sink_rx.recv().await.as_deref(), Some("Aborting all missions..."));
    assert_eq!(sink_rx.recv().await.as_deref(), Some("Recalling Coug 2..."));
    for _ in 0..2 {
        assert!(receipt_rx.recv().await.unwrap().result.is_ok());
    }

    cancel.cancel();
    let stats = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stats.delivered, 2);
    assert_eq!(stats.abandoned, 0);
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_config_file_round_trip_and_validation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fleet_config.toml");

    let mut config = FleetConfig::default();
    config.fleet.vehicle_count = 5;
    config.view.tick_interval_ms = 250;
    config.save_to_file(&path).unwrap();

    let loaded = FleetConfig::load_from_file(&path).unwrap();
    assert_eq!(loaded, config);
    assert_eq!(loaded.vehicles().count(), 5);
    assert_eq!(loaded.view.tick_interval(), Duration::from_millis(250));

    std::fs::write(&path, "[fleet]\nvehicle_count = 0\n").unwrap();
    let bad = FleetConfig::load_from_file(&path).unwrap();
    assert!(bad.validate().is_err());
}
