//! Fleet state: the status store and the channel that feeds it
//!
//! ## Architecture
//!
//! - **FleetStatusStore**: authoritative per-vehicle status, published as
//!   immutable snapshots (copy-on-write via `arc-swap`)
//! - **StoreReader**: read-only handle given to the render context
//! - **IngestSender / IngestReceiver**: non-blocking drop-oldest queue from
//!   telemetry producers to the processing loop

pub mod ingest;
pub mod store;

pub use ingest::{IngestReceiver, IngestSender, OfferOutcome};
pub use store::{
    BatchOutcome, FleetStatusSnapshot, FleetStatusStore, InvalidChannelError, StoreReader,
    VehicleMessages,
};
