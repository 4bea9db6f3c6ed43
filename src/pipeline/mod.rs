//! Background telemetry pipeline
//!
//! ```text
//! TelemetrySource ──run_source──▶ IngestSender ══ queue ══▶ IngestReceiver
//!                                                               │
//!                                   ProcessingLoop ◀────────────┘
//!                                        │ apply_batch
//!                                        ▼
//!                               FleetStatusStore ──watch(generation)──▶ view
//! ```
//!
//! Sources may be many; the processing loop is the only store writer.

pub mod processing_loop;
pub mod pump;

pub use processing_loop::{BridgeStats, ProcessingLoop};
pub use pump::run_source;
