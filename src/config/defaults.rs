//! System-wide default constants.
//!
//! Centralises magic numbers used by the bridge. Grouped by subsystem for
//! easy discovery.

// ============================================================================
// Fleet
// ============================================================================

/// Number of vehicles monitored when no config says otherwise.
pub const DEFAULT_VEHICLE_COUNT: u8 = 3;

// ============================================================================
// Ingestion
// ============================================================================

/// Bounded ingestion queue capacity (events).
pub const INGESTION_QUEUE_CAPACITY: usize = 256;

// ============================================================================
// View
// ============================================================================

/// Redraw tick of the view synchronizer (ms).
pub const VIEW_TICK_INTERVAL_MS: u64 = 100;

/// Initial text of the confirmation/rejection region.
pub const NOTICE_PLACEHOLDER: &str =
    "Confirmation/Rejection messages from command buttons will appear here";

// ============================================================================
// Commands
// ============================================================================

/// Outbound command queue capacity. Emission fails fast when it is full.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 32;

/// Upper bound on draining in-flight commands at shutdown (ms).
pub const SHUTDOWN_DRAIN_TIMEOUT_MS: u64 = 2_000;

/// Per-command delivery timeout for the command sink (ms).
pub const COMMAND_SEND_TIMEOUT_MS: u64 = 5_000;

// ============================================================================
// Telemetry TCP client
// ============================================================================

/// Connect timeout for telemetry and command TCP endpoints (seconds).
pub const TCP_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Read timeout per telemetry line before a reconnect is attempted (seconds).
pub const TELEMETRY_READ_TIMEOUT_SECS: u64 = 120;

/// Maximum reconnection attempts before the telemetry source gives up.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 10;

/// Initial reconnection delay, doubled each attempt (seconds).
pub const INITIAL_RECONNECT_DELAY_SECS: u64 = 1;

/// Reconnection delay cap (seconds).
pub const MAX_RECONNECT_DELAY_SECS: u64 = 30;

// ============================================================================
// Simulation
// ============================================================================

/// Interval between simulated telemetry frames (ms).
pub const SIMULATION_FRAME_INTERVAL_MS: u64 = 1_000;
