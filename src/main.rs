//! COUGARS Fleet Dashboard
//!
//! Headless fleet-status dashboard: telemetry in, terminal dashboard out,
//! operator commands from the console.
//!
//! # Usage
//!
//! ```bash
//! # Built-in simulator as the telemetry source
//! cargo run --release
//!
//! # Telemetry piped in on stdin
//! ./telemetry-sim --seed 7 | ./cougars-dashboard --stdin
//!
//! # Telemetry and commands over TCP
//! ./cougars-dashboard --telemetry-tcp base:7000 --command-tcp base:7001
//! ```
//!
//! # Environment Variables
//!
//! - `COUGARS_CONFIG`: Path to the fleet config TOML
//! - `RUST_LOG`: Logging level (default: info). Logs go to stderr.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use cougars_dashboard::command::{
    CommandDispatcher, CommandEmitter, CommandReceipt, CommandSink, LogSink, OutboundCommand,
    TcpCommandSink,
};
use cougars_dashboard::config::{defaults, FleetConfig};
use cougars_dashboard::console::{self, UiAction};
use cougars_dashboard::fleet::{ingest, FleetStatusStore, IngestSender, StoreReader};
use cougars_dashboard::pipeline::{run_source, ProcessingLoop};
use cougars_dashboard::telemetry::{
    LinkState, SimulatedSource, StdinSource, TcpSource, TelemetrySimulator, TelemetrySource,
};
use cougars_dashboard::view::{RenderLoop, RenderLoopStats, TerminalSurface, ViewSynchronizer};

/// Extra time the supervisor grants background tasks beyond the command
/// drain timeout before aborting them.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Capacity of the console action channel.
const ACTION_QUEUE_CAPACITY: usize = 16;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "cougars-dashboard")]
#[command(about = "COUGARS fleet status dashboard and command bridge")]
#[command(version)]
struct CliArgs {
    /// Read telemetry lines from stdin (console commands are disabled)
    /// Use with the simulator: telemetry-sim | cougars-dashboard --stdin
    #[arg(long, conflicts_with = "telemetry_tcp")]
    stdin: bool,

    /// Read telemetry lines from a TCP endpoint
    #[arg(long, value_name = "HOST:PORT")]
    telemetry_tcp: Option<String>,

    /// Send command strings to a TCP endpoint instead of the log
    #[arg(long, value_name = "HOST:PORT")]
    command_tcp: Option<String>,

    /// Fleet config file (overrides COUGARS_CONFIG and ./fleet_config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Override fleet.vehicle_count
    #[arg(long)]
    vehicles: Option<u8>,

    /// Override view.tick_interval_ms
    #[arg(long, value_name = "MS")]
    tick_ms: Option<u64>,

    /// Seed for the built-in simulator
    #[arg(long)]
    seed: Option<u64>,

    /// Emit logs as JSON
    #[arg(long, env = "COUGARS_LOG_JSON")]
    log_json: bool,

    /// Write the effective configuration to PATH and exit
    #[arg(long, value_name = "PATH")]
    write_config: Option<PathBuf>,
}

// ============================================================================
// Task Names for Supervisor Logging
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum TaskName {
    ProcessingLoop,
    TelemetrySource,
    CommandDispatcher,
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskName::ProcessingLoop => write!(f, "ProcessingLoop"),
            TaskName::TelemetrySource => write!(f, "TelemetrySource"),
            TaskName::CommandDispatcher => write!(f, "CommandDispatcher"),
        }
    }
}

// ============================================================================
// Setup
// ============================================================================

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(args: &CliArgs) -> Result<FleetConfig> {
    let mut config = match &args.config {
        Some(path) => FleetConfig::load_from_file(path)
            .with_context(|| format!("loading fleet config {}", path.display()))?,
        None => FleetConfig::load().context("loading fleet config")?,
    };
    if let Some(vehicles) = args.vehicles {
        config.fleet.vehicle_count = vehicles;
    }
    if let Some(tick_ms) = args.tick_ms {
        config.view.tick_interval_ms = tick_ms;
    }
    config.validate().context("invalid fleet configuration")?;
    Ok(config)
}

// ============================================================================
// Task Spawning
// ============================================================================

/// Spawn the source pump for whichever telemetry input was selected.
///
/// Returns the link watch when the source is a TCP endpoint.
fn spawn_telemetry_source(
    task_set: &mut JoinSet<Result<TaskName>>,
    args: &CliArgs,
    config: &FleetConfig,
    sender: IngestSender,
    cancel_token: CancellationToken,
) -> Option<LinkWatch> {
    if let Some(addr) = &args.telemetry_tcp {
        info!("📥 Telemetry: TCP ({})", addr);
        let (link_tx, link_rx) = watch::channel(LinkState::Connecting);
        let source = TcpSource::new(addr.clone()).with_link_state(link_tx);
        spawn_pump(task_set, source, sender, cancel_token);
        return Some((addr.clone(), link_rx));
    }

    if args.stdin {
        info!("📥 Telemetry: stdin (JSON lines or \"N: text\")");
        spawn_pump(task_set, StdinSource::stdin(), sender, cancel_token);
    } else {
        info!("📥 Telemetry: built-in simulator");
        let simulator = TelemetrySimulator::new(config.vehicles(), &config.fleet.channels, args.seed);
        let source = SimulatedSource::new(
            simulator,
            Duration::from_millis(defaults::SIMULATION_FRAME_INTERVAL_MS),
        );
        spawn_pump(task_set, source, sender, cancel_token);
    }
    None
}

/// A failing source is logged and retired; the dashboard keeps showing the
/// last accepted state.
fn spawn_pump<S: TelemetrySource>(
    task_set: &mut JoinSet<Result<TaskName>>,
    mut source: S,
    sender: IngestSender,
    cancel_token: CancellationToken,
) {
    task_set.spawn(async move {
        if let Err(e) = run_source(&mut source, sender, cancel_token).await {
            error!(source = source.source_name(), "Telemetry source stopped: {:#}", e);
        }
        Ok(TaskName::TelemetrySource)
    });
}

fn spawn_dispatcher<S: CommandSink>(
    task_set: &mut JoinSet<Result<TaskName>>,
    sink: S,
    inbound: mpsc::Receiver<OutboundCommand>,
    receipts: mpsc::UnboundedSender<CommandReceipt>,
    config: &FleetConfig,
    cancel_token: CancellationToken,
) {
    info!("📤 Commands: {} sink", sink.sink_name());
    let dispatcher = CommandDispatcher::new(inbound, sink, receipts, cancel_token, &config.commands);
    task_set.spawn(async move {
        dispatcher.run().await;
        Ok(TaskName::CommandDispatcher)
    });
}

/// Telemetry endpoint address and its link state.
type LinkWatch = (String, watch::Receiver<LinkState>);

/// Inputs the render context takes ownership of.
struct RenderContext {
    reader: StoreReader,
    changed: watch::Receiver<u64>,
    actions: mpsc::Receiver<UiAction>,
    receipts: mpsc::UnboundedReceiver<CommandReceipt>,
    outbound: mpsc::Sender<OutboundCommand>,
    link: Option<LinkWatch>,
}

/// Start the render context: its own OS thread with a single-threaded runtime.
fn spawn_render_thread(
    ctx: RenderContext,
    config: &FleetConfig,
    cancel_token: CancellationToken,
) -> Result<thread::JoinHandle<Result<RenderLoopStats>>> {
    let vehicles: Vec<_> = config.vehicles().collect();
    let channels = config.fleet.channels.clone();
    let tick_interval = config.view.tick_interval();

    let handle = thread::Builder::new()
        .name("render".to_string())
        .spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .context("building render runtime")?;

            let surface = TerminalSurface::stdout(&vehicles, &channels)
                .with_clear_screen(std::io::stdout().is_terminal());
            let mut render_loop = RenderLoop::new(
                ViewSynchronizer::new(ctx.reader),
                surface,
                CommandEmitter::new(ctx.outbound),
                ctx.changed,
                ctx.actions,
                ctx.receipts,
                tick_interval,
                cancel_token,
            );
            if let Some((addr, state)) = ctx.link {
                render_loop = render_loop.with_link_state(addr, state);
            }
            let (stats, _surface) = runtime.block_on(render_loop.run());
            Ok(stats)
        })
        .context("spawning render thread")?;
    Ok(handle)
}

// ============================================================================
// Supervisor
// ============================================================================

/// Monitor tasks until shutdown is requested or a task fails.
async fn run_supervisor(task_set: &mut JoinSet<Result<TaskName>>, cancel_token: CancellationToken) -> Result<()> {
    info!("🔒 Supervisor: All tasks spawned, monitoring...");

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                info!("🛑 Supervisor: Shutdown signal received");
                break;
            }
            result = task_set.join_next() => {
                match result {
                    Some(Ok(Ok(task_name))) => {
                        info!("🔒 Supervisor: Task {} completed normally", task_name);
                    }
                    Some(Ok(Err(e))) => {
                        error!("🔒 Supervisor: Task failed with error: {:#}", e);
                        cancel_token.cancel();
                        return Err(e);
                    }
                    Some(Err(e)) => {
                        error!("🔒 Supervisor: Task panicked: {}", e);
                        cancel_token.cancel();
                        return Err(anyhow::anyhow!("Task panicked: {}", e));
                    }
                    None => {
                        info!("🔒 Supervisor: All background tasks completed");
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}

/// Give remaining tasks until `timeout` to finish, then abort them.
async fn join_remaining(task_set: &mut JoinSet<Result<TaskName>>, timeout: Duration) {
    let deadline = tokio::time::Instant::now() + timeout;
    while let Ok(Some(result)) = tokio::time::timeout_at(deadline, task_set.join_next()).await {
        match result {
            Ok(Ok(task_name)) => info!("🔒 Supervisor: Task {} stopped", task_name),
            Ok(Err(e)) => warn!("🔒 Supervisor: Task failed during shutdown: {:#}", e),
            Err(e) => warn!("🔒 Supervisor: Task panicked during shutdown: {}", e),
        }
    }
    if !task_set.is_empty() {
        warn!(remaining = task_set.len(), "🔒 Supervisor: Aborting tasks that missed the shutdown deadline");
        task_set.abort_all();
    }
}

// ============================================================================
// Dashboard
// ============================================================================

async fn run_dashboard(args: CliArgs, config: FleetConfig) -> Result<()> {
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("🛑 Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    let store = FleetStatusStore::from_config(&config);
    let reader = store.reader();
    let (ingest_tx, ingest_rx) = ingest::channel(config.ingestion.effective_capacity());
    let (changed_tx, changed_rx) = watch::channel(0u64);
    let (outbound_tx, outbound_rx) = mpsc::channel(config.commands.outbound_capacity);
    let (receipt_tx, receipt_rx) = mpsc::unbounded_channel();
    let (action_tx, action_rx) = mpsc::channel(ACTION_QUEUE_CAPACITY);

    info!("🔒 Supervisor: Initializing task monitoring");
    let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();

    // Task 1: Processing loop (sole store writer)
    let proc_cancel = cancel_token.clone();
    task_set.spawn(async move {
        ProcessingLoop::new(store, ingest_rx, changed_tx, proc_cancel).run().await;
        Ok(TaskName::ProcessingLoop)
    });

    // Task 2: Telemetry source pump
    let link = spawn_telemetry_source(&mut task_set, &args, &config, ingest_tx, cancel_token.clone());

    // Task 3: Command dispatcher
    match &args.command_tcp {
        Some(addr) => spawn_dispatcher(
            &mut task_set,
            TcpCommandSink::new(addr.clone()),
            outbound_rx,
            receipt_tx,
            &config,
            cancel_token.clone(),
        ),
        None => spawn_dispatcher(
            &mut task_set,
            LogSink::new(),
            outbound_rx,
            receipt_tx,
            &config,
            cancel_token.clone(),
        ),
    }

    // Console input shares stdin with the telemetry source, so only one runs
    if args.stdin {
        drop(action_tx);
    } else {
        console::spawn_stdin_reader(config.fleet.vehicle_count, action_tx)
            .context("spawning console reader")?;
        info!("⌨️  {}", console::HELP_TEXT);
    }

    let render = spawn_render_thread(
        RenderContext {
            reader,
            changed: changed_rx,
            actions: action_rx,
            receipts: receipt_rx,
            outbound: outbound_tx,
            link,
        },
        &config,
        cancel_token.clone(),
    )?;

    let result = run_supervisor(&mut task_set, cancel_token.clone()).await;

    cancel_token.cancel();
    join_remaining(&mut task_set, config.commands.drain_timeout() + SHUTDOWN_GRACE).await;

    match tokio::task::spawn_blocking(move || render.join()).await {
        Ok(Ok(Ok(stats))) => info!(
            ticks = stats.ticks,
            instructions = stats.instructions,
            commands = stats.commands_requested,
            "Render context stopped"
        ),
        Ok(Ok(Err(e))) => warn!("Render context failed: {:#}", e),
        Ok(Err(_)) | Err(_) => warn!("Render thread panicked"),
    }

    result
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_logging(args.log_json);

    let config = load_config(&args)?;

    if let Some(path) = &args.write_config {
        config
            .save_to_file(path)
            .with_context(|| format!("writing config to {}", path.display()))?;
        info!("Wrote effective configuration to {}", path.display());
        return Ok(());
    }

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  COUGARS Fleet Dashboard");
    info!(
        "  Fleet: {} Cougs | {} channels | tick {} ms",
        config.fleet.vehicle_count,
        config.fleet.channels.len(),
        config.view.tick_interval_ms
    );
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // Background context: telemetry, processing loop, command dispatch
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("bridge-bg")
        .build()
        .context("building background runtime")?;
    let result = runtime.block_on(run_dashboard(args, config));

    // A blocked stdin read must not hold the process open
    runtime.shutdown_timeout(SHUTDOWN_GRACE);

    info!("✅ Shutdown complete");
    result
}
