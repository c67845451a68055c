use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use audio_unlock::config::AppConfig;
use audio_unlock::error::ErrorCode;
use audio_unlock::gesture::{InputEvent, InputEventKind};
use audio_unlock::platform::{AudioPlatform, ContextState, StubCallCounts, StubPlatform, SystemTimeSource};
use audio_unlock::telemetry::{self, UnlockCounters};
use audio_unlock::unlock::{
    AttemptOutcome, AttemptRecord, CoordinatorState, GestureOverride, UnlockCoordinator,
};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

fn main() -> ExitCode {
    let cli = Cli::parse();
    audio_unlock::init_logging(cli.verbose);

    match cli.execute() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("unlock-diag error: {err:?}");
            ExitCode::from(1)
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "unlock-diag", about = "Audio unlock coordinator diagnostics CLI")]
struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn execute(self) -> Result<ExitCode> {
        match self.command {
            Command::Simulate(args) => simulate_command(args),
            Command::Probe(args) => probe_command(args),
            Command::Config(args) => config_command(args),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fan N concurrent callers into one unlock against a scripted platform.
    Simulate(SimulateArgs),
    /// Run one real unlock attempt against the default output device.
    Probe(ProbeArgs),
    /// Print the effective configuration as JSON.
    Config(ConfigArgs),
}

#[derive(Args, Debug, Clone)]
struct SimulateArgs {
    /// Number of concurrent callers requesting an unlock.
    #[arg(long, default_value_t = 3)]
    callers: usize,
    /// Number of resume calls the platform rejects before cooperating.
    #[arg(long, default_value_t = 0)]
    failures: usize,
    /// Emulate a strict platform that ignores resume until primed.
    #[arg(long)]
    ignore_resume: bool,
    /// Latency injected into every resume call (milliseconds).
    #[arg(long, default_value_t = 0)]
    latency_ms: u64,
    /// Configuration file (defaults to assets/unlock_config.json).
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
struct ProbeArgs {
    /// Silent primer hold (milliseconds, clamped to 100-500).
    #[arg(long)]
    hold_ms: Option<u64>,
    /// Configuration file (defaults to assets/unlock_config.json).
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
struct ConfigArgs {
    /// Configuration file to load instead of assets/unlock_config.json.
    #[arg(long)]
    path: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct CallerOutcome {
    caller: usize,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    context_state: Option<ContextState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl CallerOutcome {
    fn new(caller: usize, outcome: &AttemptOutcome) -> Self {
        match outcome {
            Ok(state) => Self {
                caller,
                ok: true,
                context_state: Some(*state),
                error_code: None,
                error: None,
            },
            Err(err) => Self {
                caller,
                ok: false,
                context_state: None,
                error_code: Some(err.code()),
                error: Some(err.message()),
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct SimulationReport {
    callers: usize,
    platform_calls: StubCallCounts,
    outcomes: Vec<CallerOutcome>,
    final_state: CoordinatorState,
    attempts: Vec<AttemptRecord>,
    counters: UnlockCounters,
}

#[derive(Debug, Serialize)]
struct ProbeReport {
    outcome: CallerOutcome,
    final_state: CoordinatorState,
    context_state: Option<ContextState>,
    attempts: Vec<AttemptRecord>,
}

fn load_config(path: Option<&PathBuf>) -> AppConfig {
    match path {
        Some(path) => AppConfig::load_from_file(path),
        None => AppConfig::load(),
    }
}

fn build_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("building tokio runtime")
}

fn exit_code_for(state: CoordinatorState) -> ExitCode {
    if state == CoordinatorState::Initialized {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    }
}

fn simulate_command(args: SimulateArgs) -> Result<ExitCode> {
    let config = load_config(args.config.as_ref());

    let mut platform = StubPlatform::new().with_suspended_context();
    if args.latency_ms > 0 {
        platform = platform.with_latency(Duration::from_millis(args.latency_ms));
    }
    if args.failures > 0 {
        platform.fail_next_resumes(args.failures, "rejected by simulated platform");
    }
    if args.ignore_resume {
        platform.ignore_resume_until_primed();
    }
    let platform = Arc::new(platform);

    let coordinator = UnlockCoordinator::from_app_config(
        &config,
        platform.clone(),
        Arc::new(SystemTimeSource::default()),
    );
    coordinator.mark_app_ready();
    coordinator
        .gestures()
        .record_gesture(&InputEvent::trusted(InputEventKind::PointerDown));

    let runtime = build_runtime()?;
    let outcomes = runtime.block_on(async {
        let calls: Vec<_> = (0..args.callers)
            .map(|_| coordinator.request_unlock())
            .collect();
        futures::future::join_all(calls).await
    });

    let report = SimulationReport {
        callers: args.callers,
        platform_calls: platform.calls(),
        outcomes: outcomes
            .iter()
            .enumerate()
            .map(|(caller, outcome)| CallerOutcome::new(caller, outcome))
            .collect(),
        final_state: coordinator.state(),
        attempts: coordinator.attempts(),
        counters: telemetry::hub().snapshot().counters,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(exit_code_for(report.final_state))
}

#[cfg(not(target_os = "android"))]
fn probe_command(args: ProbeArgs) -> Result<ExitCode> {
    use audio_unlock::platform::CpalPlatform;

    let mut config = load_config(args.config.as_ref());
    if let Some(hold_ms) = args.hold_ms {
        config.executor.silent_hold_ms = hold_ms;
    }

    let platform: Arc<dyn AudioPlatform> =
        Arc::new(CpalPlatform::new(config.executor.primer_amplitude));
    let coordinator =
        UnlockCoordinator::from_app_config(&config, platform, Arc::new(SystemTimeSource::default()));
    coordinator.mark_app_ready();

    let runtime = build_runtime()?;
    let outcome = runtime.block_on(coordinator.request_unlock_with(GestureOverride::UserClick));

    let report = ProbeReport {
        outcome: CallerOutcome::new(0, &outcome),
        final_state: coordinator.state(),
        context_state: coordinator.platform().context_state(),
        attempts: coordinator.attempts(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(exit_code_for(report.final_state))
}

#[cfg(target_os = "android")]
fn probe_command(_args: ProbeArgs) -> Result<ExitCode> {
    anyhow::bail!("probe requires a desktop audio backend")
}

fn config_command(args: ConfigArgs) -> Result<ExitCode> {
    let config = load_config(args.path.as_ref());
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(ExitCode::SUCCESS)
}
