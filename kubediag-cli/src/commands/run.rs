//! Run command - drive abnormals from JSON manifests through a standalone
//! agent.
//!
//! The store lives in memory and is seeded from the manifest directory.
//! External processors are contacted over HTTP as in a cluster. The command
//! stops when every abnormal is finished, on timeout, or on Ctrl-C, then
//! prints where each abnormal ended up.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use kubediag::agent::{Agent, AgentConfig, AgentError, AgentMetrics};
use kubediag::api::Abnormal;
use kubediag::engine::{
    Event, EventSink, MemoryEventSink, MultiplexEventSink, StageMetricsSnapshot, TracingEventSink,
};
use kubediag::processor::ProcessorClient;
use kubediag::store::manifest::load_dir;
use kubediag::store::{InMemoryStore, ResourceStore};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::CliError;
use crate::runner::CliRunner;

/// Default limit on how long a run may take.
pub const DEFAULT_RUN_TIMEOUT_SECS: u64 = 300;

/// Arguments for the run command.
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Directory of JSON manifests holding abnormals and processors
    #[arg(long)]
    pub manifests: PathBuf,

    /// Node this agent serves (overrides config and NODE_NAME)
    #[arg(long)]
    pub node_name: Option<String>,

    /// Stop after this many seconds even if abnormals are unfinished
    #[arg(long, default_value_t = DEFAULT_RUN_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    /// Serve the processor inspection endpoint on the configured address
    #[arg(long)]
    pub serve: bool,
}

/// Why the run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Finished,
    TimedOut,
    Interrupted,
    AgentStopped,
}

/// Run the run command.
pub fn run(args: RunArgs, runner: &CliRunner) -> Result<(), CliError> {
    runner.log_startup("run");

    let manifests = load_dir(&args.manifests)?;
    if manifests.abnormals.is_empty() {
        return Err(CliError::Config(format!(
            "no abnormals found in {}",
            args.manifests.display()
        )));
    }
    info!(
        abnormals = manifests.abnormals.len(),
        processors = manifests.processors.len(),
        "Manifests loaded"
    );

    let store = Arc::new(InMemoryStore::new());
    manifests.seed(&store)?;

    let mut file = runner.config().clone();
    if let Some(node_name) = args.node_name {
        file.agent.node_name = Some(node_name);
    }
    let mut config = AgentConfig::from_config_file(&file)?;
    if !args.serve {
        config = config.with_bind_address(None);
    }

    let events = Arc::new(MemoryEventSink::new());
    let sink = Arc::new(MultiplexEventSink::new(vec![
        Arc::clone(&events) as Arc<dyn EventSink>,
        Arc::new(TracingEventSink) as Arc<dyn EventSink>,
    ]));
    let transport = Arc::new(ProcessorClient::new().map_err(AgentError::from)?);
    let agent = Agent::with_transport(config, Arc::clone(&store), transport, sink);
    let metrics = agent.metrics();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    println!(
        "Processing {} abnormal(s) as node {}...",
        store.abnormal_count(),
        agent.node_name()
    );
    let timeout = Duration::from_secs(args.timeout_secs);
    let reason = runtime.block_on(drive(agent, Arc::clone(&store), timeout))?;
    let abnormals = runtime
        .block_on(store.list_abnormals())
        .map_err(|e| CliError::Config(e.to_string()))?;

    match reason {
        StopReason::Finished => println!("All abnormals finished."),
        StopReason::TimedOut => {
            println!("Timed out after {}s, some abnormals are unfinished.", args.timeout_secs)
        }
        StopReason::Interrupted => println!("Interrupted."),
        StopReason::AgentStopped => println!("Agent stopped unexpectedly."),
    }
    print_report(&abnormals, &events.events(), &metrics);
    Ok(())
}

/// Runs the agent until the store settles, the timeout expires, or Ctrl-C.
async fn drive(
    agent: Agent<InMemoryStore, ProcessorClient>,
    store: Arc<InMemoryStore>,
    timeout: Duration,
) -> Result<StopReason, CliError> {
    let mut watch = store.watch_abnormals();
    let shutdown = CancellationToken::new();
    let mut handle = tokio::spawn(agent.run(shutdown.clone()));

    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    let reason = loop {
        if all_finished(&store).await {
            break StopReason::Finished;
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => break StopReason::Interrupted,
            _ = &mut deadline => break StopReason::TimedOut,
            result = &mut handle => return agent_exit(result),
            event = watch.recv() => match event {
                Ok(_) => {}
                Err(RecvError::Lagged(missed)) => warn!(missed, "Missed store events"),
                Err(RecvError::Closed) => break StopReason::AgentStopped,
            },
        }
    };

    shutdown.cancel();
    agent_exit(handle.await)?;
    Ok(reason)
}

fn agent_exit(result: Result<Result<(), AgentError>, JoinError>) -> Result<StopReason, CliError> {
    match result {
        Ok(Ok(())) => Ok(StopReason::AgentStopped),
        Ok(Err(e)) => Err(CliError::Agent(e)),
        Err(e) => Err(CliError::Runtime(std::io::Error::other(e.to_string()))),
    }
}

async fn all_finished(store: &InMemoryStore) -> bool {
    match store.list_abnormals().await {
        Ok(abnormals) => abnormals.iter().all(Abnormal::is_finished),
        Err(_) => false,
    }
}

// =============================================================================
// Report
// =============================================================================

fn print_report(abnormals: &[Abnormal], events: &[Event], metrics: &AgentMetrics) {
    println!();
    println!("Abnormals");
    println!("=========");
    for abnormal in abnormals {
        println!("  {}", abnormal_line(abnormal));
    }

    println!();
    println!("Events");
    println!("======");
    for event in events {
        println!("  {}", event_line(event));
    }

    println!();
    println!("Stage counters");
    println!("==============");
    for (stage, snapshot) in metrics.snapshot() {
        println!("  {:<24} {}", stage.name(), counters_line(&snapshot));
    }
}

fn abnormal_line(abnormal: &Abnormal) -> String {
    let phase = abnormal
        .phase()
        .map(|p| p.as_str())
        .unwrap_or("Pending");
    let mut line = format!("{:<40} {:<22}", abnormal.key().to_string(), phase);
    if let Some(diagnoser) = &abnormal.status.diagnoser {
        line.push_str(&format!(" diagnoser={}", diagnoser));
    }
    if let Some(recoverer) = &abnormal.status.recoverer {
        line.push_str(&format!(" recoverer={}", recoverer));
    }
    if !abnormal.status.message.is_empty() {
        line.push_str(&format!(" message={:?}", abnormal.status.message));
    }
    line.trim_end().to_string()
}

fn event_line(event: &Event) -> String {
    format!(
        "{} {:<7} {} {}: {}",
        event.timestamp.format("%H:%M:%S"),
        event.event_type,
        event.involved_object,
        event.reason,
        event.message
    )
}

fn counters_line(s: &StageMetricsSnapshot) -> String {
    format!(
        "success={} skip={} fail={} error={} commands={}/{} profilers={}/{}",
        s.sync_success,
        s.sync_skip,
        s.sync_fail,
        s.sync_error,
        s.command_executor_success,
        s.command_executor_success + s.command_executor_fail,
        s.profiler_success,
        s.profiler_success + s.profiler_fail,
    )
}
