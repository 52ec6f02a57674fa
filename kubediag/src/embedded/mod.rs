//! Embedded processors run inside the agent process.
//!
//! An abnormal may carry command executors and profilers tagged with the
//! stage that should run them. The stage engine runs the ones matching its
//! tag before it contacts any external processor. Every run appends exactly
//! one result entry to the status, whether it succeeded or not; a failure is
//! recorded in the entry's `error` field and never stops the stage.
//!
//! ```text
//!   spec.commandExecutors ─filter(type)─► CommandRunner ─► status.commandExecutors
//!   spec.profilers        ─filter(type)─► ProfilerRunner ─► status.profilers
//! ```

mod command;
mod profiler;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::api::{
    Abnormal, CommandExecutorSpec, CommandExecutorStatus, ProcessorType, ProfilerSpec,
    ProfilerStatus,
};

pub use command::{DisabledCommandRunner, LocalCommandRunner};
pub use profiler::DisabledProfilerRunner;

/// Errors from a single embedded processor run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmbeddedError {
    #[error("command must not be empty")]
    EmptyCommand,

    #[error("failed to start {program}: {message}")]
    Spawn { program: String, message: String },

    #[error("command exited with {}", exit_description(*code))]
    Exit { code: Option<i32> },

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Disabled(&'static str),
}

fn exit_description(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit status {}", code),
        None => "no exit status (terminated by signal)".to_string(),
    }
}

/// Boxed future returned by the runner traits.
pub type RunFuture<'a, S> = Pin<Box<dyn Future<Output = (S, Result<(), EmbeddedError>)> + Send + 'a>>;

/// Runs one command executor and reports its result entry.
pub trait CommandRunner: Send + Sync {
    fn run<'a>(&'a self, spec: &'a CommandExecutorSpec, abnormal: &'a Abnormal)
        -> RunFuture<'a, CommandExecutorStatus>;
}

/// Runs one profiler and reports its result entry.
pub trait ProfilerRunner: Send + Sync {
    fn run<'a>(&'a self, spec: &'a ProfilerSpec, abnormal: &'a Abnormal)
        -> RunFuture<'a, ProfilerStatus>;
}

/// Tally of one [`EmbeddedProcessors::run_stage`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmbeddedOutcome {
    pub commands_succeeded: u64,
    pub commands_failed: u64,
    pub profilers_succeeded: u64,
    pub profilers_failed: u64,
}

/// The embedded runners available to every stage engine.
#[derive(Clone)]
pub struct EmbeddedProcessors {
    commands: Arc<dyn CommandRunner>,
    profilers: Arc<dyn ProfilerRunner>,
}

impl EmbeddedProcessors {
    pub fn new(commands: Arc<dyn CommandRunner>, profilers: Arc<dyn ProfilerRunner>) -> Self {
        Self {
            commands,
            profilers,
        }
    }

    /// Both kinds disabled; every run records a "disabled" error.
    pub fn disabled() -> Self {
        Self::new(Arc::new(DisabledCommandRunner), Arc::new(DisabledProfilerRunner))
    }

    /// Runs the command executors, then the profilers, whose type matches
    /// `stage`, appending one result entry per run to `abnormal.status`.
    pub async fn run_stage(&self, stage: ProcessorType, abnormal: &mut Abnormal) -> EmbeddedOutcome {
        let mut outcome = EmbeddedOutcome::default();
        let key = abnormal.key();

        let commands: Vec<CommandExecutorSpec> = abnormal
            .spec
            .command_executors
            .iter()
            .filter(|c| c.processor_type == stage)
            .cloned()
            .collect();
        for spec in &commands {
            let (status, result) = self.commands.run(spec, abnormal).await;
            match result {
                Ok(()) => {
                    outcome.commands_succeeded += 1;
                    debug!(abnormal = %key, command = ?spec.command, "Command executor succeeded");
                }
                Err(e) => {
                    outcome.commands_failed += 1;
                    warn!(abnormal = %key, command = ?spec.command, error = %e, "Command executor failed");
                }
            }
            abnormal.status.command_executors.push(status);
        }

        let profilers: Vec<ProfilerSpec> = abnormal
            .spec
            .profilers
            .iter()
            .filter(|p| p.processor_type == stage)
            .cloned()
            .collect();
        for spec in &profilers {
            let (status, result) = self.profilers.run(spec, abnormal).await;
            match result {
                Ok(()) => {
                    outcome.profilers_succeeded += 1;
                    debug!(abnormal = %key, profiler = %spec.name, "Profiler succeeded");
                }
                Err(e) => {
                    outcome.profilers_failed += 1;
                    warn!(abnormal = %key, profiler = %spec.name, error = %e, "Profiler failed");
                }
            }
            abnormal.status.profilers.push(status);
        }

        outcome
    }
}
