//! Command executors.

use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;
use tracing::trace;

use super::{CommandRunner, EmbeddedError, RunFuture};
use crate::api::{Abnormal, CommandExecutorSpec, CommandExecutorStatus};
use crate::processor::effective_timeout;

/// Runs commands as child processes of the agent.
///
/// The child is killed when its timeout (default 30 seconds, at least one
/// second) expires. A non-zero exit status is a failure; stdout and stderr
/// are recorded either way.
#[derive(Debug, Clone, Default)]
pub struct LocalCommandRunner {
    working_dir: Option<PathBuf>,
}

impl LocalCommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs every command from `dir`.
    pub fn with_working_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: Some(dir.into()),
        }
    }

    async fn execute(&self, spec: &CommandExecutorSpec) -> (String, String, Result<(), EmbeddedError>) {
        let Some((program, args)) = spec.command.split_first() else {
            return (String::new(), String::new(), Err(EmbeddedError::EmptyCommand));
        };

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let timeout = effective_timeout(spec.timeout_seconds);
        trace!(program = %program, timeout_secs = timeout.as_secs(), "Running command");

        let output = match tokio::time::timeout(timeout, command.output()).await {
            Err(_) => return (String::new(), String::new(), Err(EmbeddedError::Timeout(timeout))),
            Ok(Err(e)) => {
                let err = EmbeddedError::Spawn {
                    program: program.clone(),
                    message: e.to_string(),
                };
                return (String::new(), String::new(), Err(err));
            }
            Ok(Ok(output)) => output,
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let result = if output.status.success() {
            Ok(())
        } else {
            Err(EmbeddedError::Exit {
                code: output.status.code(),
            })
        };
        (stdout, stderr, result)
    }
}

impl CommandRunner for LocalCommandRunner {
    fn run<'a>(
        &'a self,
        spec: &'a CommandExecutorSpec,
        _abnormal: &'a Abnormal,
    ) -> RunFuture<'a, CommandExecutorStatus> {
        Box::pin(async move {
            let (stdout, stderr, result) = self.execute(spec).await;
            let status = CommandExecutorStatus {
                command: spec.command.clone(),
                processor_type: spec.processor_type,
                stdout,
                stderr,
                error: result.as_ref().err().map(ToString::to_string).unwrap_or_default(),
            };
            (status, result)
        })
    }
}

/// Records every command as not run.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledCommandRunner;

const COMMANDS_DISABLED: &str = "command executor support is disabled on this agent";

impl CommandRunner for DisabledCommandRunner {
    fn run<'a>(
        &'a self,
        spec: &'a CommandExecutorSpec,
        _abnormal: &'a Abnormal,
    ) -> RunFuture<'a, CommandExecutorStatus> {
        Box::pin(async move {
            let status = CommandExecutorStatus {
                command: spec.command.clone(),
                processor_type: spec.processor_type,
                stdout: String::new(),
                stderr: String::new(),
                error: COMMANDS_DISABLED.to_string(),
            };
            (status, Err(EmbeddedError::Disabled(COMMANDS_DISABLED)))
        })
    }
}
