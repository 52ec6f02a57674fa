//! Profilers.

use super::{EmbeddedError, ProfilerRunner, RunFuture};
use crate::api::{Abnormal, ProfilerSpec, ProfilerStatus};

const PROFILERS_DISABLED: &str = "profiler support is disabled on this agent";

/// Records every profiler as not run.
///
/// Agents without profiling tooling installed use this runner so that
/// profiler requests still leave a result entry behind.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledProfilerRunner;

impl ProfilerRunner for DisabledProfilerRunner {
    fn run<'a>(&'a self, spec: &'a ProfilerSpec, _abnormal: &'a Abnormal) -> RunFuture<'a, ProfilerStatus> {
        Box::pin(async move {
            let status = ProfilerStatus {
                name: spec.name.clone(),
                processor_type: spec.processor_type,
                go: None,
                java: None,
                expired: false,
                error: PROFILERS_DISABLED.to_string(),
            };
            (status, Err(EmbeddedError::Disabled(PROFILERS_DISABLED)))
        })
    }
}
