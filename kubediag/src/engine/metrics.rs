//! Per-stage counters.
//!
//! Counters are observational only; nothing reads them to make decisions.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::embedded::EmbeddedOutcome;

/// Counters of one stage engine.
#[derive(Debug, Default)]
pub struct StageMetrics {
    sync_success: AtomicU64,
    sync_skip: AtomicU64,
    sync_fail: AtomicU64,
    sync_error: AtomicU64,
    command_executor_success: AtomicU64,
    command_executor_fail: AtomicU64,
    profiler_success: AtomicU64,
    profiler_fail: AtomicU64,
}

/// Point-in-time copy of [`StageMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StageMetricsSnapshot {
    /// Syncs that reached a terminal outcome for the stage.
    pub sync_success: u64,
    /// Syncs resolved without contacting any processor.
    pub sync_skip: u64,
    /// Syncs that exhausted every processor.
    pub sync_fail: u64,
    /// Syncs interrupted by a store error and requeued.
    pub sync_error: u64,
    pub command_executor_success: u64,
    pub command_executor_fail: u64,
    pub profiler_success: u64,
    pub profiler_fail: u64,
}

impl StageMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sync_succeeded(&self) {
        self.sync_success.fetch_add(1, Ordering::Relaxed);
    }

    pub fn sync_skipped(&self) {
        self.sync_skip.fetch_add(1, Ordering::Relaxed);
    }

    pub fn sync_failed(&self) {
        self.sync_fail.fetch_add(1, Ordering::Relaxed);
    }

    pub fn sync_errored(&self) {
        self.sync_error.fetch_add(1, Ordering::Relaxed);
    }

    /// Adds the tallies of one embedded run.
    pub fn record_embedded(&self, outcome: &EmbeddedOutcome) {
        self.command_executor_success
            .fetch_add(outcome.commands_succeeded, Ordering::Relaxed);
        self.command_executor_fail
            .fetch_add(outcome.commands_failed, Ordering::Relaxed);
        self.profiler_success
            .fetch_add(outcome.profilers_succeeded, Ordering::Relaxed);
        self.profiler_fail
            .fetch_add(outcome.profilers_failed, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StageMetricsSnapshot {
        StageMetricsSnapshot {
            sync_success: self.sync_success.load(Ordering::Relaxed),
            sync_skip: self.sync_skip.load(Ordering::Relaxed),
            sync_fail: self.sync_fail.load(Ordering::Relaxed),
            sync_error: self.sync_error.load(Ordering::Relaxed),
            command_executor_success: self.command_executor_success.load(Ordering::Relaxed),
            command_executor_fail: self.command_executor_fail.load(Ordering::Relaxed),
            profiler_success: self.profiler_success.load(Ordering::Relaxed),
            profiler_fail: self.profiler_fail.load(Ordering::Relaxed),
        }
    }
}
