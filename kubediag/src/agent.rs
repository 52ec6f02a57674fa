//! Agent assembly: one router, three stage engines, one inspection server.
//!
//! ```text
//! ┌──────────────────────────────── Agent ───────────────────────────────┐
//! │                                                                      │
//! │  PhaseRouter ──► StageQueue ──► StageEngine (InformationCollecting)  │
//! │       │      ──► StageQueue ──► StageEngine (Diagnosing)             │
//! │       │      ──► StageQueue ──► StageEngine (Recovering)             │
//! │       │                              │                               │
//! │       └───────── ResourceStore ◄─────┘          inspection server    │
//! │                                                                      │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every task shares one [`CancellationToken`]; [`Agent::run`] returns once
//! all of them have stopped.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{ConfigFile, NODE_NAME_ENV};
use crate::embedded::{
    CommandRunner, DisabledCommandRunner, DisabledProfilerRunner, EmbeddedProcessors,
    LocalCommandRunner,
};
use crate::engine::{
    serve_inspection, EventSink, PhaseRouter, Stage, StageEngine, StageEngineConfig, StageMetrics,
    StageMetricsSnapshot, TracingEventSink,
};
use crate::processor::{ProcessorClient, ProcessorError, ProcessorTransport};
use crate::queue::{DEFAULT_CHANNEL_CAPACITY, DEFAULT_RETRY_DELAY};
use crate::store::ResourceStore;

/// Errors raised while assembling or starting an agent.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("no node name configured; set [agent] node_name or the {} environment variable", NODE_NAME_ENV)]
    MissingNodeName,

    #[error("failed to create processor client: {0}")]
    Client(#[from] ProcessorError),

    #[error("failed to bind inspection server on {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: io::Error,
    },
}

// =============================================================================
// Configuration
// =============================================================================

/// Settings of one agent.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub node_name: String,
    /// Inspection endpoint address; `None` disables the server.
    pub bind_address: Option<SocketAddr>,
    pub channel_capacity: usize,
    pub retry_delay: Duration,
    pub command_executor: bool,
    pub profiler: bool,
    /// Working directory of embedded command executors, used when it exists.
    pub data_root: Option<PathBuf>,
}

impl AgentConfig {
    /// Defaults for `node_name` with the inspection server disabled.
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
            bind_address: None,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            retry_delay: DEFAULT_RETRY_DELAY,
            command_executor: true,
            profiler: false,
            data_root: None,
        }
    }

    /// Builds the config from the INI settings.
    ///
    /// The node name falls back to the `NODE_NAME` environment variable.
    pub fn from_config_file(file: &ConfigFile) -> Result<Self, AgentError> {
        let node_name = file
            .agent
            .node_name
            .clone()
            .or_else(|| std::env::var(NODE_NAME_ENV).ok())
            .filter(|name| !name.trim().is_empty())
            .ok_or(AgentError::MissingNodeName)?;

        Ok(Self {
            node_name,
            bind_address: Some(file.agent.bind_address),
            channel_capacity: file.engine.channel_capacity,
            retry_delay: Duration::from_secs(file.engine.retry_delay_secs),
            command_executor: file.embedded.command_executor,
            profiler: file.embedded.profiler,
            data_root: Some(file.embedded.data_root.clone()),
        })
    }

    pub fn with_bind_address(mut self, address: Option<SocketAddr>) -> Self {
        self.bind_address = address;
        self
    }

    fn engine_config(&self) -> StageEngineConfig {
        StageEngineConfig {
            node_name: self.node_name.clone(),
            channel_capacity: self.channel_capacity,
            retry_delay: self.retry_delay,
        }
    }

    fn embedded_processors(&self) -> EmbeddedProcessors {
        let commands: Arc<dyn CommandRunner> = if self.command_executor {
            match self.data_root.as_ref().filter(|dir| dir.is_dir()) {
                Some(dir) => Arc::new(LocalCommandRunner::with_working_dir(dir.clone())),
                None => Arc::new(LocalCommandRunner::new()),
            }
        } else {
            Arc::new(DisabledCommandRunner)
        };

        if self.profiler {
            warn!("Profiler support requested but no profiler backend is available");
        }

        EmbeddedProcessors::new(commands, Arc::new(DisabledProfilerRunner))
    }
}

// =============================================================================
// Metrics
// =============================================================================

/// Shared handles to the counters of every stage engine.
#[derive(Debug, Clone, Default)]
pub struct AgentMetrics {
    stages: Vec<(Stage, Arc<StageMetrics>)>,
}

impl AgentMetrics {
    /// Current counters, in pipeline order.
    pub fn snapshot(&self) -> Vec<(Stage, StageMetricsSnapshot)> {
        self.stages
            .iter()
            .map(|(stage, metrics)| (*stage, metrics.snapshot()))
            .collect()
    }

    pub fn stage(&self, stage: Stage) -> Option<StageMetricsSnapshot> {
        self.stages
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, metrics)| metrics.snapshot())
    }
}

// =============================================================================
// Agent
// =============================================================================

/// A fully wired abnormal processing agent.
pub struct Agent<S, T> {
    config: AgentConfig,
    store: Arc<S>,
    router: PhaseRouter<S>,
    engines: Vec<StageEngine<S, T>>,
    metrics: AgentMetrics,
}

impl<S: ResourceStore> Agent<S, ProcessorClient> {
    /// Creates an agent dispatching to processors over HTTP.
    pub fn new(config: AgentConfig, store: Arc<S>) -> Result<Self, AgentError> {
        let transport = Arc::new(ProcessorClient::new()?);
        Ok(Self::with_transport(config, store, transport, Arc::new(TracingEventSink)))
    }
}

impl<S, T> Agent<S, T>
where
    S: ResourceStore,
    T: ProcessorTransport,
{
    /// Creates an agent with a custom transport and event sink.
    pub fn with_transport(
        config: AgentConfig,
        store: Arc<S>,
        transport: Arc<T>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let embedded = config.embedded_processors();
        let mut router = PhaseRouter::with_events(Arc::clone(&store), Arc::clone(&events));
        let mut engines = Vec::with_capacity(Stage::ALL.len());
        let mut metrics = AgentMetrics::default();

        for stage in Stage::ALL {
            let (engine, queue) = StageEngine::with_events(
                stage,
                config.engine_config(),
                Arc::clone(&store),
                Arc::clone(&transport),
                embedded.clone(),
                Arc::clone(&events),
            );
            router.register(stage, queue);
            metrics.stages.push((stage, engine.metrics()));
            engines.push(engine);
        }

        Self {
            config,
            store,
            router,
            engines,
            metrics,
        }
    }

    pub fn node_name(&self) -> &str {
        &self.config.node_name
    }

    /// Counter handles that stay valid after [`Agent::run`] consumes the agent.
    pub fn metrics(&self) -> AgentMetrics {
        self.metrics.clone()
    }

    /// Runs every component until `shutdown` fires.
    ///
    /// Fails only if the inspection server cannot bind.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), AgentError> {
        let Self {
            config,
            store,
            router,
            engines,
            ..
        } = self;

        let listener = match config.bind_address {
            Some(address) => Some(
                TcpListener::bind(address)
                    .await
                    .map_err(|source| AgentError::Bind { address, source })?,
            ),
            None => None,
        };

        info!(node = %config.node_name, "Agent starting");

        let mut tasks = JoinSet::new();
        for engine in engines {
            tasks.spawn(engine.run(shutdown.clone()));
        }
        tasks.spawn(router.run(shutdown.clone()));

        if let Some(listener) = listener {
            let server_shutdown = shutdown.clone();
            tasks.spawn(async move {
                if let Err(e) = serve_inspection(listener, store, server_shutdown).await {
                    error!(error = %e, "Inspection server failed");
                }
            });
        }

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "Agent task panicked");
            }
        }

        info!("Agent stopped");
        Ok(())
    }
}
