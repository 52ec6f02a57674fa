//! kubediag - abnormal stage processing for cluster nodes
//!
//! An [`Abnormal`](api::Abnormal) describes something wrong on a node or pod.
//! The agent on each node moves abnormals targeting it through three stages,
//! each handled by its own engine:
//!
//! ```text
//!   (new) ──► InformationCollecting ──► Diagnosing ──► Recovering ──► Succeeded
//!                                           │              │
//!                                           └──► Failed ◄──┘
//! ```
//!
//! At each stage the engine runs the embedded processors declared on the
//! abnormal, then offers the abnormal to external HTTP processors until one
//! returns an acceptable result.
//!
//! # High-Level API
//!
//! ```ignore
//! use kubediag::agent::{Agent, AgentConfig};
//! use kubediag::store::InMemoryStore;
//!
//! let store = Arc::new(InMemoryStore::new());
//! let agent = Agent::new(AgentConfig::new("node1"), store)?;
//! agent.run(shutdown).await?;
//! ```

pub mod agent;
pub mod api;
pub mod config;
pub mod context;
pub mod embedded;
pub mod engine;
pub mod logging;
pub mod processor;
pub mod queue;
pub mod store;
pub mod validation;

/// Version of the kubediag library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
