//! Stage processing: engines, routing between them, and inspection.
//!
//! ```text
//!                    ┌──────────────┐
//!   store watch ───► │ PhaseRouter  │
//!                    └──┬────┬────┬─┘
//!                       │    │    │  StageQueue per stage
//!          ┌────────────┘    │    └─────────────┐
//!          ▼                 ▼                  ▼
//!   ┌─────────────┐   ┌─────────────┐   ┌─────────────┐
//!   │ Information │   │  Diagnosing │   │  Recovering │
//!   │ Collecting  │   │   engine    │   │   engine    │
//!   └──────┬──────┘   └──────┬──────┘   └──────┬──────┘
//!          └──── status update (next phase) ───┘
//!                         │
//!                         ▼
//!                 store watch (again)
//! ```

mod core;
mod events;
mod metrics;
mod router;
mod server;
mod stage;

pub use self::core::{
    is_node_matched, DropReason, EngineError, StageEngine, StageEngineConfig, SyncOutcome,
};
pub use events::{
    Event, EventSink, EventType, MemoryEventSink, MultiplexEventSink, NullEventSink,
    TracingEventSink,
};
pub use metrics::{StageMetrics, StageMetricsSnapshot};
pub use router::{PhaseRouter, INVALID_TARGET_REASON};
pub use server::{inspection_router, serve_inspection};
pub use stage::{Resolver, Stage, StageConfig};
