//! Resource types persisted in the store and exchanged with processors.

mod abnormal;
mod condition;
mod meta;
mod processor;

pub use abnormal::{
    Abnormal, AbnormalCondition, AbnormalPhase, AbnormalSourceType, AbnormalSpec, AbnormalStatus,
    CommandExecutorSpec, CommandExecutorStatus, ConditionStatus, ConditionType, GoProfilerSpec,
    GoProfilerStatus, JavaProfilerSpec, JavaProfilerStatus, JavaProfilerType, PodReference,
    ProcessorType, ProfilerEndpoint, ProfilerSpec, ProfilerStatus, PrometheusAlert, RawExtension,
    TargetError, ABNORMAL_KIND,
};
pub use condition::{get_condition, update_condition};
pub use meta::{now, NamespacedName, ObjectKey, ObjectMeta, TypeMeta, API_VERSION};
pub use processor::{Processor, ProcessorSpec, Scheme};
