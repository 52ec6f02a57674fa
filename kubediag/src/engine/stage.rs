//! The three pipeline stages and what distinguishes them.
//!
//! All stages share one engine; a [`StageConfig`] row carries everything that
//! differs between them.
//!
//! | Stage                 | condition            | success →    | failure →   | resolver     |
//! |-----------------------|----------------------|--------------|-------------|--------------|
//! | InformationCollecting | InformationCollected | Diagnosing   | Diagnosing  | none         |
//! | Diagnosing            | Identified           | Recovering   | Failed      | `diagnoser`  |
//! | Recovering            | Recovered            | Succeeded    | Failed      | `recoverer`  |

use std::fmt;

use crate::api::{AbnormalPhase, AbnormalStatus, ConditionType, NamespacedName, ProcessorType};

/// A stage of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    InformationCollecting,
    Diagnosing,
    Recovering,
}

/// Status fields a stage sets when it resolves an abnormal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolver {
    /// `status.diagnoser` and `status.identifiable`.
    Diagnoser,
    /// `status.recoverer` and `status.recoverable`.
    Recoverer,
}

impl Resolver {
    /// Records the outcome flag, and the resolving processor if any.
    pub fn apply(self, status: &mut AbnormalStatus, resolved: bool, by: Option<NamespacedName>) {
        match self {
            Self::Diagnoser => {
                status.identifiable = resolved;
                if by.is_some() {
                    status.diagnoser = by;
                }
            }
            Self::Recoverer => {
                status.recoverable = resolved;
                if by.is_some() {
                    status.recoverer = by;
                }
            }
        }
    }
}

/// Per-stage parameters of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageConfig {
    pub stage: Stage,
    /// Short name used in logs and queue errors.
    pub name: &'static str,
    /// Phase the stage acts on.
    pub phase: AbnormalPhase,
    /// Tag of the embedded and external processors the stage runs.
    pub processor_type: ProcessorType,
    /// Condition recording the stage's outcome.
    pub condition: ConditionType,
    pub success_phase: AbnormalPhase,
    pub failure_phase: AbnormalPhase,
    pub resolver: Option<Resolver>,
    /// An empty assignment list resolves the stage without any processor.
    /// When false, an empty list makes every catalogued processor eligible.
    pub skip_when_unassigned: bool,
    /// `spec.skipRecovery` resolves the stage without any processor.
    pub honors_skip_recovery: bool,
    /// Path of the stage's inspection endpoint.
    pub inspection_path: &'static str,
    /// Noun used to build event reasons.
    pub event_stem: &'static str,
}

const INFORMATION_COLLECTING: StageConfig = StageConfig {
    stage: Stage::InformationCollecting,
    name: "information-collecting",
    phase: AbnormalPhase::InformationCollecting,
    processor_type: ProcessorType::InformationCollector,
    condition: ConditionType::InformationCollected,
    success_phase: AbnormalPhase::Diagnosing,
    failure_phase: AbnormalPhase::Diagnosing,
    resolver: None,
    skip_when_unassigned: false,
    honors_skip_recovery: false,
    inspection_path: "/informationcollectors",
    event_stem: "InformationCollection",
};

const DIAGNOSING: StageConfig = StageConfig {
    stage: Stage::Diagnosing,
    name: "diagnosing",
    phase: AbnormalPhase::Diagnosing,
    processor_type: ProcessorType::Diagnoser,
    condition: ConditionType::Identified,
    success_phase: AbnormalPhase::Recovering,
    failure_phase: AbnormalPhase::Failed,
    resolver: Some(Resolver::Diagnoser),
    skip_when_unassigned: true,
    honors_skip_recovery: false,
    inspection_path: "/diagnosers",
    event_stem: "Diagnosis",
};

const RECOVERING: StageConfig = StageConfig {
    stage: Stage::Recovering,
    name: "recovering",
    phase: AbnormalPhase::Recovering,
    processor_type: ProcessorType::Recoverer,
    condition: ConditionType::Recovered,
    success_phase: AbnormalPhase::Succeeded,
    failure_phase: AbnormalPhase::Failed,
    resolver: Some(Resolver::Recoverer),
    skip_when_unassigned: true,
    honors_skip_recovery: true,
    inspection_path: "/recoverers",
    event_stem: "Recovery",
};

impl Stage {
    /// Every stage in pipeline order.
    pub const ALL: [Stage; 3] = [Self::InformationCollecting, Self::Diagnosing, Self::Recovering];

    pub fn config(self) -> &'static StageConfig {
        match self {
            Self::InformationCollecting => &INFORMATION_COLLECTING,
            Self::Diagnosing => &DIAGNOSING,
            Self::Recovering => &RECOVERING,
        }
    }

    /// The stage acting on `phase`, if any.
    pub fn for_phase(phase: AbnormalPhase) -> Option<Stage> {
        Self::ALL.into_iter().find(|s| s.config().phase == phase)
    }

    pub fn name(self) -> &'static str {
        self.config().name
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl StageConfig {
    pub fn skipped_reason(&self) -> String {
        format!("Skipping{}", self.event_stem)
    }

    pub fn succeeded_reason(&self) -> String {
        format!("{}Succeeded", self.event_stem)
    }

    pub fn failed_reason(&self) -> String {
        format!("{}Failed", self.event_stem)
    }
}
