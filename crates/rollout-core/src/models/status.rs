//! Execution status model for plans, phases and steps.
//!
//! Pure data plus predicate functions; no I/O. The status tree mirrors the
//! shape of its plan (same phase and step names, same nesting) and is created
//! once, at first plan selection, seeded to [`ExecutionStatus::NeverRun`].
//! It is never deleted afterwards: plan selection resets it to `Pending` when
//! a plan is (re)triggered and only the workflow engine advances it during a
//! run.

use std::str::FromStr;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Type-safe enumeration of plan/phase/step execution statuses.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// The unit has never been scheduled
    #[default]
    NeverRun,

    /// The unit is scheduled but has not started yet
    Pending,

    /// The unit is actively being executed
    InProgress,

    /// The unit hit a transient error and will be retried on the next pass
    Error,

    /// The unit hit a structural error and will never be retried (terminal)
    FatalError,

    /// The unit finished successfully (terminal)
    Complete,
}

impl FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "never_run" | "neverrun" => Ok(ExecutionStatus::NeverRun),
            "pending" => Ok(ExecutionStatus::Pending),
            "in_progress" | "inprogress" => Ok(ExecutionStatus::InProgress),
            "error" => Ok(ExecutionStatus::Error),
            "fatal_error" | "fatalerror" => Ok(ExecutionStatus::FatalError),
            "complete" => Ok(ExecutionStatus::Complete),
            _ => Err(format!("Invalid execution status: {s}")),
        }
    }
}

impl ExecutionStatus {
    /// Convert to the serialized string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::NeverRun => "never_run",
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::InProgress => "in_progress",
            ExecutionStatus::Error => "error",
            ExecutionStatus::FatalError => "fatal_error",
            ExecutionStatus::Complete => "complete",
        }
    }

    /// Whether the unit is part of an active run (`InProgress`, `Pending`
    /// or retryable `Error`).
    pub fn is_running(self) -> bool {
        matches!(
            self,
            ExecutionStatus::InProgress | ExecutionStatus::Pending | ExecutionStatus::Error
        )
    }

    /// Whether the unit finished successfully.
    pub fn is_finished(self) -> bool {
        matches!(self, ExecutionStatus::Complete)
    }

    /// Whether the unit can never advance again (`Complete` or `FatalError`).
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ExecutionStatus::Complete | ExecutionStatus::FatalError
        )
    }
}

/// Execution status of one plan, mirroring the plan's phase/step shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanStatus {
    /// Name of the plan this status tracks
    pub name: String,

    /// Current execution status of the plan as a whole
    #[serde(default)]
    pub status: ExecutionStatus,

    /// Human-readable detail for the current status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Unique id of the plan execution this status belongs to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,

    /// Timestamp of the last status change (UTC)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<Timestamp>,

    /// Per-phase statuses, in plan declaration order
    #[serde(default)]
    pub phases: Vec<PhaseStatus>,
}

/// Execution status of one phase within a plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhaseStatus {
    /// Name of the phase this status tracks
    pub name: String,

    /// Current execution status of the phase
    #[serde(default)]
    pub status: ExecutionStatus,

    /// Human-readable detail for the current status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Timestamp of the last status change (UTC)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<Timestamp>,

    /// Per-step statuses, in phase declaration order
    #[serde(default)]
    pub steps: Vec<StepStatus>,
}

/// Execution status of one step within a phase.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepStatus {
    /// Name of the step this status tracks
    pub name: String,

    /// Current execution status of the step
    #[serde(default)]
    pub status: ExecutionStatus,

    /// Human-readable detail for the current status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Timestamp of the last status change (UTC)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<Timestamp>,
}

impl PlanStatus {
    /// Builds a status tree mirroring `plan`'s shape, with every phase and
    /// step seeded to [`ExecutionStatus::NeverRun`].
    pub fn seeded(name: impl Into<String>, plan: &super::operator::Plan) -> Self {
        Self {
            name: name.into(),
            status: ExecutionStatus::NeverRun,
            message: None,
            uid: None,
            last_updated: None,
            phases: plan
                .phases
                .iter()
                .map(|phase| PhaseStatus {
                    name: phase.name.clone(),
                    status: ExecutionStatus::NeverRun,
                    message: None,
                    last_updated: None,
                    steps: phase
                        .steps
                        .iter()
                        .map(|step| StepStatus {
                            name: step.name.clone(),
                            status: ExecutionStatus::NeverRun,
                            message: None,
                            last_updated: None,
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    /// Resets the whole tree to [`ExecutionStatus::Pending`] and attaches a
    /// fresh execution id. Called when the plan is (re)triggered; history of
    /// other plans is untouched because each plan owns its own tree.
    pub fn reset_to_pending(&mut self, uid: impl Into<String>) {
        self.uid = Some(uid.into());
        self.set(ExecutionStatus::Pending);
        for phase in &mut self.phases {
            phase.set(ExecutionStatus::Pending);
            for step in &mut phase.steps {
                step.set(ExecutionStatus::Pending);
            }
        }
    }

    /// Sets the plan status, clearing any previous message.
    pub fn set(&mut self, status: ExecutionStatus) {
        self.status = status;
        self.message = None;
        self.last_updated = Some(Timestamp::now());
    }

    /// Sets the plan status together with a human-readable message.
    pub fn set_with_message(&mut self, status: ExecutionStatus, message: impl Into<String>) {
        self.status = status;
        self.message = Some(message.into());
        self.last_updated = Some(Timestamp::now());
    }

    /// Finds the phase status matching `name` (linear lookup; names within
    /// one plan are expected unique).
    pub fn phase(&self, name: &str) -> Option<&PhaseStatus> {
        self.phases.iter().find(|p| p.name == name)
    }

    /// Mutable variant of [`PlanStatus::phase`].
    pub fn phase_mut(&mut self, name: &str) -> Option<&mut PhaseStatus> {
        self.phases.iter_mut().find(|p| p.name == name)
    }
}

impl PhaseStatus {
    /// Sets the phase status, clearing any previous message.
    pub fn set(&mut self, status: ExecutionStatus) {
        self.status = status;
        self.message = None;
        self.last_updated = Some(Timestamp::now());
    }

    /// Sets the phase status together with a human-readable message.
    pub fn set_with_message(&mut self, status: ExecutionStatus, message: impl Into<String>) {
        self.status = status;
        self.message = Some(message.into());
        self.last_updated = Some(Timestamp::now());
    }

    /// Finds the step status matching `name`.
    pub fn step(&self, name: &str) -> Option<&StepStatus> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Mutable variant of [`PhaseStatus::step`].
    pub fn step_mut(&mut self, name: &str) -> Option<&mut StepStatus> {
        self.steps.iter_mut().find(|s| s.name == name)
    }
}

impl StepStatus {
    /// Sets the step status, clearing any previous message.
    pub fn set(&mut self, status: ExecutionStatus) {
        self.status = status;
        self.message = None;
        self.last_updated = Some(Timestamp::now());
    }

    /// Sets the step status together with a human-readable message.
    pub fn set_with_message(&mut self, status: ExecutionStatus, message: impl Into<String>) {
        self.status = status;
        self.message = Some(message.into());
        self.last_updated = Some(Timestamp::now());
    }
}

/// Aggregated view of an instance's plan statuses: the overall status plus
/// the name of the plan currently holding the execution slot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AggregatedStatus {
    /// Status of the active plan, or the last plan that ran
    #[serde(default)]
    pub status: ExecutionStatus,

    /// Name of the plan currently scheduled or running, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_plan_name: Option<String>,
}
