//! Data models for operator versions, instances and execution statuses.
//!
//! This module contains the core domain models of the plan lifecycle engine:
//! the immutable [`OperatorVersion`] (plans, phases, steps, tasks,
//! parameters), the mutable [`Instance`] (desired spec, status trees, spec
//! snapshot) and the [`ExecutionStatus`] state model with its per-level
//! status trees.

pub mod instance;
pub mod operator;
pub mod status;


// Re-export all public types at the models level
pub use instance::{Instance, InstanceSpec, InstanceStatus, PlanExecution};
pub use operator::{OperatorVersion, Parameter, Phase, Plan, Step, Strategy, TaskSpec};
pub use status::{AggregatedStatus, ExecutionStatus, PhaseStatus, PlanStatus, StepStatus};
