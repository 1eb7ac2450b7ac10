//! Execution metadata threaded through the engine and its collaborators.

use serde::Serialize;

/// Instance-level metadata handed to the engine by the reconciliation loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct Metadata {
    /// Name of the instance being reconciled
    pub instance_name: String,

    /// Namespace of the instance
    pub instance_namespace: String,

    /// Name of the operator
    pub operator_name: String,

    /// Name of the operator version resource
    pub operator_version_name: String,

    /// Version string of the operator version
    pub operator_version: String,
}

/// Task-scoped metadata: the instance-level fields plus the coordinates of
/// the task within the plan tree. Collaborators use it to stamp labels,
/// annotations and deterministic names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct ExecutionMetadata {
    /// Instance-level metadata
    #[serde(flatten)]
    pub metadata: Metadata,

    /// Name of the executing plan
    pub plan_name: String,

    /// Unique id of this plan execution
    pub plan_uid: String,

    /// Name of the executing phase
    pub phase_name: String,

    /// Name of the executing step
    pub step_name: String,

    /// Name of the executing task
    pub task_name: String,
}
