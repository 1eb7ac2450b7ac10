//! Operator version model: plans, phases, steps, parameters and tasks.
//!
//! An [`OperatorVersion`] is immutable per version. It is produced by the
//! packaging layer and read-only to this crate: the engine resolves plan
//! shapes, task specifications and parameter declarations from it but never
//! writes it back.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Ordering strategy for the children of a plan or phase.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Children must fully finish before the next one starts
    #[default]
    Serial,

    /// An incomplete child does not block its siblings from starting
    Parallel,
}

/// An immutable, versioned definition of plans, tasks and parameters for one
/// application type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OperatorVersion {
    /// Name of this operator version resource
    pub name: String,

    /// Namespace the operator version lives in
    pub namespace: String,

    /// Name of the operator this version belongs to
    pub operator_name: String,

    /// Version string of the packaged operator
    pub version: String,

    /// Plan name → plan definition
    #[serde(default)]
    pub plans: BTreeMap<String, Plan>,

    /// Parameter name → parameter declaration
    #[serde(default)]
    pub parameters: BTreeMap<String, Parameter>,

    /// Task name → task specification
    #[serde(default)]
    pub tasks: BTreeMap<String, TaskSpec>,

    /// Template name → template body, consumed by the external renderer
    #[serde(default)]
    pub templates: BTreeMap<String, String>,
}

/// A rollout workflow: ordered phases executed under a strategy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Plan {
    /// Whether phases run one-at-a-time or may overlap across passes
    #[serde(default)]
    pub strategy: Strategy,

    /// Phases in declaration order
    pub phases: Vec<Phase>,
}

/// One phase of a plan: ordered steps executed under a strategy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Phase {
    /// Name of the phase, unique within its plan
    pub name: String,

    /// Whether steps run one-at-a-time or may overlap across passes
    #[serde(default)]
    pub strategy: Strategy,

    /// Steps in declaration order
    pub steps: Vec<Step>,
}

/// One step of a phase, referencing named tasks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Step {
    /// Name of the step, unique within its plan
    pub name: String,

    /// Names of tasks in [`OperatorVersion::tasks`], executed in order
    #[serde(default)]
    pub tasks: Vec<String>,
}

/// Declaration of one instance parameter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Parameter {
    /// Default value applied when the instance does not set one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,

    /// Whether a value (default or override) must be present
    #[serde(default)]
    pub required: bool,

    /// Name of the plan to trigger when this parameter changes. Falls back
    /// to the update/deploy plans when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
}

/// Specification of one task: a kind discriminant plus kind-specific config.
///
/// The config payload stays opaque here; the task factory deserializes it
/// into the concrete task type selected by `kind`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskSpec {
    /// Kind discriminant (Apply, Delete, Toggle, Pipe, Dummy, ...)
    pub kind: String,

    /// Kind-specific configuration
    #[serde(default)]
    pub spec: serde_json::Value,
}

impl OperatorVersion {
    /// Whether this operator version declares a plan with the given name.
    pub fn has_plan(&self, name: &str) -> bool {
        self.plans.contains_key(name)
    }

    /// Returns the first of `candidates` that names a declared plan.
    pub fn first_declared_plan(&self, candidates: &[&str]) -> Option<String> {
        candidates
            .iter()
            .find(|name| self.has_plan(name))
            .map(|name| (*name).to_string())
    }
}
