//! Workflow execution engine: one reconciliation pass over a plan tree.
//!
//! [`Workflow::execute`] walks the active plan's phases, steps and tasks in
//! declaration order, drives each task once and records the outcome in an
//! owned copy of the status tree. One call is one pass: the engine never
//! sleeps, spins or blocks on a not-yet-done task; the caller re-invokes on
//! its own trigger until the plan reaches a terminal status.
//!
//! `parallel` strategies only decide whether an incomplete unit blocks its
//! siblings from starting on later passes; within one pass the walk stays
//! strictly sequential and deterministic.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::error::EngineError;
use crate::external::{Enhancer, PodExec, Renderer, ResourceClient};
use crate::meta::{ExecutionMetadata, Metadata};
use crate::models::{ExecutionStatus, Plan, PlanStatus, Strategy, TaskSpec};
use crate::task::{self, Context};

/// Everything needed to advance one plan by one pass: the plan shape, its
/// last known status tree and the data resolved from the operator version.
#[derive(Debug, Clone)]
pub struct ActivePlan {
    /// Name of the plan
    pub name: String,

    /// The plan definition, in declaration order
    pub spec: Plan,

    /// Last known status tree; [`Workflow::execute`] never mutates it,
    /// it works on a deep copy
    pub status: PlanStatus,

    /// Task name → task specification
    pub tasks: BTreeMap<String, TaskSpec>,

    /// Template name → template body
    pub templates: BTreeMap<String, String>,

    /// Merged instance + operator-version parameters
    pub parameters: BTreeMap<String, String>,

    /// Pipe output key → artifact name, precomputed for the whole plan
    pub pipes: BTreeMap<String, String>,
}

/// A fatal execution failure, carrying the updated status tree so the caller
/// can persist the `FatalError` markings before surfacing the error.
#[derive(Error, Debug)]
#[error("{source}")]
pub struct FatalPlanError {
    /// Status tree with plan/phase/step marked `FatalError`
    pub status: Box<PlanStatus>,

    /// The underlying fatal error
    #[source]
    pub source: EngineError,
}

/// The workflow engine, constructed with its four external collaborators.
pub struct Workflow<'a> {
    /// Object store client
    pub client: &'a dyn ResourceClient,

    /// Resource enhancer
    pub enhancer: &'a dyn Enhancer,

    /// Template renderer
    pub renderer: &'a dyn Renderer,

    /// Remote exec/copy for pipe tasks
    pub pod_exec: &'a dyn PodExec,
}

impl Workflow<'_> {
    /// Advances the plan by exactly one pass and returns the new status
    /// tree.
    ///
    /// An already-terminal plan is returned unchanged without touching any
    /// task. Transient task errors mark the affected step `Error` and leave
    /// the plan retryable; a fatal error marks step, phase and plan
    /// `FatalError` and short-circuits the whole call.
    pub async fn execute(
        &self,
        plan: &ActivePlan,
        meta: &Metadata,
    ) -> Result<PlanStatus, FatalPlanError> {
        // Work on a deep copy so a failed pass never corrupts the last
        // known-good status.
        let mut status = plan.status.clone();
        if status.status.is_terminal() {
            log::debug!("plan \"{}\" is terminal, nothing to do", plan.name);
            return Ok(status);
        }

        status.set(ExecutionStatus::InProgress);
        let mut phases_left = plan.spec.phases.len();

        for phase in &plan.spec.phases {
            let Some(pi) = status.phases.iter().position(|p| p.name == phase.name) else {
                return Err(self.fail_plan(
                    status,
                    EngineError::MissingStatus {
                        level: "phase",
                        name: phase.name.clone(),
                    },
                ));
            };

            if status.phases[pi].status.is_finished() {
                phases_left -= 1;
                continue;
            }
            if !status.phases[pi].status.is_running() {
                // Defensive fallthrough: nothing can safely be inferred
                // about the remainder of the tree.
                break;
            }
            status.phases[pi].set(ExecutionStatus::InProgress);

            let mut steps_left = phase.steps.len();
            for step in &phase.steps {
                let Some(si) = status.phases[pi]
                    .steps
                    .iter()
                    .position(|s| s.name == step.name)
                else {
                    return Err(self.fail_plan(
                        status,
                        EngineError::MissingStatus {
                            level: "step",
                            name: step.name.clone(),
                        },
                    ));
                };

                if status.phases[pi].steps[si].status.is_finished() {
                    steps_left -= 1;
                    continue;
                }
                if !status.phases[pi].steps[si].status.is_running() {
                    break;
                }
                status.phases[pi].steps[si].set(ExecutionStatus::InProgress);

                let mut tasks_left = step.tasks.len();
                for task_name in &step.tasks {
                    match self
                        .run_task(plan, meta, &status, &phase.name, &step.name, task_name)
                        .await
                    {
                        Ok(true) => tasks_left -= 1,
                        Ok(false) => {
                            log::debug!(
                                "task \"{task_name}\" in step \"{}\" is not done yet",
                                step.name
                            );
                        }
                        Err(err) if err.is_fatal() => {
                            let message = format!(
                                "error during execution of task \"{task_name}\": {err}"
                            );
                            status.phases[pi].steps[si]
                                .set_with_message(ExecutionStatus::FatalError, &message);
                            status.phases[pi]
                                .set_with_message(ExecutionStatus::FatalError, &message);
                            status.set_with_message(ExecutionStatus::FatalError, &message);
                            return Err(FatalPlanError {
                                status: Box::new(status),
                                source: err,
                            });
                        }
                        Err(err) => {
                            status.phases[pi].steps[si].set_with_message(
                                ExecutionStatus::Error,
                                format!(
                                    "a transient error when executing task \
                                     \"{task_name}\", will retry: {err}"
                                ),
                            );
                        }
                    }
                }

                if tasks_left > 0 {
                    if phase.strategy == Strategy::Serial {
                        // An incomplete step blocks the rest of a serial
                        // phase until the next pass.
                        break;
                    }
                } else {
                    status.phases[pi].steps[si].set(ExecutionStatus::Complete);
                    steps_left -= 1;
                }
            }

            if steps_left > 0 {
                if plan.spec.strategy == Strategy::Serial {
                    break;
                }
            } else {
                status.phases[pi].set(ExecutionStatus::Complete);
                phases_left -= 1;
            }
        }

        if phases_left == 0 {
            status.set(ExecutionStatus::Complete);
            log::debug!("plan \"{}\" is complete", plan.name);
        }
        Ok(status)
    }

    async fn run_task(
        &self,
        plan: &ActivePlan,
        meta: &Metadata,
        status: &PlanStatus,
        phase_name: &str,
        step_name: &str,
        task_name: &str,
    ) -> Result<bool, EngineError> {
        let spec = plan.tasks.get(task_name).ok_or_else(|| EngineError::MissingTask {
            name: task_name.to_string(),
        })?;
        let task = task::build(task_name, spec)?;

        let ctx = Context {
            client: self.client,
            enhancer: self.enhancer,
            renderer: self.renderer,
            pod_exec: self.pod_exec,
            meta: ExecutionMetadata {
                metadata: meta.clone(),
                plan_name: plan.name.clone(),
                plan_uid: status.uid.clone().unwrap_or_default(),
                phase_name: phase_name.to_string(),
                step_name: step_name.to_string(),
                task_name: task_name.to_string(),
            },
            templates: &plan.templates,
            parameters: &plan.parameters,
            pipes: &plan.pipes,
        };
        task.run(&ctx).await
    }

    fn fail_plan(&self, mut status: PlanStatus, err: EngineError) -> FatalPlanError {
        status.set_with_message(ExecutionStatus::FatalError, err.to_string());
        FatalPlanError {
            status: Box::new(status),
            source: err,
        }
    }
}
