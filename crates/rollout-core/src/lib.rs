//! Core library for the Rollout plan lifecycle engine.
//!
//! Given declarative instance and operator-version resources, this crate
//! decides which rollout plan should run ([`selection`]), validates that a
//! proposed instance update is safe ([`admission`]) and executes the chosen
//! plan as a structured, resumable workflow of phases, steps and tasks
//! ([`engine`]). Reconciliation gives at-least-once semantics only, so every
//! piece of the engine is built to produce identical results whether invoked
//! once or interrupted and re-invoked many times.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌───────────────┐   ┌────────────────┐   ┌──────────────────┐
//! │ Plan Selection│──▶│ Status Model   │◀──│ Workflow Engine  │
//! │ (selection)   │   │ (models)       │   │ (engine + task)  │
//! └───────────────┘   └────────────────┘   └──────────────────┘
//!        ▲                                          │
//! ┌──────┴────────┐                      ┌──────────▼─────────┐
//! │ Admission     │                      │ External           │
//! │ (admission)   │                      │ collaborators      │
//! └───────────────┘                      │ (external)         │
//!                                        └────────────────────┘
//! ```
//!
//! One reconciliation pass invokes [`selection::select_plan`], schedules the
//! chosen plan via [`selection::schedule_plan`], then advances it by exactly
//! one [`engine::Workflow::execute`] pass. [`admission::validate_transition`]
//! runs independently and synchronously whenever a client attempts to write
//! a new instance spec.
//!
//! # Quick Start
//!
//! ```rust
//! use rollout_core::engine::{ActivePlan, Workflow};
//! use rollout_core::meta::Metadata;
//! use rollout_core::testing::{
//!     InMemoryClient, PassthroughEnhancer, ScriptedPodExec, SubstitutionRenderer,
//! };
//!
//! # async fn example(plan: ActivePlan) -> Result<(), Box<dyn std::error::Error>> {
//! let client = InMemoryClient::new();
//! let workflow = Workflow {
//!     client: &client,
//!     enhancer: &PassthroughEnhancer,
//!     renderer: &SubstitutionRenderer,
//!     pod_exec: &ScriptedPodExec::new(),
//! };
//!
//! let status = workflow.execute(&plan, &Metadata::default()).await?;
//! println!("plan {} is now {:?}", status.name, status.status);
//! # Ok(())
//! # }
//! ```

pub mod admission;
pub mod engine;
pub mod error;
pub mod external;
pub mod health;
pub mod meta;
pub mod models;
pub mod params;
pub mod resource;
pub mod selection;
pub mod task;
pub mod testing;

// Re-export commonly used types
pub use admission::validate_transition;
pub use engine::{ActivePlan, FatalPlanError, Workflow};
pub use error::{EngineError, Result};
pub use meta::{ExecutionMetadata, Metadata};
pub use models::{
    ExecutionStatus, Instance, InstanceSpec, OperatorVersion, Parameter, Phase, PhaseStatus, Plan,
    PlanExecution, PlanStatus, Step, StepStatus, Strategy, TaskSpec,
};
pub use selection::{schedule_plan, select_plan};
pub use task::{Context, Task};
