//! Task abstraction: the atomic, idempotent unit of work.
//!
//! A task exposes exactly one operation, [`Task::run`], which must be safe to
//! repeat indefinitely with the same context. `Ok(true)` is the only success
//! signal; `Ok(false)` means "call again on the next reconciliation pass".
//! Errors are classified through [`EngineError::is_fatal`]: fatal errors
//! indicate structural problems and must never be retried.
//!
//! The set of task kinds is closed. [`build`] maps the kind discriminant of a
//! [`TaskSpec`] onto a concrete task, so adding a kind is a compile-time
//! visible change, and an unrecognized kind fails fatally before the plan can
//! even start.

pub mod apply;
pub mod delete;
pub mod dummy;
pub mod pipe;
pub mod toggle;


use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::{EngineError, Result};
use crate::external::{Enhancer, PodExec, RenderBag, Renderer, ResourceClient};
use crate::meta::ExecutionMetadata;
use crate::models::TaskSpec;
use crate::resource::ResourceObject;

pub use apply::ApplyTask;
pub use delete::DeleteTask;
pub use dummy::DummyTask;
pub use pipe::{pipes_map, PipeArtifactKind, PipeFile, PipeTask};
pub use toggle::ToggleTask;

/// A unit of work executed within one step of a plan.
#[async_trait]
pub trait Task: Send + Sync + std::fmt::Debug {
    /// Runs the task once. Returns whether the work is done; a `false`
    /// without an error simply defers to the next pass.
    async fn run(&self, ctx: &Context<'_>) -> Result<bool>;
}

/// Task-scoped execution context: collaborators, coordinates and data.
pub struct Context<'a> {
    /// Object store client
    pub client: &'a dyn ResourceClient,

    /// Resource enhancer
    pub enhancer: &'a dyn Enhancer,

    /// Template renderer
    pub renderer: &'a dyn Renderer,

    /// Remote exec/copy (Pipe task only)
    pub pod_exec: &'a dyn PodExec,

    /// Coordinates of this task within the plan tree
    pub meta: ExecutionMetadata,

    /// Template name → template body
    pub templates: &'a BTreeMap<String, String>,

    /// Merged instance + operator-version parameters
    pub parameters: &'a BTreeMap<String, String>,

    /// Pipe output key → artifact object name
    pub pipes: &'a BTreeMap<String, String>,
}

impl Context<'_> {
    /// Builds the value bag handed to the renderer.
    pub fn render_bag(&self) -> RenderBag {
        RenderBag {
            parameters: self.parameters.clone(),
            pipes: self.pipes.clone(),
            meta: self.meta.clone(),
        }
    }

    /// Renders the named resource templates and runs them through the
    /// enhancer. Namespaced objects without a namespace are placed into the
    /// instance's namespace first.
    ///
    /// All failures on this path are fatal: a template that does not render
    /// or parse will not fix itself by retrying.
    pub fn render_resources(&self, resource_names: &[String]) -> Result<Vec<ResourceObject>> {
        let bag = self.render_bag();
        let mut objects = Vec::new();
        for name in resource_names {
            let template = self.templates.get(name).ok_or_else(|| {
                EngineError::fatal(format!(
                    "resource template \"{name}\" is not defined by the operator version"
                ))
            })?;
            let rendered = self
                .renderer
                .render(name, template, &bag)
                .map_err(|e| EngineError::fatal(format!("failed to render \"{name}\": {e}")))?;
            for mut object in ResourceObject::parse_yaml(&rendered)? {
                if object.namespace().is_empty() && self.client.is_namespaced(object.kind()) {
                    object.set_namespace(&self.meta.metadata.instance_namespace);
                }
                objects.push(object);
            }
        }
        self.enhancer
            .enhance(objects, &self.meta)
            .map_err(|e| EngineError::fatal(format!("failed to enhance resources: {e}")))
    }
}

/// Builds the concrete task selected by the spec's kind discriminant.
///
/// # Errors
///
/// Returns a fatal error for kinds outside the closed built-in set and for
/// configs that do not deserialize into the kind's expected shape.
pub fn build(name: &str, spec: &TaskSpec) -> Result<Box<dyn Task>> {
    match spec.kind.as_str() {
        "Apply" => Ok(Box::new(ApplyTask::from_spec(name, spec)?)),
        "Delete" => Ok(Box::new(DeleteTask::from_spec(name, spec)?)),
        "Toggle" => Ok(Box::new(ToggleTask::from_spec(name, spec)?)),
        "Pipe" => Ok(Box::new(PipeTask::from_spec(name, spec)?)),
        "Dummy" => Ok(Box::new(DummyTask::from_spec(name, spec)?)),
        // Operator composition is declared but not implemented yet.
        "Operator" => Err(EngineError::fatal(format!(
            "task \"{name}\": nested operator tasks are not yet supported"
        ))),
        _ => Err(EngineError::UnknownTaskKind {
            name: name.to_string(),
            kind: spec.kind.clone(),
        }),
    }
}

pub(crate) fn parse_config<T: serde::de::DeserializeOwned>(
    name: &str,
    spec: &TaskSpec,
) -> Result<T> {
    serde_json::from_value(spec.spec.clone()).map_err(|e| {
        EngineError::fatal(format!(
            "invalid {} task config for \"{name}\": {e}",
            spec.kind
        ))
    })
}
