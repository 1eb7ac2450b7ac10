//! Narrow interfaces to the external collaborators.
//!
//! The engine consumes four services it does not implement: the template
//! renderer, the resource enhancer, the object store client and the remote
//! pod exec/copy machinery (Pipe task only). Each is modeled as a trait so
//! the engine stays constructible with explicit dependencies and fully
//! testable against in-memory fakes (see [`crate::testing`]).

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::meta::ExecutionMetadata;
use crate::resource::{ObjectKey, ResourceObject};

/// Failures reported by external collaborators.
#[derive(Error, Debug)]
pub enum ExternalError {
    /// The addressed resource does not exist in the store
    #[error("resource not found")]
    NotFound,

    /// A remote command exited with a nonzero status
    #[error("remote command exited with status {code}")]
    CommandFailed { code: i32 },

    /// Any other collaborator failure
    #[error("{0}")]
    Failure(String),
}

/// The value bag handed to the template renderer: merged parameters, pipe
/// artifact names and execution metadata.
#[derive(Debug, Clone, Serialize)]
pub struct RenderBag {
    /// Merged instance + operator-version parameters
    pub parameters: BTreeMap<String, String>,

    /// Pipe output key → artifact object name
    pub pipes: BTreeMap<String, String>,

    /// Coordinates of the rendering task
    pub meta: ExecutionMetadata,
}

/// Template renderer: text substitution over a sandboxed helper set.
pub trait Renderer: Send + Sync {
    /// Renders `template` under `bag`; `template_name` is used for error
    /// attribution only.
    fn render(
        &self,
        template_name: &str,
        template: &str,
        bag: &RenderBag,
    ) -> Result<String, ExternalError>;
}

/// Resource enhancer: stamps heritage labels, plan/phase/step annotations,
/// owner references (namespaced resources only) and dependency hashes onto
/// rendered objects.
pub trait Enhancer: Send + Sync {
    /// Decorates the rendered objects with instance metadata.
    fn enhance(
        &self,
        objects: Vec<ResourceObject>,
        meta: &ExecutionMetadata,
    ) -> Result<Vec<ResourceObject>, ExternalError>;
}

/// Object store client: create/update/delete/get against a Kubernetes-style
/// resource API, plus the discovery questions the engine needs.
#[async_trait]
pub trait ResourceClient: Send + Sync {
    /// Fetches the observed state of an object, or `None` when absent.
    async fn get(&self, key: &ObjectKey) -> Result<Option<ResourceObject>, ExternalError>;

    /// Creates or updates an object and returns its observed state.
    async fn apply(&self, object: &ResourceObject) -> Result<ResourceObject, ExternalError>;

    /// Issues a foreground-cascading delete. Absent objects report
    /// [`ExternalError::NotFound`].
    async fn delete(&self, key: &ObjectKey) -> Result<(), ExternalError>;

    /// Whether the given resource kind is namespaced.
    fn is_namespaced(&self, kind: &str) -> bool;

    /// Whether the given resource kind exists in the API at all.
    fn kind_exists(&self, kind: &str) -> bool;
}

/// Remote exec/copy used by the Pipe task to download produced files out of
/// a helper pod.
#[async_trait]
pub trait PodExec: Send + Sync {
    /// Streams one file out of a running pod's container.
    async fn download_file(
        &self,
        namespace: &str,
        pod_name: &str,
        container: &str,
        path: &str,
    ) -> Result<Vec<u8>, ExternalError>;
}
