//! In-memory test doubles for the external collaborators.
//!
//! These fakes back the crate's own test suite; they implement just enough
//! behavior to exercise the engine's control flow against realistic
//! render/enhance/apply/exec sequences without a live cluster.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::external::{Enhancer, ExternalError, PodExec, RenderBag, Renderer, ResourceClient};
use crate::meta::ExecutionMetadata;
use crate::resource::{ObjectKey, ResourceObject};

/// Renderer fake: replaces `{{name}}` placeholders with parameter values and
/// `{{pipes.key}}` with pipe artifact names.
#[derive(Debug, Default)]
pub struct SubstitutionRenderer;

impl Renderer for SubstitutionRenderer {
    fn render(
        &self,
        _template_name: &str,
        template: &str,
        bag: &RenderBag,
    ) -> Result<String, ExternalError> {
        let mut rendered = template.to_string();
        for (key, value) in &bag.parameters {
            rendered = rendered.replace(&format!("{{{{{key}}}}}"), value);
        }
        for (key, value) in &bag.pipes {
            rendered = rendered.replace(&format!("{{{{pipes.{key}}}}}"), value);
        }
        Ok(rendered)
    }
}

/// Renderer fake that always fails, for fatal-render paths.
#[derive(Debug, Default)]
pub struct FailingRenderer;

impl Renderer for FailingRenderer {
    fn render(
        &self,
        template_name: &str,
        _template: &str,
        _bag: &RenderBag,
    ) -> Result<String, ExternalError> {
        Err(ExternalError::Failure(format!(
            "template \"{template_name}\" cannot be rendered"
        )))
    }
}

/// Enhancer fake: stamps plan/phase/step annotations the way the real
/// enhancer does, without owner references or dependency hashes.
#[derive(Debug, Default)]
pub struct PassthroughEnhancer;

impl Enhancer for PassthroughEnhancer {
    fn enhance(
        &self,
        objects: Vec<ResourceObject>,
        meta: &ExecutionMetadata,
    ) -> Result<Vec<ResourceObject>, ExternalError> {
        let mut enhanced = Vec::with_capacity(objects.len());
        for mut object in objects {
            if let Some(root) = object.value_mut().as_object_mut() {
                let metadata = root
                    .entry("metadata")
                    .or_insert_with(|| Value::Object(serde_json::Map::new()));
                if let Some(map) = metadata.as_object_mut() {
                    let annotations = map
                        .entry("annotations")
                        .or_insert_with(|| Value::Object(serde_json::Map::new()));
                    if let Some(ann) = annotations.as_object_mut() {
                        ann.insert(
                            "rollout/plan".to_string(),
                            Value::String(meta.plan_name.clone()),
                        );
                        ann.insert(
                            "rollout/phase".to_string(),
                            Value::String(meta.phase_name.clone()),
                        );
                        ann.insert(
                            "rollout/step".to_string(),
                            Value::String(meta.step_name.clone()),
                        );
                    }
                }
            }
            enhanced.push(object);
        }
        Ok(enhanced)
    }
}

/// Object store fake: a keyed in-memory map.
#[derive(Debug, Default)]
pub struct InMemoryClient {
    objects: Mutex<BTreeMap<ObjectKey, ResourceObject>>,
}

impl InMemoryClient {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds or overwrites an object, bypassing apply (simulates runtime
    /// status updates observed from the cluster).
    pub fn set_observed(&self, object: ResourceObject) {
        self.objects
            .lock()
            .expect("client store poisoned")
            .insert(object.key(), object);
    }

    /// Snapshot of every stored object key.
    pub fn keys(&self) -> Vec<ObjectKey> {
        self.objects
            .lock()
            .expect("client store poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Fetches a stored object by key.
    pub fn stored(&self, key: &ObjectKey) -> Option<ResourceObject> {
        self.objects
            .lock()
            .expect("client store poisoned")
            .get(key)
            .cloned()
    }
}

#[async_trait]
impl ResourceClient for InMemoryClient {
    async fn get(&self, key: &ObjectKey) -> Result<Option<ResourceObject>, ExternalError> {
        Ok(self.stored(key))
    }

    async fn apply(&self, object: &ResourceObject) -> Result<ResourceObject, ExternalError> {
        let mut store = self.objects.lock().expect("client store poisoned");
        // Preserve a previously-observed status stanza so health checks see
        // what the "cluster" reported, not what the template rendered.
        let mut stored = object.clone();
        if let Some(existing) = store.get(&object.key()) {
            if let (Some(status), Some(root)) = (
                existing.value().get("status").cloned(),
                stored.value_mut().as_object_mut(),
            ) {
                root.entry("status".to_string()).or_insert(status);
            }
        }
        store.insert(stored.key(), stored.clone());
        Ok(stored)
    }

    async fn delete(&self, key: &ObjectKey) -> Result<(), ExternalError> {
        let mut store = self.objects.lock().expect("client store poisoned");
        match store.remove(key) {
            Some(_) => Ok(()),
            None => Err(ExternalError::NotFound),
        }
    }

    fn is_namespaced(&self, kind: &str) -> bool {
        !matches!(
            kind,
            "Namespace" | "ClusterRole" | "ClusterRoleBinding" | "CustomResourceDefinition"
        )
    }

    fn kind_exists(&self, _kind: &str) -> bool {
        true
    }
}

/// Remote exec fake: serves scripted file contents, or a scripted failure.
#[derive(Debug, Default)]
pub struct ScriptedPodExec {
    files: BTreeMap<String, Vec<u8>>,
    exit_code: Option<i32>,
}

impl ScriptedPodExec {
    /// Creates an exec fake with no files.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the bytes served for a file path.
    pub fn with_file(mut self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.files.insert(path.into(), bytes.into());
        self
    }

    /// Makes every download fail with the given remote exit code.
    pub fn failing_with_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }
}

#[async_trait]
impl PodExec for ScriptedPodExec {
    async fn download_file(
        &self,
        _namespace: &str,
        _pod_name: &str,
        _container: &str,
        path: &str,
    ) -> Result<Vec<u8>, ExternalError> {
        if let Some(code) = self.exit_code {
            return Err(ExternalError::CommandFailed { code });
        }
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| ExternalError::Failure(format!("no such file: {path}")))
    }
}
