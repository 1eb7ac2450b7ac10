//! Pipe task: extract files from a short-lived helper pod into artifacts.
//!
//! A pipe runs in stages: render and launch a pod whose init container
//! produces output files on a shared volume, wait for pod health, copy the
//! named files out over remote exec, wrap each file into a Secret or
//! ConfigMap with a deterministic name, apply those artifacts, and delete the
//! helper pod. A non-ready pod is simply "not yet done"; every structural
//! failure (bad pod spec, duplicate output keys, oversized file, nonzero
//! remote exit) is fatal.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{parse_config, Context, Task};
use crate::error::{EngineError, Result};
use crate::external::ExternalError;
use crate::health;
use crate::meta::{ExecutionMetadata, Metadata};
use crate::models::{Plan, TaskSpec};
use crate::resource::ResourceObject;

/// Upper bound on a single piped file, guarding against oversized payloads.
pub const MAX_PIPE_FILE_BYTES: usize = 1024 * 1024;

/// Kind of artifact a piped file is wrapped into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipeArtifactKind {
    /// Wrap the file bytes into a Secret (base64 data)
    Secret,

    /// Wrap the file text into a ConfigMap (UTF-8 data)
    ConfigMap,
}

/// One file produced by the helper pod.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipeFile {
    /// Path of the file on the shared volume
    pub file: String,

    /// Artifact kind to wrap the file into
    pub kind: PipeArtifactKind,

    /// Key under which later tasks reference the artifact
    pub key: String,
}

#[derive(Debug, Deserialize)]
struct PipeConfig {
    pod: String,
    pipe: Vec<PipeFile>,
}

/// The multi-stage pipe task.
#[derive(Debug, Clone)]
pub struct PipeTask {
    pod_template: String,
    files: Vec<PipeFile>,
}

impl PipeTask {
    /// Deserializes and validates the kind-specific config.
    pub fn from_spec(name: &str, spec: &TaskSpec) -> Result<Self> {
        let config: PipeConfig = parse_config(name, spec)?;
        let mut seen = BTreeSet::new();
        for file in &config.pipe {
            if !seen.insert(file.key.as_str()) {
                return Err(EngineError::fatal(format!(
                    "task \"{name}\": duplicate pipe key \"{}\"",
                    file.key
                )));
            }
        }
        Ok(Self {
            pod_template: config.pod,
            files: config.pipe,
        })
    }

    fn render_pod(&self, ctx: &Context<'_>) -> Result<ResourceObject> {
        let template = ctx.templates.get(&self.pod_template).ok_or_else(|| {
            EngineError::fatal(format!(
                "pipe pod template \"{}\" is not defined by the operator version",
                self.pod_template
            ))
        })?;
        let rendered = ctx
            .renderer
            .render(&self.pod_template, template, &ctx.render_bag())
            .map_err(|e| {
                EngineError::fatal(format!(
                    "failed to render pipe pod \"{}\": {e}",
                    self.pod_template
                ))
            })?;
        let mut objects = ResourceObject::parse_yaml(&rendered)?;
        if objects.len() != 1 {
            return Err(EngineError::fatal(format!(
                "pipe pod template \"{}\" must render exactly one object",
                self.pod_template
            )));
        }
        let mut pod = objects.remove(0);
        validate_pod_spec(&pod)?;

        pod.set_name(&pipe_pod_name(&ctx.meta));
        pod.set_namespace(&ctx.meta.metadata.instance_namespace);
        Ok(pod)
    }

    async fn download(&self, ctx: &Context<'_>, pod: &ResourceObject) -> Result<Vec<(PipeFile, Vec<u8>)>> {
        let container = pod
            .value()
            .pointer("/spec/containers/0/name")
            .and_then(Value::as_str)
            .ok_or_else(|| EngineError::fatal("pipe pod has no named container"))?;

        let mut downloads = Vec::new();
        for file in &self.files {
            let bytes = ctx
                .pod_exec
                .download_file(pod.namespace(), pod.name(), container, &file.file)
                .await
                .map_err(|e| match e {
                    ExternalError::CommandFailed { .. } => EngineError::fatal(format!(
                        "failed to copy pipe file \"{}\": {e}",
                        file.file
                    )),
                    other => EngineError::transient(format!(
                        "failed to copy pipe file \"{}\": {other}",
                        file.file
                    )),
                })?;
            if bytes.len() > MAX_PIPE_FILE_BYTES {
                return Err(EngineError::fatal(format!(
                    "pipe file \"{}\" exceeds the {MAX_PIPE_FILE_BYTES}-byte limit",
                    file.file
                )));
            }
            downloads.push((file.clone(), bytes));
        }
        Ok(downloads)
    }

    fn wrap_artifacts(
        &self,
        ctx: &Context<'_>,
        downloads: Vec<(PipeFile, Vec<u8>)>,
    ) -> Result<Vec<ResourceObject>> {
        let namespace = &ctx.meta.metadata.instance_namespace;
        let mut artifacts = Vec::new();
        for (file, bytes) in downloads {
            let name = artifact_name(&ctx.meta, &file.key);
            let data_key = file_basename(&file.file);
            let value = match file.kind {
                PipeArtifactKind::Secret => json!({
                    "apiVersion": "v1",
                    "kind": "Secret",
                    "metadata": { "name": name, "namespace": namespace },
                    "type": "Opaque",
                    "data": { data_key: BASE64.encode(&bytes) },
                }),
                PipeArtifactKind::ConfigMap => {
                    let text = String::from_utf8(bytes).map_err(|_| {
                        EngineError::fatal(format!(
                            "pipe file \"{}\" is not valid UTF-8 for a ConfigMap",
                            file.file
                        ))
                    })?;
                    json!({
                        "apiVersion": "v1",
                        "kind": "ConfigMap",
                        "metadata": { "name": name, "namespace": namespace },
                        "data": { data_key: text },
                    })
                }
            };
            artifacts.push(ResourceObject::new(value)?);
        }
        ctx.enhancer
            .enhance(artifacts, &ctx.meta)
            .map_err(|e| EngineError::fatal(format!("failed to enhance pipe artifacts: {e}")))
    }
}

#[async_trait]
impl Task for PipeTask {
    async fn run(&self, ctx: &Context<'_>) -> Result<bool> {
        let pod = self.render_pod(ctx)?;
        let pod = ctx
            .enhancer
            .enhance(vec![pod], &ctx.meta)
            .map_err(|e| EngineError::fatal(format!("failed to enhance pipe pod: {e}")))?
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::fatal("enhancer dropped the pipe pod"))?;

        let observed = ctx.client.apply(&pod).await.map_err(|e| {
            EngineError::transient(format!("failed to apply pipe pod \"{}\": {e}", pod.name()))
        })?;
        if !health::is_healthy(&observed) {
            // The pod not being ready is an expected wait, not an error.
            log::debug!("pipe pod \"{}\" is not ready yet", observed.name());
            return Ok(false);
        }

        let downloads = self.download(ctx, &observed).await?;
        let artifacts = self.wrap_artifacts(ctx, downloads)?;
        for artifact in &artifacts {
            ctx.client.apply(artifact).await.map_err(|e| {
                EngineError::transient(format!(
                    "failed to apply pipe artifact \"{}\": {e}",
                    artifact.name()
                ))
            })?;
        }

        match ctx.client.delete(&observed.key()).await {
            Ok(()) | Err(ExternalError::NotFound) => {}
            Err(e) => {
                return Err(EngineError::transient(format!(
                    "failed to delete pipe pod \"{}\": {e}",
                    observed.name()
                )));
            }
        }
        Ok(true)
    }
}

/// Validates the structural requirements on a pipe pod: an init container
/// that produces the files, a regular container to copy them from, and a
/// shared emptyDir volume between them.
fn validate_pod_spec(pod: &ResourceObject) -> Result<()> {
    if pod.kind() != "Pod" {
        return Err(EngineError::fatal(format!(
            "pipe template must render a Pod, got {}",
            pod.kind()
        )));
    }
    let value = pod.value();
    let has_init = value
        .pointer("/spec/initContainers")
        .and_then(Value::as_array)
        .is_some_and(|c| !c.is_empty());
    if !has_init {
        return Err(EngineError::fatal(
            "pipe pod must declare an init container producing the output files",
        ));
    }
    let has_container = value
        .pointer("/spec/containers")
        .and_then(Value::as_array)
        .is_some_and(|c| !c.is_empty());
    if !has_container {
        return Err(EngineError::fatal(
            "pipe pod must declare a container to copy the output files from",
        ));
    }
    let has_shared_volume = value
        .pointer("/spec/volumes")
        .and_then(Value::as_array)
        .is_some_and(|volumes| volumes.iter().any(|v| v.get("emptyDir").is_some()));
    if !has_shared_volume {
        return Err(EngineError::fatal(
            "pipe pod must declare a shared emptyDir volume",
        ));
    }
    Ok(())
}

/// Deterministic name of the helper pod for one task execution.
pub fn pipe_pod_name(meta: &ExecutionMetadata) -> String {
    sanitize_name(&format!("{}.pipepod", name_prefix(meta)))
}

/// Deterministic name of the artifact wrapping one pipe key.
pub fn artifact_name(meta: &ExecutionMetadata, key: &str) -> String {
    sanitize_name(&format!("{}.{key}", name_prefix(meta)))
}

fn name_prefix(meta: &ExecutionMetadata) -> String {
    format!(
        "{}.{}.{}.{}.{}",
        meta.metadata.instance_name, meta.plan_name, meta.phase_name, meta.step_name, meta.task_name
    )
}

/// Lowercases and squashes everything outside `[a-z0-9.-]` so the result is
/// a legal object name, then bounds the length.
fn sanitize_name(raw: &str) -> String {
    let mut sanitized: String = raw
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect();
    sanitized.truncate(63);
    sanitized
        .trim_matches(|c| c == '-' || c == '.')
        .to_string()
}

/// Precomputes the pipe key → artifact name map for a whole plan, so tasks
/// running after a pipe can reference its outputs without engine-side
/// mutation. Names are deterministic per (instance, plan, phase, step, task).
pub fn pipes_map(
    plan_name: &str,
    plan: &Plan,
    tasks: &BTreeMap<String, TaskSpec>,
    meta: &Metadata,
) -> Result<BTreeMap<String, String>> {
    let mut pipes = BTreeMap::new();
    for phase in &plan.phases {
        for step in &phase.steps {
            for task_name in &step.tasks {
                let Some(spec) = tasks.get(task_name) else {
                    continue; // the engine reports missing tasks itself
                };
                if spec.kind != "Pipe" {
                    continue;
                }
                let task = PipeTask::from_spec(task_name, spec)?;
                let em = ExecutionMetadata {
                    metadata: meta.clone(),
                    plan_name: plan_name.to_string(),
                    plan_uid: String::new(),
                    phase_name: phase.name.clone(),
                    step_name: step.name.clone(),
                    task_name: task_name.clone(),
                };
                for file in &task.files {
                    if pipes
                        .insert(file.key.clone(), artifact_name(&em, &file.key))
                        .is_some()
                    {
                        return Err(EngineError::fatal(format!(
                            "duplicate pipe key \"{}\" in plan \"{plan_name}\"",
                            file.key
                        )));
                    }
                }
            }
        }
    }
    Ok(pipes)
}

fn file_basename(path: &str) -> String {
    path.rsplit('/').next().unwrap_or(path).to_string()
}
