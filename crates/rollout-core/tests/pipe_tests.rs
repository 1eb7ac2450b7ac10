//! Integration tests for the pipe task: helper pod lifecycle, artifact
//! creation and consumption by later steps.

mod common;

use common::{active_plan, metadata, operator_version, scheduled_instance, step, Collaborators};
use rollout_core::engine::Workflow;
use rollout_core::models::{ExecutionStatus, OperatorVersion, Phase, Plan, Strategy, TaskSpec};
use rollout_core::resource::ObjectKey;
use rollout_core::task::pipe::MAX_PIPE_FILE_BYTES;
use rollout_core::testing::{InMemoryClient, ScriptedPodExec};
use serde_json::json;

const POD_TEMPLATE: &str = r"
apiVersion: v1
kind: Pod
metadata:
  name: placeholder
spec:
  initContainers:
    - name: gen
      image: cert-gen:1.0
  containers:
    - name: sleeper
      image: busybox:1.36
  volumes:
    - name: out
      emptyDir: {}
";

const WIRING_TEMPLATE: &str = r#"
apiVersion: v1
kind: ConfigMap
metadata:
  name: wiring
data:
  secretName: "{{pipes.cert}}"
"#;

fn pipe_ov(artifact_kind: &str) -> OperatorVersion {
    let plan = Plan {
        strategy: Strategy::Serial,
        phases: vec![Phase {
            name: "main".to_string(),
            strategy: Strategy::Serial,
            steps: vec![step("extract", &["gen"]), step("wire", &["use"])],
        }],
    };
    let mut ov = operator_version(
        vec![("deploy", plan)],
        vec![
            (
                "gen",
                TaskSpec {
                    kind: "Pipe".to_string(),
                    spec: json!({"pod": "pod.yaml", "pipe": [
                        {"file": "/certs/cert.pem", "kind": artifact_kind, "key": "cert"},
                    ]}),
                },
            ),
            (
                "use",
                TaskSpec {
                    kind: "Apply".to_string(),
                    spec: json!({"resources": ["wiring.yaml"]}),
                },
            ),
        ],
    );
    ov.templates
        .insert("pod.yaml".to_string(), POD_TEMPLATE.to_string());
    ov.templates
        .insert("wiring.yaml".to_string(), WIRING_TEMPLATE.to_string());
    ov
}

fn pod_key() -> ObjectKey {
    ObjectKey {
        api_version: "v1".to_string(),
        kind: "Pod".to_string(),
        namespace: "default".to_string(),
        name: "app.deploy.main.extract.gen.pipepod".to_string(),
    }
}

/// Simulates the kubelet reporting the helper pod as finished.
fn mark_pod_succeeded(client: &InMemoryClient) {
    let mut pod = client.stored(&pod_key()).expect("pipe pod applied");
    if let Some(root) = pod.value_mut().as_object_mut() {
        root.insert("status".to_string(), json!({"phase": "Succeeded"}));
    }
    client.set_observed(pod);
}

#[tokio::test]
async fn pipe_extracts_a_secret_and_later_steps_reference_it() {
    let ov = pipe_ov("Secret");
    let inst = scheduled_instance("deploy", &ov);
    let collab = Collaborators {
        pod_exec: ScriptedPodExec::new().with_file("/certs/cert.pem", b"CERT".to_vec()),
        ..Collaborators::default()
    };
    let meta = metadata(&ov);

    // First pass: the helper pod is launched but not ready, so the pipe
    // defers and the serial phase holds the later step back.
    let mut plan = active_plan("deploy", &inst, &ov);
    let first = collab
        .workflow()
        .execute(&plan, &meta)
        .await
        .expect("first pass");
    assert_eq!(first.phases[0].steps[0].status, ExecutionStatus::InProgress);
    assert_eq!(first.phases[0].steps[1].status, ExecutionStatus::Pending);
    assert!(collab.client.stored(&pod_key()).is_some());

    mark_pod_succeeded(&collab.client);

    // Second pass: the pipe finishes and the wiring step consumes the
    // artifact name, completing the plan.
    plan.status = first;
    let second = collab
        .workflow()
        .execute(&plan, &meta)
        .await
        .expect("second pass");
    assert_eq!(second.status, ExecutionStatus::Complete);

    let secret = collab
        .client
        .stored(&ObjectKey {
            api_version: "v1".to_string(),
            kind: "Secret".to_string(),
            namespace: "default".to_string(),
            name: "app.deploy.main.extract.gen.cert".to_string(),
        })
        .expect("pipe artifact applied");
    assert_eq!(
        secret
            .value()
            .pointer("/data/cert.pem")
            .and_then(|v| v.as_str()),
        Some("Q0VSVA==")
    );
    // The enhancer stamped the pipe's coordinates onto the artifact.
    assert_eq!(
        secret
            .value()
            .pointer("/metadata/annotations/rollout~1step")
            .and_then(|v| v.as_str()),
        Some("extract")
    );

    let wiring = collab
        .client
        .stored(&ObjectKey {
            api_version: "v1".to_string(),
            kind: "ConfigMap".to_string(),
            namespace: "default".to_string(),
            name: "wiring".to_string(),
        })
        .expect("wiring applied");
    assert_eq!(
        wiring
            .value()
            .pointer("/data/secretName")
            .and_then(|v| v.as_str()),
        Some("app.deploy.main.extract.gen.cert")
    );

    // The helper pod is gone once the artifacts are stored.
    assert!(collab.client.stored(&pod_key()).is_none());
}

#[tokio::test]
async fn pipe_wraps_text_files_into_configmaps() {
    let ov = pipe_ov("ConfigMap");
    let inst = scheduled_instance("deploy", &ov);
    let collab = Collaborators {
        pod_exec: ScriptedPodExec::new().with_file("/certs/cert.pem", b"PEM TEXT".to_vec()),
        ..Collaborators::default()
    };
    let meta = metadata(&ov);

    let mut plan = active_plan("deploy", &inst, &ov);
    let first = collab
        .workflow()
        .execute(&plan, &meta)
        .await
        .expect("first pass");
    mark_pod_succeeded(&collab.client);

    plan.status = first;
    collab
        .workflow()
        .execute(&plan, &meta)
        .await
        .expect("second pass");

    let configmap = collab
        .client
        .stored(&ObjectKey {
            api_version: "v1".to_string(),
            kind: "ConfigMap".to_string(),
            namespace: "default".to_string(),
            name: "app.deploy.main.extract.gen.cert".to_string(),
        })
        .expect("pipe artifact applied");
    assert_eq!(
        configmap
            .value()
            .pointer("/data/cert.pem")
            .and_then(|v| v.as_str()),
        Some("PEM TEXT")
    );
}

#[tokio::test]
async fn failed_copy_command_is_fatal() {
    let ov = pipe_ov("Secret");
    let inst = scheduled_instance("deploy", &ov);
    let collab = Collaborators::default();
    let meta = metadata(&ov);

    let mut plan = active_plan("deploy", &inst, &ov);
    let first = collab
        .workflow()
        .execute(&plan, &meta)
        .await
        .expect("first pass");
    mark_pod_succeeded(&collab.client);

    let failing = ScriptedPodExec::new().failing_with_code(3);
    let workflow = Workflow {
        client: &collab.client,
        enhancer: &collab.enhancer,
        renderer: &collab.renderer,
        pod_exec: &failing,
    };
    plan.status = first;
    let err = workflow
        .execute(&plan, &meta)
        .await
        .expect_err("copy failure is fatal");

    assert!(err.source.is_fatal());
    assert_eq!(err.status.status, ExecutionStatus::FatalError);
}

#[tokio::test]
async fn oversized_pipe_file_is_fatal() {
    let ov = pipe_ov("Secret");
    let inst = scheduled_instance("deploy", &ov);
    let collab = Collaborators {
        pod_exec: ScriptedPodExec::new()
            .with_file("/certs/cert.pem", vec![0u8; MAX_PIPE_FILE_BYTES + 1]),
        ..Collaborators::default()
    };
    let meta = metadata(&ov);

    let mut plan = active_plan("deploy", &inst, &ov);
    let first = collab
        .workflow()
        .execute(&plan, &meta)
        .await
        .expect("first pass");
    mark_pod_succeeded(&collab.client);

    plan.status = first;
    let err = collab
        .workflow()
        .execute(&plan, &meta)
        .await
        .expect_err("oversized file is fatal");

    assert!(err.source.is_fatal());
    assert_eq!(err.status.status, ExecutionStatus::FatalError);
    assert!(err.source.to_string().contains("exceeds"));
}
