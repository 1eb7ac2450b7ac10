//! Readiness predicates for applied resources.
//!
//! The Apply task reports done only once every applied object is healthy.
//! Kinds with a known controller semantics are checked against their runtime
//! status; any other kind is treated as healthy the moment it exists.

use serde_json::Value;

use crate::resource::ResourceObject;

/// Whether the observed object satisfies its kind's readiness condition.
pub fn is_healthy(object: &ResourceObject) -> bool {
    let value = object.value();
    match object.kind() {
        "Deployment" => {
            let desired = replicas(value);
            ready_count(value, "readyReplicas") >= desired
                && ready_count(value, "updatedReplicas") >= desired
        }
        "StatefulSet" => ready_count(value, "readyReplicas") >= replicas(value),
        "ReplicaSet" => ready_count(value, "readyReplicas") >= replicas(value),
        "Job" => ready_count(value, "succeeded") >= 1,
        "Pod" => pod_ready(value),
        // No known health predicate: healthy immediately.
        _ => true,
    }
}

fn replicas(value: &Value) -> u64 {
    value
        .pointer("/spec/replicas")
        .and_then(Value::as_u64)
        .unwrap_or(1)
}

fn ready_count(value: &Value, field: &str) -> u64 {
    value
        .pointer(&format!("/status/{field}"))
        .and_then(Value::as_u64)
        .unwrap_or(0)
}

fn pod_ready(value: &Value) -> bool {
    match value.pointer("/status/phase").and_then(Value::as_str) {
        Some("Succeeded") => true,
        Some("Running") => value
            .pointer("/status/conditions")
            .and_then(Value::as_array)
            .is_some_and(|conditions| {
                conditions.iter().any(|c| {
                    c.get("type").and_then(Value::as_str) == Some("Ready")
                        && c.get("status").and_then(Value::as_str) == Some("True")
                })
            }),
        _ => false,
    }
}
