//! Instance model: one deployed application and its plan execution state.
//!
//! An [`Instance`] references an [`OperatorVersion`](super::OperatorVersion),
//! overrides parameters and carries the per-plan status trees. A serialized
//! snapshot of the previously-observed spec rides along as metadata so plan
//! selection can diff "what changed since the last reconciliation" even
//! across controller restarts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::status::{AggregatedStatus, ExecutionStatus, PlanStatus};
use super::OperatorVersion;
use crate::error::Result;

/// A deployed, user-facing application resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Instance {
    /// Name of the instance resource
    pub name: String,

    /// Namespace the instance lives in
    pub namespace: String,

    /// Deletion marker; when set, only the cleanup plan may be selected
    #[serde(default)]
    pub deletion_pending: bool,

    /// Serialized snapshot of the previously-observed spec, written at
    /// plan-trigger time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec_snapshot: Option<String>,

    /// Desired state
    pub spec: InstanceSpec,

    /// Observed state
    #[serde(default)]
    pub status: InstanceStatus,
}

/// Desired state of an instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct InstanceSpec {
    /// Name of the referenced operator version
    pub operator_version: String,

    /// Parameter overrides applied on top of the operator version defaults
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,

    /// The plan execution currently requested for this instance
    #[serde(default)]
    pub plan_execution: PlanExecution,
}

/// The requested plan execution: which plan should hold the execution slot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PlanExecution {
    /// Name of the plan to run, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_name: Option<String>,

    /// Unique id minted when the plan was scheduled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

/// Observed state of an instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct InstanceStatus {
    /// Plan name → status tree for that plan
    #[serde(default)]
    pub plan_status: BTreeMap<String, PlanStatus>,

    /// Aggregated current status and active plan name
    #[serde(default)]
    pub aggregated: AggregatedStatus,
}

impl Instance {
    /// Returns the status tree of the named plan, if it exists.
    pub fn plan_status(&self, plan_name: &str) -> Option<&PlanStatus> {
        self.status.plan_status.get(plan_name)
    }

    /// Mutable variant of [`Instance::plan_status`].
    pub fn plan_status_mut(&mut self, plan_name: &str) -> Option<&mut PlanStatus> {
        self.status.plan_status.get_mut(plan_name)
    }

    /// Whether no plan has ever been scheduled for this instance: the status
    /// map is empty or every plan is still `NeverRun`.
    pub fn no_plan_ever_executed(&self) -> bool {
        self.status
            .plan_status
            .values()
            .all(|ps| ps.status == ExecutionStatus::NeverRun)
    }

    /// Returns the name of the plan currently running, if any.
    pub fn plan_in_progress(&self) -> Option<&str> {
        self.status
            .plan_status
            .values()
            .find(|ps| ps.status.is_running())
            .map(|ps| ps.name.as_str())
    }

    /// The plan the spec currently asks to run, together with its status
    /// tree. A scheduled plan whose tree is already terminal no longer holds
    /// the execution slot.
    pub fn scheduled_plan(&self) -> Option<&str> {
        let name = self.spec.plan_execution.plan_name.as_deref()?;
        match self.plan_status(name) {
            Some(ps) if ps.status.is_terminal() => None,
            _ => Some(name),
        }
    }

    /// Ensures a status tree exists for every plan the operator version
    /// declares, seeding missing trees to `NeverRun`. Existing trees are
    /// left untouched.
    pub fn ensure_plan_statuses(&mut self, ov: &OperatorVersion) {
        for (name, plan) in &ov.plans {
            self.status
                .plan_status
                .entry(name.clone())
                .or_insert_with(|| PlanStatus::seeded(name.clone(), plan));
        }
    }

    /// Schedules `plan_name` for execution: seeds/resets its status tree to
    /// `Pending`, attaches the execution id, points the aggregated status and
    /// the spec's plan execution at it, and overwrites the spec snapshot so
    /// the next reconciliation diffs against this point.
    ///
    /// History of other, unrelated plans is preserved.
    pub fn start_plan_execution(
        &mut self,
        plan_name: &str,
        uid: &str,
        ov: &OperatorVersion,
    ) -> Result<()> {
        self.ensure_plan_statuses(ov);
        if let Some(plan) = ov.plans.get(plan_name) {
            // Re-seed from the current plan shape so a changed operator
            // version cannot leave a stale tree behind.
            let mut tree = PlanStatus::seeded(plan_name.to_string(), plan);
            tree.reset_to_pending(uid);
            self.status.plan_status.insert(plan_name.to_string(), tree);
        }
        self.spec.plan_execution = PlanExecution {
            plan_name: Some(plan_name.to_string()),
            uid: Some(uid.to_string()),
        };
        self.status.aggregated = AggregatedStatus {
            status: ExecutionStatus::Pending,
            active_plan_name: Some(plan_name.to_string()),
        };
        self.save_snapshot()
    }

    /// Stores the updated status tree for a plan after an execution pass and
    /// refreshes the aggregated view.
    pub fn update_plan_status(&mut self, status: PlanStatus) {
        self.status.aggregated = AggregatedStatus {
            status: status.status,
            active_plan_name: if status.status.is_terminal() {
                None
            } else {
                Some(status.name.clone())
            },
        };
        self.status.plan_status.insert(status.name.clone(), status);
    }

    /// Serializes the current spec into the snapshot slot.
    pub fn save_snapshot(&mut self) -> Result<()> {
        self.spec_snapshot = Some(serde_json::to_string(&self.spec)?);
        Ok(())
    }

    /// Deserializes the previously-observed spec, if one was persisted.
    pub fn snapshot_spec(&self) -> Result<Option<InstanceSpec>> {
        match &self.spec_snapshot {
            Some(raw) => Ok(Some(serde_json::from_str(raw)?)),
            None => Ok(None),
        }
    }
}
