//! Plan selection: which plan, if any, should begin on this reconciliation.
//!
//! Decision order (first match wins): deletion cleanup, never-start-while-
//! running, first-ever deploy, operator-version upgrade, parameter-triggered
//! plans. Selecting a plan is separated from scheduling it:
//! [`select_plan`] is a pure decision over the instance's history, while
//! [`schedule_plan`] performs the side effects (status reseed, fresh
//! execution id, spec snapshot).

use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::models::{Instance, OperatorVersion};
use crate::params::{self, ParameterDiff};

/// Name of the plan run on first deployment.
pub const DEPLOY_PLAN: &str = "deploy";

/// Name of the plan run when the operator version reference changes.
pub const UPGRADE_PLAN: &str = "upgrade";

/// Name of the fallback plan for parameter updates.
pub const UPDATE_PLAN: &str = "update";

/// Name of the plan run when the instance is being deleted.
pub const CLEANUP_PLAN: &str = "cleanup";

/// Decides which plan (if any) should begin for this instance.
///
/// Never selects while another plan is running; on a fresh instance the
/// deploy plan is selected unconditionally; otherwise the persisted spec
/// snapshot is diffed against the live spec to detect upgrades and parameter
/// changes.
pub fn select_plan(instance: &Instance, ov: &OperatorVersion) -> Result<Option<String>> {
    if instance.deletion_pending {
        return Ok(cleanup_plan(instance, ov));
    }

    if let Some(running) = instance.plan_in_progress() {
        log::debug!(
            "instance \"{}\": plan \"{running}\" is active, selecting nothing",
            instance.name
        );
        return Ok(None);
    }

    if instance.no_plan_ever_executed() {
        if !ov.has_plan(DEPLOY_PLAN) {
            return Err(EngineError::fatal(format!(
                "operator version \"{}\" does not declare a \"{DEPLOY_PLAN}\" plan",
                ov.name
            )));
        }
        return Ok(Some(DEPLOY_PLAN.to_string()));
    }

    let Some(previous) = instance.snapshot_spec()? else {
        // Nothing to diff against; the snapshot is rewritten at the next
        // plan trigger.
        return Ok(None);
    };

    if previous.operator_version != instance.spec.operator_version {
        let plan = ov
            .first_declared_plan(&[UPGRADE_PLAN, UPDATE_PLAN, DEPLOY_PLAN])
            .ok_or_else(|| {
                EngineError::fatal(format!(
                    "operator version \"{}\" declares no upgrade, update or deploy plan",
                    ov.name
                ))
            })?;
        return Ok(Some(plan));
    }

    let diff = params::diff(&previous.parameters, &instance.spec.parameters);
    if !diff.is_empty() {
        return resolve_trigger_plan(&diff, ov).map(Some);
    }

    Ok(None)
}

/// Schedules the selected plan: reseeds its status tree to `Pending`, mints
/// a fresh execution id, points the spec's plan execution at it and
/// overwrites the spec snapshot.
pub fn schedule_plan(instance: &mut Instance, plan_name: &str, ov: &OperatorVersion) -> Result<()> {
    let uid = Uuid::new_v4().to_string();
    log::debug!(
        "instance \"{}\": scheduling plan \"{plan_name}\" with execution id {uid}",
        instance.name
    );
    instance.start_plan_execution(plan_name, &uid, ov)
}

/// Resolves the plan a parameter change triggers.
///
/// Changed parameters naming distinct trigger plans conflict and error out;
/// parameters without an explicit trigger fall back to the update plan, then
/// the deploy plan.
pub fn resolve_trigger_plan(diff: &ParameterDiff, ov: &OperatorVersion) -> Result<String> {
    let mut triggers: Vec<&str> = diff
        .names()
        .into_iter()
        .filter_map(|name| {
            ov.parameters
                .get(name)
                .and_then(|p| p.trigger.as_deref())
        })
        .collect();
    triggers.sort_unstable();
    triggers.dedup();

    match triggers.as_slice() {
        [] => ov
            .first_declared_plan(&[UPDATE_PLAN, DEPLOY_PLAN])
            .ok_or_else(|| {
                EngineError::fatal(format!(
                    "operator version \"{}\" declares neither an update nor a deploy plan",
                    ov.name
                ))
            }),
        [single] => {
            if !ov.has_plan(single) {
                return Err(EngineError::fatal(format!(
                    "parameter trigger names undeclared plan \"{single}\""
                )));
            }
            Ok((*single).to_string())
        }
        conflicting => Err(EngineError::fatal(format!(
            "changed parameters trigger conflicting plans: {}",
            conflicting.join(", ")
        ))),
    }
}

fn cleanup_plan(instance: &Instance, ov: &OperatorVersion) -> Option<String> {
    if !ov.has_plan(CLEANUP_PLAN) {
        return None;
    }
    match instance.plan_status(CLEANUP_PLAN) {
        // Already running or already finished: leave it alone.
        Some(ps) if ps.status.is_running() || ps.status.is_terminal() => None,
        _ => Some(CLEANUP_PLAN.to_string()),
    }
}
