//! Admission validation: the pre-commit gate for instance updates.
//!
//! [`validate_transition`] runs synchronously when a client attempts to
//! write a new instance spec, before anything is persisted. It classifies
//! the proposed transition along five axes (plan already scheduled,
//! parameter update, upgrade, novel direct plan request, plan
//! override/cancellation) and rejects any combination where two axes would
//! race for the single plan execution slot. Rejections never reach the
//! reconciler; the reason is returned synchronously to the writer.

use crate::error::{EngineError, Result};
use crate::models::{Instance, OperatorVersion};
use crate::params;
use crate::selection::{self, DEPLOY_PLAN, UPDATE_PLAN, UPGRADE_PLAN};

/// Validates a proposed instance update and resolves the plan it triggers.
///
/// Returns the name of the plan the update should schedule, or `None` when
/// nothing should be triggered. `ov` is the operator version the *new* spec
/// references.
pub fn validate_transition(
    old: &Instance,
    new: &Instance,
    ov: &OperatorVersion,
) -> Result<Option<String>> {
    let active_plan = old.scheduled_plan();
    let execution_changed = new.spec.plan_execution != old.spec.plan_execution;
    let is_param_update = new.spec.parameters != old.spec.parameters;
    let is_upgrade = new.spec.operator_version != old.spec.operator_version;

    // Overriding or cancelling a plan that still holds the execution slot is
    // categorically unsupported.
    if let Some(active) = active_plan {
        if execution_changed {
            if new.spec.plan_execution.plan_name.is_none() {
                return Err(EngineError::validation(format!(
                    "cancelling the scheduled plan \"{active}\" is not supported"
                )));
            }
            return Err(EngineError::validation(format!(
                "overriding the scheduled plan \"{active}\" is not supported"
            )));
        }
    }

    // A direct plan request is only novel once no plan holds the slot.
    let direct_request = if execution_changed {
        new.spec.plan_execution.plan_name.as_deref()
    } else {
        None
    };

    if is_upgrade {
        if let Some(active) = active_plan {
            return Err(EngineError::validation(format!(
                "upgrade requested while plan \"{active}\" is scheduled"
            )));
        }
        if direct_request.is_some() {
            return Err(EngineError::validation(
                "upgrade cannot be combined with a direct plan request",
            ));
        }
        let plan = ov
            .first_declared_plan(&[UPGRADE_PLAN, UPDATE_PLAN, DEPLOY_PLAN])
            .ok_or_else(|| {
                EngineError::validation(format!(
                    "operator version \"{}\" declares no upgrade, update or deploy plan",
                    ov.name
                ))
            })?;
        log::debug!(
            "instance \"{}\": upgrade admitted, triggering plan \"{plan}\"",
            new.name
        );
        return Ok(Some(plan));
    }

    if is_param_update {
        let diff = params::diff(&old.spec.parameters, &new.spec.parameters);
        let triggered = selection::resolve_trigger_plan(&diff, ov)
            .map_err(|e| EngineError::validation(e.to_string()))?;
        if let Some(active) = active_plan {
            if triggered != active {
                return Err(EngineError::validation(format!(
                    "parameter update triggers plan \"{triggered}\" while plan \
                     \"{active}\" is scheduled"
                )));
            }
        }
        if let Some(requested) = direct_request {
            if requested != triggered {
                return Err(EngineError::validation(format!(
                    "parameter update triggers plan \"{triggered}\" but plan \
                     \"{requested}\" was requested directly"
                )));
            }
        }
        return Ok(Some(triggered));
    }

    if let Some(requested) = direct_request {
        if !ov.has_plan(requested) {
            return Err(EngineError::validation(format!(
                "requested plan \"{requested}\" is not declared by operator version \"{}\"",
                ov.name
            )));
        }
        return Ok(Some(requested.to_string()));
    }

    Ok(None)
}
