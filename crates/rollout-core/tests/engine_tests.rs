//! Integration tests for the workflow execution engine.

mod common;

use common::{
    active_plan, dummy, metadata, operator_version, scheduled_instance, serial_plan, step,
    Collaborators,
};
use rollout_core::models::{ExecutionStatus, Phase, Plan, Strategy, TaskSpec};

#[tokio::test]
async fn one_step_plan_with_not_done_task_stays_in_progress() {
    let ov = operator_version(
        vec![("deploy", serial_plan(vec![step("everything", &["main"])]))],
        vec![("main", dummy(false, false, false))],
    );
    let inst = scheduled_instance("deploy", &ov);
    let collab = Collaborators::default();

    let status = collab
        .workflow()
        .execute(&active_plan("deploy", &inst, &ov), &metadata(&ov))
        .await
        .expect("execute");

    assert_eq!(status.status, ExecutionStatus::InProgress);
    assert_eq!(status.phases[0].status, ExecutionStatus::InProgress);
    assert_eq!(status.phases[0].steps[0].status, ExecutionStatus::InProgress);
}

#[tokio::test]
async fn one_step_plan_with_done_task_completes() {
    let ov = operator_version(
        vec![("deploy", serial_plan(vec![step("everything", &["main"])]))],
        vec![("main", dummy(true, false, false))],
    );
    let inst = scheduled_instance("deploy", &ov);
    let collab = Collaborators::default();

    let status = collab
        .workflow()
        .execute(&active_plan("deploy", &inst, &ov), &metadata(&ov))
        .await
        .expect("execute");

    assert_eq!(status.status, ExecutionStatus::Complete);
    assert_eq!(status.phases[0].status, ExecutionStatus::Complete);
    assert_eq!(status.phases[0].steps[0].status, ExecutionStatus::Complete);
}

#[tokio::test]
async fn fatal_task_marks_every_level_fatal() {
    let ov = operator_version(
        vec![("deploy", serial_plan(vec![step("everything", &["main"])]))],
        vec![("main", dummy(false, true, true))],
    );
    let inst = scheduled_instance("deploy", &ov);
    let collab = Collaborators::default();

    let err = collab
        .workflow()
        .execute(&active_plan("deploy", &inst, &ov), &metadata(&ov))
        .await
        .expect_err("fatal task");

    let status = &err.status;
    assert_eq!(status.status, ExecutionStatus::FatalError);
    assert_eq!(status.phases[0].status, ExecutionStatus::FatalError);
    assert_eq!(status.phases[0].steps[0].status, ExecutionStatus::FatalError);
    assert!(status.message.as_deref().is_some_and(|m| m.contains("main")));
}

#[tokio::test]
async fn transient_task_error_marks_only_the_step() {
    let ov = operator_version(
        vec![("deploy", serial_plan(vec![step("everything", &["main"])]))],
        vec![("main", dummy(false, true, false))],
    );
    let inst = scheduled_instance("deploy", &ov);
    let collab = Collaborators::default();

    let status = collab
        .workflow()
        .execute(&active_plan("deploy", &inst, &ov), &metadata(&ov))
        .await
        .expect("transient errors are not hard failures");

    assert_eq!(status.status, ExecutionStatus::InProgress);
    assert_eq!(status.phases[0].status, ExecutionStatus::InProgress);
    assert_eq!(status.phases[0].steps[0].status, ExecutionStatus::Error);
    assert!(status.phases[0].steps[0]
        .message
        .as_deref()
        .is_some_and(|m| m.contains("will retry")));
}

#[tokio::test]
async fn terminal_plan_is_returned_unchanged_without_running_tasks() {
    // The referenced task kind is unknown: executing it would fail fatally,
    // so an unchanged result proves no task was ever built.
    let ov = operator_version(
        vec![("deploy", serial_plan(vec![step("everything", &["main"])]))],
        vec![(
            "main",
            TaskSpec {
                kind: "Exotic".to_string(),
                spec: serde_json::Value::Null,
            },
        )],
    );
    let mut inst = scheduled_instance("deploy", &ov);
    inst.plan_status_mut("deploy")
        .expect("deploy status")
        .set(ExecutionStatus::Complete);

    let plan = active_plan("deploy", &inst, &ov);
    let collab = Collaborators::default();
    let status = collab
        .workflow()
        .execute(&plan, &metadata(&ov))
        .await
        .expect("terminal no-op");

    assert_eq!(status, plan.status);
}

#[tokio::test]
async fn serial_phase_blocks_later_steps_within_a_pass() {
    let ov = operator_version(
        vec![(
            "deploy",
            serial_plan(vec![
                step("first", &["stuck"]),
                step("second", &["boom"]),
            ]),
        )],
        vec![
            ("stuck", dummy(false, false, false)),
            // Would fail fatally if the engine reached it.
            ("boom", dummy(false, true, true)),
        ],
    );
    let inst = scheduled_instance("deploy", &ov);
    let collab = Collaborators::default();

    let status = collab
        .workflow()
        .execute(&active_plan("deploy", &inst, &ov), &metadata(&ov))
        .await
        .expect("second step never runs");

    assert_eq!(status.phases[0].steps[0].status, ExecutionStatus::InProgress);
    assert_eq!(status.phases[0].steps[1].status, ExecutionStatus::Pending);
}

#[tokio::test]
async fn parallel_phase_advances_later_steps_past_a_stuck_one() {
    let plan = Plan {
        strategy: Strategy::Serial,
        phases: vec![Phase {
            name: "main".to_string(),
            strategy: Strategy::Parallel,
            steps: vec![step("first", &["stuck"]), step("second", &["ok"])],
        }],
    };
    let ov = operator_version(
        vec![("deploy", plan)],
        vec![
            ("stuck", dummy(false, false, false)),
            ("ok", dummy(true, false, false)),
        ],
    );
    let inst = scheduled_instance("deploy", &ov);
    let collab = Collaborators::default();

    let status = collab
        .workflow()
        .execute(&active_plan("deploy", &inst, &ov), &metadata(&ov))
        .await
        .expect("execute");

    assert_eq!(status.status, ExecutionStatus::InProgress);
    assert_eq!(status.phases[0].steps[0].status, ExecutionStatus::InProgress);
    assert_eq!(status.phases[0].steps[1].status, ExecutionStatus::Complete);
}

#[tokio::test]
async fn fatal_error_wins_over_parallel_strategy() {
    let plan = Plan {
        strategy: Strategy::Parallel,
        phases: vec![Phase {
            name: "main".to_string(),
            strategy: Strategy::Parallel,
            steps: vec![step("first", &["boom"]), step("second", &["ok"])],
        }],
    };
    let ov = operator_version(
        vec![("deploy", plan)],
        vec![
            ("boom", dummy(false, true, true)),
            ("ok", dummy(true, false, false)),
        ],
    );
    let inst = scheduled_instance("deploy", &ov);
    let collab = Collaborators::default();

    let err = collab
        .workflow()
        .execute(&active_plan("deploy", &inst, &ov), &metadata(&ov))
        .await
        .expect_err("fatal halts the whole plan");

    assert_eq!(err.status.status, ExecutionStatus::FatalError);
    // The sibling step was never reached despite the parallel strategy.
    assert_eq!(err.status.phases[0].steps[1].status, ExecutionStatus::Pending);
}

#[tokio::test]
async fn serial_plan_blocks_later_phases_until_the_first_completes() {
    let plan = Plan {
        strategy: Strategy::Serial,
        phases: vec![
            Phase {
                name: "one".to_string(),
                strategy: Strategy::Serial,
                steps: vec![step("first", &["stuck"])],
            },
            Phase {
                name: "two".to_string(),
                strategy: Strategy::Serial,
                steps: vec![step("second", &["ok"])],
            },
        ],
    };
    let ov = operator_version(
        vec![("deploy", plan)],
        vec![
            ("stuck", dummy(false, false, false)),
            ("ok", dummy(true, false, false)),
        ],
    );
    let inst = scheduled_instance("deploy", &ov);
    let collab = Collaborators::default();

    let status = collab
        .workflow()
        .execute(&active_plan("deploy", &inst, &ov), &metadata(&ov))
        .await
        .expect("execute");

    assert_eq!(status.phases[0].status, ExecutionStatus::InProgress);
    assert_eq!(status.phases[1].status, ExecutionStatus::Pending);
}

#[tokio::test]
async fn execute_is_idempotent_across_passes() {
    let ov = operator_version(
        vec![("deploy", serial_plan(vec![step("everything", &["main"])]))],
        vec![("main", dummy(false, false, false))],
    );
    let inst = scheduled_instance("deploy", &ov);
    let collab = Collaborators::default();
    let meta = metadata(&ov);

    let mut plan = active_plan("deploy", &inst, &ov);
    let first = collab
        .workflow()
        .execute(&plan, &meta)
        .await
        .expect("first pass");

    plan.status = first.clone();
    let second = collab
        .workflow()
        .execute(&plan, &meta)
        .await
        .expect("second pass");

    assert_eq!(first.status, second.status);
    assert_eq!(
        first.phases[0].steps[0].status,
        second.phases[0].steps[0].status
    );
}

#[tokio::test]
async fn missing_task_definition_is_fatal() {
    let ov = operator_version(
        vec![("deploy", serial_plan(vec![step("everything", &["ghost"])]))],
        vec![],
    );
    let inst = scheduled_instance("deploy", &ov);
    let collab = Collaborators::default();

    let err = collab
        .workflow()
        .execute(&active_plan("deploy", &inst, &ov), &metadata(&ov))
        .await
        .expect_err("missing task");

    assert!(err.source.is_fatal());
    assert_eq!(err.status.status, ExecutionStatus::FatalError);
}

#[tokio::test]
async fn missing_phase_status_is_fatal() {
    let ov = operator_version(
        vec![("deploy", serial_plan(vec![step("everything", &["main"])]))],
        vec![("main", dummy(true, false, false))],
    );
    let inst = scheduled_instance("deploy", &ov);
    let mut plan = active_plan("deploy", &inst, &ov);
    plan.status.phases.clear();

    let collab = Collaborators::default();
    let err = collab
        .workflow()
        .execute(&plan, &metadata(&ov))
        .await
        .expect_err("shape mismatch");

    assert_eq!(err.status.status, ExecutionStatus::FatalError);
    assert!(err.source.to_string().contains("phase"));
}
