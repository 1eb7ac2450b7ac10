//! Shared fixtures for the integration tests.

use std::collections::BTreeMap;

use rollout_core::engine::{ActivePlan, Workflow};
use rollout_core::meta::Metadata;
use rollout_core::models::{
    Instance, InstanceSpec, InstanceStatus, OperatorVersion, Parameter, Phase, Plan,
    PlanExecution, Step, Strategy, TaskSpec,
};
use rollout_core::params;
use rollout_core::task::pipes_map;
use rollout_core::testing::{
    InMemoryClient, PassthroughEnhancer, ScriptedPodExec, SubstitutionRenderer,
};

/// Owns the collaborator fakes a [`Workflow`] borrows from.
#[derive(Default)]
pub struct Collaborators {
    pub client: InMemoryClient,
    pub enhancer: PassthroughEnhancer,
    pub renderer: SubstitutionRenderer,
    pub pod_exec: ScriptedPodExec,
}

impl Collaborators {
    pub fn workflow(&self) -> Workflow<'_> {
        Workflow {
            client: &self.client,
            enhancer: &self.enhancer,
            renderer: &self.renderer,
            pod_exec: &self.pod_exec,
        }
    }
}

/// A Dummy task spec with the given behavior.
pub fn dummy(done: bool, want_err: bool, fatal: bool) -> TaskSpec {
    TaskSpec {
        kind: "Dummy".to_string(),
        spec: serde_json::json!({"done": done, "want_err": want_err, "fatal": fatal}),
    }
}

/// A plan of one serial phase holding the given steps.
pub fn serial_plan(steps: Vec<Step>) -> Plan {
    Plan {
        strategy: Strategy::Serial,
        phases: vec![Phase {
            name: "main".to_string(),
            strategy: Strategy::Serial,
            steps,
        }],
    }
}

pub fn step(name: &str, tasks: &[&str]) -> Step {
    Step {
        name: name.to_string(),
        tasks: tasks.iter().map(|t| (*t).to_string()).collect(),
    }
}

/// An operator version with the given plans and tasks and no parameters.
pub fn operator_version(plans: Vec<(&str, Plan)>, tasks: Vec<(&str, TaskSpec)>) -> OperatorVersion {
    OperatorVersion {
        name: "test-operator-1.0".to_string(),
        namespace: "default".to_string(),
        operator_name: "test-operator".to_string(),
        version: "1.0.0".to_string(),
        plans: plans
            .into_iter()
            .map(|(n, p)| (n.to_string(), p))
            .collect(),
        parameters: BTreeMap::new(),
        tasks: tasks
            .into_iter()
            .map(|(n, t)| (n.to_string(), t))
            .collect(),
        templates: BTreeMap::new(),
    }
}

/// Declares a parameter on the operator version.
pub fn declare_parameter(ov: &mut OperatorVersion, name: &str, parameter: Parameter) {
    ov.parameters.insert(name.to_string(), parameter);
}

/// A fresh instance referencing the operator version.
pub fn instance(ov: &OperatorVersion) -> Instance {
    Instance {
        name: "app".to_string(),
        namespace: "default".to_string(),
        deletion_pending: false,
        spec_snapshot: None,
        spec: InstanceSpec {
            operator_version: ov.name.clone(),
            parameters: BTreeMap::new(),
            plan_execution: PlanExecution::default(),
        },
        status: InstanceStatus::default(),
    }
}

/// Instance-level execution metadata matching [`instance`].
pub fn metadata(ov: &OperatorVersion) -> Metadata {
    Metadata {
        instance_name: "app".to_string(),
        instance_namespace: "default".to_string(),
        operator_name: ov.operator_name.clone(),
        operator_version_name: ov.name.clone(),
        operator_version: ov.version.clone(),
    }
}

/// Resolves an [`ActivePlan`] for one plan of the operator version, with the
/// instance's plan status tree as the starting point.
pub fn active_plan(plan_name: &str, inst: &Instance, ov: &OperatorVersion) -> ActivePlan {
    let spec = ov.plans.get(plan_name).expect("plan declared").clone();
    let status = inst
        .plan_status(plan_name)
        .expect("plan status seeded")
        .clone();
    let parameters =
        params::merge(&ov.parameters, &inst.spec.parameters).expect("merge parameters");
    let pipes =
        pipes_map(plan_name, &spec, &ov.tasks, &metadata(ov)).expect("pipes map");
    ActivePlan {
        name: plan_name.to_string(),
        spec,
        status,
        tasks: ov.tasks.clone(),
        templates: ov.templates.clone(),
        parameters,
        pipes,
    }
}

/// Creates an instance with `plan_name` scheduled and ready to execute.
pub fn scheduled_instance(plan_name: &str, ov: &OperatorVersion) -> Instance {
    let mut inst = instance(ov);
    inst.start_plan_execution(plan_name, "test-uid", ov)
        .expect("schedule plan");
    inst
}
