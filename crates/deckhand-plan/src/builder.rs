//! Builds the deployment plan for a service.
//!
//! One phase per pod type, one deployment step per pod instance. Problems
//! with a single pod are attached to its steps as validation errors, so the
//! rest of the plan still deploys.

use std::collections::HashSet;
use std::sync::Arc;

use deckhand_core::config::PodConfig;
use deckhand_core::{GoalState, PodInstance, PodInstanceRequirement, ServiceConfig};
use tracing::{info, warn};

use crate::deployment::DeploymentStep;
use crate::error::{PlanError, PlanResult};
use crate::phase::{Phase, Plan};
use crate::status::Status;
use crate::strategy;

/// Name of the plan built from a service configuration.
pub const DEPLOY_PLAN: &str = "deploy";

pub struct PlanBuilder<'a> {
    config: &'a ServiceConfig,
}

impl<'a> PlanBuilder<'a> {
    pub fn new(config: &'a ServiceConfig) -> Self {
        Self { config }
    }

    pub fn build(&self) -> PlanResult<Plan> {
        let service = &self.config.service.name;
        if self.config.pods.is_empty() {
            return Err(PlanError::NoPods(service.clone()));
        }

        let mut seen = HashSet::new();
        let mut phases = Vec::with_capacity(self.config.pods.len());
        for pod in &self.config.pods {
            if !seen.insert(pod.pod_type.as_str()) {
                return Err(PlanError::DuplicateElement {
                    parent: DEPLOY_PLAN.to_string(),
                    name: pod.pod_type.clone(),
                });
            }
            phases.push(Arc::new(build_phase(pod)));
        }

        let plan = Plan::new(
            DEPLOY_PLAN,
            phases,
            strategy::from_kind(self.config.plan_strategy()),
        );
        info!(
            %service,
            phases = plan.phases().len(),
            steps = plan.steps().count(),
            "deployment plan built"
        );
        Ok(plan)
    }
}

fn build_phase(pod: &PodConfig) -> Phase {
    let errors = validate_pod(pod);
    for error in &errors {
        warn!(pod = %pod.pod_type, %error, "pod validation failed");
    }

    let steps = pod
        .instances()
        .into_iter()
        .map(|instance| Arc::new(build_step(pod, instance, &errors)))
        .collect();

    Phase::new(
        &pod.pod_type,
        steps,
        strategy::from_kind(pod.strategy.unwrap_or_default()),
    )
}

fn build_step(pod: &PodConfig, instance: PodInstance, errors: &[String]) -> DeploymentStep {
    let name = step_name(&instance);
    let mut requirement = PodInstanceRequirement::new(instance);
    if let Some(env) = &pod.env {
        requirement.environment = env.clone();
    }

    let status = if errors.is_empty() {
        Status::Pending
    } else {
        Status::Error
    };
    DeploymentStep::new(&name, status, requirement, errors.to_vec())
}

/// `{pod}-{index}:[{task},{task}]`
pub fn step_name(instance: &PodInstance) -> String {
    let tasks: Vec<&str> = instance.tasks.iter().map(|t| t.name.as_str()).collect();
    format!("{}:[{}]", instance.name(), tasks.join(","))
}

fn validate_pod(pod: &PodConfig) -> Vec<String> {
    let mut errors = Vec::new();

    if pod.tasks.is_empty() {
        errors.push(format!("pod '{}' defines no tasks", pod.pod_type));
    }

    let mut names = HashSet::new();
    for task in pod.task_specs() {
        if !names.insert(task.name.clone()) {
            errors.push(format!(
                "pod '{}' defines task '{}' more than once",
                pod.pod_type, task.name
            ));
        }
        if task.goal == GoalState::Finished && task.readiness_check.is_some() {
            errors.push(format!(
                "task '{}' in pod '{}' has a readiness check but goal state {}",
                task.name,
                pod.pod_type,
                GoalState::Finished
            ));
        }
    }

    errors
}
