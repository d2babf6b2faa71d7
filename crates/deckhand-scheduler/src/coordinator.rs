//! Plan coordinator: runs offer passes over a deployment plan.
//!
//! Each pass walks the plan top down: the plan's strategy picks phases, each
//! phase's strategy picks steps, and every picked step is started, matched
//! against offers through the [`OfferEvaluator`], and told the outcome.
//!
//! Names claimed during a pass are added to the pass's dirty set, so no two
//! candidates in one pass act on the same element.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use deckhand_core::ServiceConfig;
use deckhand_plan::{DeploymentStep, Element, ParentElement, Plan, PlanBuilder, Status, Step};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::error::SchedulerResult;
use crate::evaluator::OfferEvaluator;

/// What happened during one offer pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    /// Steps whose requirement was evaluated, in visit order.
    pub evaluated: Vec<String>,
    /// Steps that received at least one launch.
    pub launched: Vec<String>,
    /// Steps whose evaluation failed and were left untouched.
    pub failed: Vec<String>,
}

pub struct PlanCoordinator {
    plan: Arc<Plan>,
}

impl PlanCoordinator {
    pub fn new(plan: Arc<Plan>) -> Self {
        Self { plan }
    }

    /// Build the deployment plan for `config` and coordinate it.
    pub fn from_config(config: &ServiceConfig) -> SchedulerResult<Self> {
        let plan = PlanBuilder::new(config).build()?;
        Ok(Self::new(Arc::new(plan)))
    }

    pub fn plan(&self) -> &Arc<Plan> {
        &self.plan
    }

    pub fn status(&self) -> Status {
        self.plan.status()
    }

    /// Steps eligible to run now.
    ///
    /// `dirty` names elements already claimed outside this plan; it is copied,
    /// and the copy grows as steps are picked.
    pub fn candidate_steps(&self, dirty: &HashSet<String>) -> Vec<Arc<DeploymentStep>> {
        let mut claimed = dirty.clone();
        let mut steps = Vec::new();

        for phase in self.plan.candidates(&claimed) {
            for step in phase.candidates(&claimed) {
                claimed.insert(step.name().to_string());
                steps.push(step);
            }
        }

        debug!(
            plan = %self.plan.name(),
            candidates = steps.len(),
            "collected candidate steps"
        );
        steps
    }

    /// Run one offer pass.
    pub fn run_pass(&self, evaluator: &dyn OfferEvaluator, dirty: &HashSet<String>) -> PassReport {
        let mut report = PassReport::default();

        for step in self.candidate_steps(dirty) {
            let Some(requirement) = step.start() else {
                continue;
            };
            report.evaluated.push(step.name().to_string());

            match evaluator.evaluate(&requirement) {
                Ok(recommendations) => {
                    if recommendations.iter().any(|r| r.launched_task().is_some()) {
                        report.launched.push(step.name().to_string());
                    }
                    step.update_offer_status(&recommendations);
                }
                Err(e) => {
                    warn!(step = %step.name(), error = %e, "offer evaluation failed");
                    report.failed.push(step.name().to_string());
                }
            }
        }

        if !report.evaluated.is_empty() {
            info!(
                plan = %self.plan.name(),
                evaluated = report.evaluated.len(),
                launched = report.launched.len(),
                failed = report.failed.len(),
                status = %self.plan.status(),
                "offer pass finished"
            );
        }
        report
    }

    /// Run offer passes every `interval` until shutdown.
    ///
    /// Keeps running after the plan completes: a later task failure sends
    /// steps back to `Pending`, and the next pass re-offers them.
    pub async fn run(
        &self,
        evaluator: Arc<dyn OfferEvaluator>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(
            plan = %self.plan.name(),
            interval_ms = interval.as_millis() as u64,
            "plan coordinator started"
        );

        let mut complete = false;
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    let report = self.run_pass(evaluator.as_ref(), &HashSet::new());
                    if !report.failed.is_empty() {
                        error!(failed = ?report.failed, "steps failed offer evaluation");
                    }

                    let now_complete = self.plan.is_complete();
                    if now_complete && !complete {
                        info!(plan = %self.plan.name(), "plan complete");
                    } else if !now_complete && complete {
                        warn!(plan = %self.plan.name(), status = %self.plan.status(), "plan regressed");
                    }
                    complete = now_complete;
                }
                _ = shutdown.changed() => {
                    info!("plan coordinator shutting down");
                    break;
                }
            }
        }
    }
}
