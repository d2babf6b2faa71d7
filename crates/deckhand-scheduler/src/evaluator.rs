//! Offer evaluation: the seam to the resource-matching pipeline.
//!
//! Matching a requirement against cluster offers is not the coordinator's
//! job. It hands each candidate's requirement to an [`OfferEvaluator`] and
//! feeds whatever comes back into the step.

use std::sync::Mutex;

use deckhand_core::ids::new_task_id;
use deckhand_core::{OfferRecommendation, PodInstanceRequirement, TaskDescriptor};
use tracing::debug;

use crate::error::{SchedulerError, SchedulerResult};

/// Turns a pod instance requirement into offer recommendations.
///
/// An empty result means no offer matched this time.
pub trait OfferEvaluator: Send + Sync {
    fn evaluate(
        &self,
        requirement: &PodInstanceRequirement,
    ) -> SchedulerResult<Vec<OfferRecommendation>>;
}

/// In-process evaluator with a fixed pool of pod slots.
///
/// Every requirement that fits gets a reservation plus one launch per task;
/// once the slots run out, requirements go unmatched until [`release`] is
/// called.
///
/// [`release`]: SimulatedEvaluator::release
#[derive(Debug)]
pub struct SimulatedEvaluator {
    slots: Mutex<Option<u32>>,
}

impl SimulatedEvaluator {
    /// Unlimited capacity.
    pub fn unbounded() -> Self {
        Self {
            slots: Mutex::new(None),
        }
    }

    /// Room for `slots` pod instances in total.
    pub fn with_slots(slots: u32) -> Self {
        Self {
            slots: Mutex::new(Some(slots)),
        }
    }

    /// Return one pod slot to the pool.
    ///
    /// The pool does not follow task lifetimes: a relaunch claims a fresh
    /// slot, and only an explicit release gives one back.
    pub fn release(&self) {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(n) = slots.as_mut() {
            *n += 1;
        }
    }

    fn claim(&self) -> bool {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        match slots.as_mut() {
            None => true,
            Some(0) => false,
            Some(n) => {
                *n -= 1;
                true
            }
        }
    }
}

impl OfferEvaluator for SimulatedEvaluator {
    fn evaluate(
        &self,
        requirement: &PodInstanceRequirement,
    ) -> SchedulerResult<Vec<OfferRecommendation>> {
        let pod = &requirement.pod_instance;

        let mut launches = Vec::with_capacity(requirement.tasks_to_launch.len());
        for task in &requirement.tasks_to_launch {
            let spec = pod
                .tasks
                .iter()
                .find(|t| &t.name == task)
                .ok_or_else(|| SchedulerError::UnknownTask {
                    pod_instance: pod.name(),
                    task: task.clone(),
                })?;
            let name = pod.task_name(&spec.name);
            launches.push(OfferRecommendation::Launch {
                task: TaskDescriptor {
                    task_id: new_task_id(&name),
                    name,
                    goal: spec.goal,
                    readiness_check: spec.readiness_check.clone(),
                },
            });
        }

        if !self.claim() {
            debug!(pod_instance = %pod.name(), "no capacity left, requirement unmatched");
            return Ok(Vec::new());
        }

        let mut recommendations = vec![OfferRecommendation::Reserve {
            resource_id: format!("{}-resources", pod.name()),
            pod_instance: pod.name(),
        }];
        recommendations.extend(launches);
        Ok(recommendations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deckhand_core::{GoalState, PodInstance, TaskSpec};

    fn requirement() -> PodInstanceRequirement {
        PodInstanceRequirement::new(PodInstance::new(
            "hello",
            0,
            vec![
                TaskSpec {
                    name: "server".to_string(),
                    goal: GoalState::Running,
                    readiness_check: None,
                },
                TaskSpec {
                    name: "init".to_string(),
                    goal: GoalState::Finished,
                    readiness_check: None,
                },
            ],
        ))
    }

    #[test]
    fn launches_every_task() {
        let evaluator = SimulatedEvaluator::unbounded();
        let recs = evaluator.evaluate(&requirement()).unwrap();
        assert_eq!(recs.len(), 3);
        assert_eq!(recs[0].operation_type(), "RESERVE");

        let launched: Vec<&TaskDescriptor> = recs.iter().filter_map(|r| r.launched_task()).collect();
        assert_eq!(launched.len(), 2);
        assert_eq!(launched[0].name, "hello-0-server");
        assert!(launched[0].task_id.starts_with("hello-0-server__"));
        assert_eq!(launched[1].goal, GoalState::Finished);
    }

    #[test]
    fn exhausted_capacity_matches_nothing() {
        let evaluator = SimulatedEvaluator::with_slots(1);
        assert!(!evaluator.evaluate(&requirement()).unwrap().is_empty());
        assert!(evaluator.evaluate(&requirement()).unwrap().is_empty());

        evaluator.release();
        assert!(!evaluator.evaluate(&requirement()).unwrap().is_empty());
    }

    #[test]
    fn unknown_task_is_an_error() {
        let mut req = requirement();
        req.tasks_to_launch.push("ghost".to_string());
        let err = SimulatedEvaluator::unbounded().evaluate(&req).unwrap_err();
        assert!(matches!(err, SchedulerError::UnknownTask { .. }));
    }
}
