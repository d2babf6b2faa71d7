//! Deployment step: drives one pod instance from offer to ready.
//!
//! The step tracks the tasks launched for its pod instance and folds two
//! independent inputs into a single status:
//!
//! - offer outcomes (`update_offer_status`), which replace the tracked task
//!   set and move launched tasks to `Starting`;
//! - task-status reports (`update`), which move individual tasks forward,
//!   or back to `Pending` when they fail so the plan re-offers the step.
//!
//! Both paths take the same per-step lock.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use deckhand_core::ids::task_name_from_id;
use deckhand_core::{
    GoalState, OfferRecommendation, PodInstanceRequirement, TaskId, TaskState, TaskStatusEvent,
};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::element::Element;
use crate::status::{Status, aggregate};
use crate::step::{Step, StepHeader, TrackedTask};

/// Mutable state, guarded by the step's lock.
#[derive(Debug, Default)]
struct DeploymentState {
    status: Status,
    parameters: HashMap<String, String>,
    tasks: HashMap<TaskId, TrackedTask>,
    /// Offers have been evaluated since the last regression to `Pending`.
    prepared: bool,
}

impl DeploymentState {
    /// Status implied by the tracked tasks.
    fn derived_status(&self, step: &str) -> Status {
        if self.tasks.is_empty() {
            return if self.prepared {
                Status::Prepared
            } else {
                Status::Pending
            };
        }

        for (task_id, task) in &self.tasks {
            debug!(%step, %task_id, status = %task.status, "tracked task status");
        }
        aggregate(self.tasks.values().map(|t| t.status), self.status)
    }

    fn set_task_status(&mut self, task_id: &str, status: Status) {
        if let Some(task) = self.tasks.get_mut(task_id) {
            task.status = status;
            info!(%task_id, %status, "task status updated");
        }
    }

    fn set_status(&mut self, step: &str, status: Status) {
        if self.status != status {
            info!(%step, from = %self.status, to = %status, "step status changed");
        }
        self.status = status;
    }
}

/// Step that deploys a single pod instance.
#[derive(Debug)]
pub struct DeploymentStep {
    header: StepHeader,
    requirement: PodInstanceRequirement,
    state: Mutex<DeploymentState>,
}

impl DeploymentStep {
    /// Create a step with an initial `status` and any validation `errors`.
    pub fn new(
        name: &str,
        status: Status,
        requirement: PodInstanceRequirement,
        errors: Vec<String>,
    ) -> Self {
        Self {
            header: StepHeader::new(name, errors),
            requirement,
            state: Mutex::new(DeploymentState {
                status,
                ..Default::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, DeploymentState> {
        // Every mutation completes without panicking, so a poisoned guard
        // still holds consistent state.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn name_str(&self) -> &str {
        &self.header.name
    }

    /// Whether offers have been evaluated since the last regression.
    pub fn is_prepared(&self) -> bool {
        self.lock().prepared
    }

    /// `status`, unless validation errors pin the step to `Error`.
    fn resting_status(&self, status: Status) -> Status {
        if self.header.errors.is_empty() {
            status
        } else {
            Status::Error
        }
    }

    fn goal_state(&self, task_id: &str) -> deckhand_core::CoreResult<GoalState> {
        let task_name = task_name_from_id(task_id)?;
        self.requirement.pod_instance.goal_state(&task_name)
    }

    /// Per-task status for a reported state, or `None` for states with no
    /// defined transition.
    fn task_status_for(
        event: &TaskStatusEvent,
        goal: GoalState,
        task: &TrackedTask,
    ) -> Option<Status> {
        match event.state {
            TaskState::Error
            | TaskState::Failed
            | TaskState::Killed
            | TaskState::Killing
            | TaskState::Lost => Some(Status::Pending),
            TaskState::Staging | TaskState::Starting => Some(Status::Starting),
            TaskState::Running => {
                if goal == GoalState::Running && task.descriptor.readiness_check_succeeded(event) {
                    Some(Status::Complete)
                } else {
                    Some(Status::Starting)
                }
            }
            TaskState::Finished => {
                if goal == GoalState::Finished {
                    Some(Status::Complete)
                } else {
                    Some(Status::Pending)
                }
            }
            TaskState::Dropped | TaskState::Unreachable | TaskState::Gone | TaskState::Unknown => {
                None
            }
        }
    }
}

impl Element for DeploymentStep {
    fn name(&self) -> &str {
        self.name_str()
    }

    fn status(&self) -> Status {
        self.lock().status
    }

    fn errors(&self) -> Vec<String> {
        self.header.errors.clone()
    }
}

impl Step for DeploymentStep {
    fn id(&self) -> Uuid {
        self.header.id
    }

    fn start(&self) -> Option<PodInstanceRequirement> {
        if self.has_errors() {
            debug!(step = %self.name_str(), "step has validation errors, nothing to start");
            return None;
        }
        let state = self.lock();
        if state.status.is_complete() {
            return None;
        }
        Some(self.requirement.with_environment(&state.parameters))
    }

    fn update_parameters(&self, parameters: HashMap<String, String>) {
        self.lock().parameters = parameters;
    }

    fn asset(&self) -> Option<PodInstanceRequirement> {
        Some(self.requirement.clone())
    }

    fn update_offer_status(&self, recommendations: &[OfferRecommendation]) {
        let name = self.name_str();
        let operations: Vec<&str> = recommendations.iter().map(|r| r.operation_type()).collect();
        info!(
            step = %name,
            id = %self.header.id,
            count = recommendations.len(),
            ?operations,
            "applying offer recommendations"
        );

        let mut state = self.lock();

        if recommendations.is_empty() {
            // Nothing launched this pass: keep the tracked set, await a relaunch.
            let ids: Vec<TaskId> = state.tasks.keys().cloned().collect();
            for task_id in ids {
                state.set_task_status(&task_id, Status::Prepared);
            }
        } else {
            state.tasks = recommendations
                .iter()
                .filter_map(|r| r.launched_task())
                .filter(|task| !task.task_id.is_empty())
                .map(|task| {
                    (
                        task.task_id.clone(),
                        TrackedTask::new(task.clone(), Status::Prepared),
                    )
                })
                .collect();

            let ids: Vec<TaskId> = state.tasks.keys().cloned().collect();
            for task_id in ids {
                state.set_task_status(&task_id, Status::Starting);
            }
        }

        let tracked: Vec<String> = state.tasks.values().map(|t| t.to_string()).collect();
        info!(step = %name, id = %self.header.id, ?tracked, "waiting for task status updates");

        state.prepared = true;
        let status = state.derived_status(name);
        state.set_status(name, status);
    }

    fn update(&self, event: &TaskStatusEvent) {
        let name = self.name_str();
        debug!(step = %name, task_id = %event.task_id, state = %event.state, "received task status");

        let mut state = self.lock();

        let Some(task) = state.tasks.get(&event.task_id).cloned() else {
            debug!(step = %name, task_id = %event.task_id, "ignoring status for untracked task");
            return;
        };

        if state.status.is_complete() {
            debug!(step = %name, task_id = %event.task_id, "ignoring status, step already complete");
            return;
        }

        let goal = match self.goal_state(&event.task_id) {
            Ok(goal) => goal,
            Err(e) => {
                error!(step = %name, task_id = %event.task_id, error = %e, "failed to resolve goal state");
                return;
            }
        };
        debug!(task_id = %event.task_id, %goal, "resolved goal state");

        match Self::task_status_for(event, goal, &task) {
            Some(status) => state.set_task_status(&event.task_id, status),
            None => error!(
                step = %name,
                task_id = %event.task_id,
                state = %event.state,
                "unexpected task state, no transition"
            ),
        }

        let status = state.derived_status(name);
        if status == Status::Pending {
            state.prepared = false;
        }
        state.set_status(name, status);
    }

    fn restart(&self) {
        let mut state = self.lock();
        info!(step = %self.name_str(), "restarting step");
        state.tasks.clear();
        state.prepared = false;
        let status = self.resting_status(Status::Pending);
        state.set_status(self.name_str(), status);
    }

    fn force_complete(&self) {
        let mut state = self.lock();
        info!(step = %self.name_str(), "forcing step to complete");
        for task in state.tasks.values_mut() {
            task.status = Status::Complete;
        }
        let status = self.resting_status(Status::Complete);
        state.set_status(self.name_str(), status);
    }

    fn tracked_tasks(&self) -> Vec<TrackedTask> {
        let state = self.lock();
        let mut tasks: Vec<TrackedTask> = state.tasks.values().cloned().collect();
        tasks.sort_by(|a, b| a.descriptor.name.cmp(&b.descriptor.name));
        tasks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deckhand_core::ids::new_task_id;
    use deckhand_core::{PodInstance, ReadinessCheck, TaskDescriptor, TaskSpec};

    fn pod(tasks: &[(&str, GoalState, bool)]) -> PodInstance {
        PodInstance::new(
            "hello",
            0,
            tasks
                .iter()
                .map(|(name, goal, readiness)| TaskSpec {
                    name: name.to_string(),
                    goal: *goal,
                    readiness_check: readiness.then(|| ReadinessCheck {
                        command: "true".to_string(),
                        interval_secs: 5,
                        timeout_secs: 10,
                    }),
                })
                .collect(),
        )
    }

    fn step_for(pod: PodInstance) -> DeploymentStep {
        DeploymentStep::new(
            "hello-0:[server]",
            Status::Pending,
            PodInstanceRequirement::new(pod),
            Vec::new(),
        )
    }

    /// Launch recommendations for every task of the step's pod, with fresh ids.
    fn launch_all(step: &DeploymentStep) -> (Vec<OfferRecommendation>, Vec<TaskId>) {
        let requirement = step.start().unwrap();
        let pod = &requirement.pod_instance;
        let mut ids = Vec::new();
        let recs = pod
            .tasks
            .iter()
            .map(|spec| {
                let name = pod.task_name(&spec.name);
                let task_id = new_task_id(&name);
                ids.push(task_id.clone());
                OfferRecommendation::Launch {
                    task: TaskDescriptor {
                        name,
                        task_id,
                        goal: spec.goal,
                        readiness_check: spec.readiness_check.clone(),
                    },
                }
            })
            .collect();
        (recs, ids)
    }

    fn running_server() -> DeploymentStep {
        step_for(pod(&[("server", GoalState::Running, false)]))
    }

    #[test]
    fn new_step_is_pending() {
        let step = running_server();
        assert_eq!(step.status(), Status::Pending);
        assert!(step.is_pending());
        assert!(!step.is_prepared());
        assert!(step.tracked_tasks().is_empty());
    }

    #[test]
    fn launch_moves_to_starting() {
        let step = running_server();
        let (recs, ids) = launch_all(&step);
        step.update_offer_status(&recs);

        assert_eq!(step.status(), Status::Starting);
        assert!(step.is_prepared());
        let tasks = step.tracked_tasks();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].descriptor.task_id, ids[0]);
        assert_eq!(tasks[0].status, Status::Starting);
    }

    #[test]
    fn empty_recommendations_without_tasks_is_prepared() {
        let step = running_server();
        step.update_offer_status(&[]);
        assert_eq!(step.status(), Status::Prepared);
        assert!(step.is_pending());
    }

    #[test]
    fn empty_recommendations_keep_tracked_tasks_prepared() {
        let step = step_for(pod(&[
            ("server", GoalState::Running, false),
            ("sidecar", GoalState::Running, false),
            ("init", GoalState::Finished, false),
        ]));
        let (recs, ids) = launch_all(&step);
        step.update_offer_status(&recs);
        step.update(&TaskStatusEvent::new(&ids[0], TaskState::Running));

        step.update_offer_status(&[]);

        let tasks = step.tracked_tasks();
        let mut tracked: Vec<TaskId> = tasks.iter().map(|t| t.descriptor.task_id.clone()).collect();
        let mut expected = ids.clone();
        tracked.sort();
        expected.sort();
        assert_eq!(tracked, expected);
        assert!(tasks.iter().all(|t| t.status == Status::Prepared));
        assert_eq!(step.status(), Status::Prepared);
    }

    #[test]
    fn non_launch_and_unassigned_recommendations_not_tracked() {
        let step = running_server();
        let recs = vec![
            OfferRecommendation::Reserve {
                resource_id: "r-1".to_string(),
                pod_instance: "hello-0".to_string(),
            },
            OfferRecommendation::Launch {
                task: TaskDescriptor {
                    name: "hello-0-server".to_string(),
                    task_id: String::new(),
                    goal: GoalState::Running,
                    readiness_check: None,
                },
            },
        ];
        step.update_offer_status(&recs);

        assert!(step.tracked_tasks().is_empty());
        assert_eq!(step.status(), Status::Prepared);
    }

    #[test]
    fn new_attempt_replaces_stale_tasks() {
        let step = running_server();
        let (first, first_ids) = launch_all(&step);
        step.update_offer_status(&first);
        step.update(&TaskStatusEvent::new(&first_ids[0], TaskState::Failed));
        assert_eq!(step.status(), Status::Pending);

        let (second, second_ids) = launch_all(&step);
        step.update_offer_status(&second);

        let tasks = step.tracked_tasks();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].descriptor.task_id, second_ids[0]);

        // Reports for the superseded task are ignored.
        step.update(&TaskStatusEvent::new(&first_ids[0], TaskState::Running));
        assert_eq!(step.status(), Status::Starting);
    }

    #[test]
    fn running_without_readiness_check_completes() {
        let step = running_server();
        let (recs, ids) = launch_all(&step);
        step.update_offer_status(&recs);

        step.update(&TaskStatusEvent::new(&ids[0], TaskState::Staging));
        assert_eq!(step.status(), Status::Starting);

        step.update(&TaskStatusEvent::new(&ids[0], TaskState::Running));
        assert_eq!(step.status(), Status::Complete);
        assert!(step.start().is_none());
    }

    #[test]
    fn running_waits_for_readiness_check() {
        let step = step_for(pod(&[("server", GoalState::Running, true)]));
        let (recs, ids) = launch_all(&step);
        step.update_offer_status(&recs);

        step.update(&TaskStatusEvent::new(&ids[0], TaskState::Running));
        assert_eq!(step.status(), Status::Starting);

        step.update(&TaskStatusEvent::new(&ids[0], TaskState::Running).with_readiness_passed());
        assert_eq!(step.status(), Status::Complete);
    }

    #[test]
    fn finished_depends_on_goal() {
        let step = step_for(pod(&[("init", GoalState::Finished, false)]));
        let (recs, ids) = launch_all(&step);
        step.update_offer_status(&recs);

        step.update(&TaskStatusEvent::new(&ids[0], TaskState::Running));
        assert_eq!(step.status(), Status::Starting);

        step.update(&TaskStatusEvent::new(&ids[0], TaskState::Finished));
        assert_eq!(step.status(), Status::Complete);

        let step = running_server();
        let (recs, ids) = launch_all(&step);
        step.update_offer_status(&recs);
        step.update(&TaskStatusEvent::new(&ids[0], TaskState::Finished));
        assert_eq!(step.status(), Status::Pending);
        assert!(!step.is_prepared());
    }

    #[test]
    fn failures_regress_to_pending() {
        for state in [
            TaskState::Error,
            TaskState::Failed,
            TaskState::Killed,
            TaskState::Killing,
            TaskState::Lost,
        ] {
            let step = running_server();
            let (recs, ids) = launch_all(&step);
            step.update_offer_status(&recs);
            assert!(step.is_prepared());

            step.update(&TaskStatusEvent::new(&ids[0], state));
            assert_eq!(step.status(), Status::Pending, "{state}");
            assert!(!step.is_prepared(), "{state}");
            assert!(step.start().is_some());
        }
    }

    #[test]
    fn lost_after_complete_regresses_step() {
        let step = step_for(pod(&[
            ("server", GoalState::Running, false),
            ("sidecar", GoalState::Running, false),
        ]));
        let (recs, ids) = launch_all(&step);
        step.update_offer_status(&recs);

        step.update(&TaskStatusEvent::new(&ids[0], TaskState::Running));
        assert_eq!(step.status(), Status::Starting);

        step.update(&TaskStatusEvent::new(&ids[0], TaskState::Lost));
        assert_eq!(step.status(), Status::Pending);

        let tasks = step.tracked_tasks();
        let lost = tasks.iter().find(|t| t.descriptor.task_id == ids[0]).unwrap();
        assert_eq!(lost.status, Status::Pending);
    }

    #[test]
    fn pending_task_dominates_complete_tasks() {
        let step = step_for(pod(&[
            ("a", GoalState::Running, false),
            ("b", GoalState::Running, false),
            ("c", GoalState::Running, false),
        ]));
        let (recs, ids) = launch_all(&step);
        step.update_offer_status(&recs);

        step.update(&TaskStatusEvent::new(&ids[0], TaskState::Running));
        step.update(&TaskStatusEvent::new(&ids[1], TaskState::Running));
        assert_eq!(step.status(), Status::Starting);

        step.update(&TaskStatusEvent::new(&ids[2], TaskState::Killed));
        assert_eq!(step.status(), Status::Pending);
    }

    #[test]
    fn complete_only_when_all_tasks_complete() {
        let step = step_for(pod(&[
            ("a", GoalState::Running, false),
            ("b", GoalState::Finished, false),
        ]));
        let (recs, ids) = launch_all(&step);
        step.update_offer_status(&recs);

        step.update(&TaskStatusEvent::new(&ids[0], TaskState::Running));
        assert_eq!(step.status(), Status::Starting);

        step.update(&TaskStatusEvent::new(&ids[1], TaskState::Finished));
        assert_eq!(step.status(), Status::Complete);
    }

    #[test]
    fn complete_step_ignores_updates() {
        let step = running_server();
        let (recs, ids) = launch_all(&step);
        step.update_offer_status(&recs);
        step.update(&TaskStatusEvent::new(&ids[0], TaskState::Running));
        assert_eq!(step.status(), Status::Complete);

        step.update(&TaskStatusEvent::new(&ids[0], TaskState::Lost));
        assert_eq!(step.status(), Status::Complete);
    }

    #[test]
    fn untracked_task_ignored() {
        let step = running_server();
        let (recs, _) = launch_all(&step);
        step.update_offer_status(&recs);

        step.update(&TaskStatusEvent::new("other__1", TaskState::Failed));
        assert_eq!(step.status(), Status::Starting);
        assert!(step.is_prepared());
    }

    #[test]
    fn unresolvable_goal_state_keeps_status() {
        let step = running_server();
        let recs = vec![OfferRecommendation::Launch {
            task: TaskDescriptor {
                name: "hello-0-ghost".to_string(),
                task_id: "hello-0-ghost__1".to_string(),
                goal: GoalState::Running,
                readiness_check: None,
            },
        }];
        step.update_offer_status(&recs);
        assert_eq!(step.status(), Status::Starting);

        step.update(&TaskStatusEvent::new("hello-0-ghost__1", TaskState::Running));
        assert_eq!(step.status(), Status::Starting);
        assert_eq!(step.tracked_tasks()[0].status, Status::Starting);
    }

    #[test]
    fn unexpected_state_is_not_a_transition() {
        let step = running_server();
        let (recs, ids) = launch_all(&step);
        step.update_offer_status(&recs);

        for state in [TaskState::Unreachable, TaskState::Dropped, TaskState::Unknown] {
            step.update(&TaskStatusEvent::new(&ids[0], state));
            assert_eq!(step.status(), Status::Starting);
        }
    }

    #[test]
    fn parameters_apply_to_start_not_asset() {
        let step = running_server();
        step.update_parameters(HashMap::from([("VERSION".to_string(), "2".to_string())]));

        let started = step.start().unwrap();
        assert_eq!(started.environment["VERSION"], "2");
        assert!(step.asset().unwrap().environment.is_empty());
    }

    #[test]
    fn step_with_errors_does_not_start() {
        let step = DeploymentStep::new(
            "hello-0:[]",
            Status::Error,
            PodInstanceRequirement::new(pod(&[])),
            vec!["pod 'hello' defines no tasks".to_string()],
        );
        assert!(step.start().is_none());
        assert_eq!(step.status(), Status::Error);
        assert_eq!(step.errors().len(), 1);
        assert!(step.asset().is_some());
    }

    #[test]
    fn step_with_errors_stays_in_error() {
        let step = DeploymentStep::new(
            "hello-0:[]",
            Status::Error,
            PodInstanceRequirement::new(pod(&[])),
            vec!["pod 'hello' defines no tasks".to_string()],
        );

        step.restart();
        assert_eq!(step.status(), Status::Error);
        assert!(step.start().is_none());

        step.force_complete();
        assert_eq!(step.status(), Status::Error);
    }

    #[test]
    fn restart_clears_tasks() {
        let step = running_server();
        let (recs, _) = launch_all(&step);
        step.update_offer_status(&recs);

        step.restart();
        assert_eq!(step.status(), Status::Pending);
        assert!(!step.is_prepared());
        assert!(step.tracked_tasks().is_empty());
    }

    #[test]
    fn force_complete_marks_tasks() {
        let step = running_server();
        let (recs, _) = launch_all(&step);
        step.update_offer_status(&recs);

        step.force_complete();
        assert!(step.is_complete());
        assert!(step.tracked_tasks().iter().all(|t| t.status == Status::Complete));
    }

    #[test]
    fn concurrent_offer_and_status_paths() {
        use std::sync::Arc;
        use std::thread;

        let step = Arc::new(step_for(pod(&[
            ("a", GoalState::Running, false),
            ("b", GoalState::Running, false),
        ])));
        let (recs, ids) = launch_all(&step);
        step.update_offer_status(&recs);

        let offers = {
            let step = step.clone();
            let recs = recs.clone();
            thread::spawn(move || {
                for _ in 0..200 {
                    step.update_offer_status(&recs);
                }
            })
        };
        let statuses = {
            let step = step.clone();
            let ids = ids.clone();
            thread::spawn(move || {
                for i in 0..200 {
                    let state = if i % 2 == 0 {
                        TaskState::Running
                    } else {
                        TaskState::Staging
                    };
                    step.update(&TaskStatusEvent::new(&ids[i % ids.len()], state));
                }
            })
        };
        offers.join().unwrap();
        statuses.join().unwrap();

        // Whatever interleaving happened, the tracked set is one attempt's ids
        // and the step status agrees with its tasks.
        let tasks = step.tracked_tasks();
        assert_eq!(tasks.len(), 2);
        let derived = aggregate(tasks.iter().map(|t| t.status), step.status());
        assert_eq!(step.status(), derived);
    }
}
