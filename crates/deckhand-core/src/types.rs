//! Shared types used across Deckhand crates.
//!
//! These describe the units of work a deployment plan hands to the offer
//! pipeline (pod instances and their requirements), the tasks launched for
//! them, and the status reports that come back from the cluster.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::{CoreError, CoreResult};

/// Identifier of a launched task, `"{task_name}__{uuid}"`.
pub type TaskId = String;

// ── Specification ─────────────────────────────────────────────────

/// Desired terminal mode of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GoalState {
    /// Long-running; the task should stay up.
    #[default]
    Running,
    /// Run-once; the task should exit successfully.
    Finished,
}

impl fmt::Display for GoalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GoalState::Running => f.write_str("RUNNING"),
            GoalState::Finished => f.write_str("FINISHED"),
        }
    }
}

/// Readiness check attached to a task.
///
/// The check itself runs next to the task; the scheduler only sees its
/// outcome on incoming status reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessCheck {
    pub command: String,
    #[serde(default = "default_check_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_check_timeout")]
    pub timeout_secs: u64,
}

fn default_check_interval() -> u64 {
    5
}

fn default_check_timeout() -> u64 {
    10
}

/// One task within a pod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub name: String,
    pub goal: GoalState,
    pub readiness_check: Option<ReadinessCheck>,
}

/// Selection mode for the children of a phase or plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// One child at a time, in declared order.
    #[default]
    Serial,
    /// Every eligible child at once.
    Parallel,
}

// ── Pod instances ─────────────────────────────────────────────────

/// A single instance of a pod type, e.g. `hello-0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodInstance {
    pub pod_type: String,
    pub index: u32,
    pub tasks: Vec<TaskSpec>,
}

impl PodInstance {
    pub fn new(pod_type: &str, index: u32, tasks: Vec<TaskSpec>) -> Self {
        Self {
            pod_type: pod_type.to_string(),
            index,
            tasks,
        }
    }

    /// Instance name, `{pod_type}-{index}`.
    pub fn name(&self) -> String {
        format!("{}-{}", self.pod_type, self.index)
    }

    /// Full task name for one of this instance's tasks, `{instance}-{task}`.
    pub fn task_name(&self, task: &str) -> String {
        format!("{}-{}", self.name(), task)
    }

    /// Look up the goal state for a full task name belonging to this instance.
    pub fn goal_state(&self, task_name: &str) -> CoreResult<GoalState> {
        let prefix = format!("{}-", self.name());
        let short = task_name
            .strip_prefix(&prefix)
            .ok_or_else(|| CoreError::TaskNotFound {
                pod_instance: self.name(),
                task: task_name.to_string(),
            })?;

        self.tasks
            .iter()
            .find(|t| t.name == short)
            .map(|t| t.goal)
            .ok_or_else(|| CoreError::TaskNotFound {
                pod_instance: self.name(),
                task: task_name.to_string(),
            })
    }
}

/// What a step asks the offer pipeline to satisfy.
///
/// Immutable snapshot: environment overrides are applied by building a new
/// requirement with [`PodInstanceRequirement::with_environment`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodInstanceRequirement {
    pub pod_instance: PodInstance,
    /// Short task names to launch, in pod declaration order.
    pub tasks_to_launch: Vec<String>,
    pub environment: HashMap<String, String>,
}

impl PodInstanceRequirement {
    /// Requirement that launches every task in the pod instance.
    pub fn new(pod_instance: PodInstance) -> Self {
        let tasks_to_launch = pod_instance.tasks.iter().map(|t| t.name.clone()).collect();
        Self {
            pod_instance,
            tasks_to_launch,
            environment: HashMap::new(),
        }
    }

    pub fn name(&self) -> String {
        self.pod_instance.name()
    }

    /// Copy of this requirement with `overrides` merged over its environment.
    pub fn with_environment(&self, overrides: &HashMap<String, String>) -> Self {
        let mut environment = self.environment.clone();
        environment.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self {
            environment,
            ..self.clone()
        }
    }
}

// ── Tasks ─────────────────────────────────────────────────────────

/// A task as handed to the cluster at launch time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub name: String,
    /// Empty until the task is assigned an id at launch.
    pub task_id: TaskId,
    pub goal: GoalState,
    pub readiness_check: Option<ReadinessCheck>,
}

impl TaskDescriptor {
    /// Whether a RUNNING report satisfies this task's readiness gate.
    ///
    /// Tasks without a readiness check are ready as soon as they run.
    pub fn readiness_check_succeeded(&self, event: &TaskStatusEvent) -> bool {
        self.readiness_check.is_none() || event.readiness_check_passed
    }
}

impl fmt::Display for TaskDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.task_id)
    }
}

/// Task state as reported by the cluster resource manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Error,
    Failed,
    Killed,
    Killing,
    Lost,
    Staging,
    Starting,
    Running,
    Finished,
    Dropped,
    Unreachable,
    Gone,
    Unknown,
}

impl TaskState {
    /// States after which the task will not make further progress.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Error
                | TaskState::Failed
                | TaskState::Killed
                | TaskState::Lost
                | TaskState::Finished
                | TaskState::Dropped
                | TaskState::Gone
        )
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Error => "TASK_ERROR",
            TaskState::Failed => "TASK_FAILED",
            TaskState::Killed => "TASK_KILLED",
            TaskState::Killing => "TASK_KILLING",
            TaskState::Lost => "TASK_LOST",
            TaskState::Staging => "TASK_STAGING",
            TaskState::Starting => "TASK_STARTING",
            TaskState::Running => "TASK_RUNNING",
            TaskState::Finished => "TASK_FINISHED",
            TaskState::Dropped => "TASK_DROPPED",
            TaskState::Unreachable => "TASK_UNREACHABLE",
            TaskState::Gone => "TASK_GONE",
            TaskState::Unknown => "TASK_UNKNOWN",
        };
        f.write_str(s)
    }
}

/// A task-status report delivered by the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatusEvent {
    pub task_id: TaskId,
    pub state: TaskState,
    /// Outcome of the task's readiness check, when the report carries one.
    #[serde(default)]
    pub readiness_check_passed: bool,
    pub message: Option<String>,
}

impl TaskStatusEvent {
    pub fn new(task_id: &str, state: TaskState) -> Self {
        Self {
            task_id: task_id.to_string(),
            state,
            readiness_check_passed: false,
            message: None,
        }
    }

    /// Builder method: mark the readiness check as passed.
    pub fn with_readiness_passed(self) -> Self {
        Self {
            readiness_check_passed: true,
            ..self
        }
    }

    /// Builder method: attach a human-readable message.
    pub fn with_message(self, message: &str) -> Self {
        Self {
            message: Some(message.to_string()),
            ..self
        }
    }
}

// ── Offer outcomes ────────────────────────────────────────────────

/// An action proposed by the offer pipeline after matching a requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OfferRecommendation {
    /// Launch a task; carries the descriptor the step should track.
    Launch { task: TaskDescriptor },
    /// Reserve resources on an agent for a pod instance.
    Reserve {
        resource_id: String,
        pod_instance: String,
    },
    /// Release a previous reservation.
    Unreserve { resource_id: String },
}

impl OfferRecommendation {
    /// Operation type label used in log lines.
    pub fn operation_type(&self) -> &'static str {
        match self {
            OfferRecommendation::Launch { .. } => "LAUNCH_GROUP",
            OfferRecommendation::Reserve { .. } => "RESERVE",
            OfferRecommendation::Unreserve { .. } => "UNRESERVE",
        }
    }

    /// The storable task descriptor, for launch recommendations only.
    pub fn launched_task(&self) -> Option<&TaskDescriptor> {
        match self {
            OfferRecommendation::Launch { task } => Some(task),
            _ => None,
        }
    }
}
