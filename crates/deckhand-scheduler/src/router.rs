//! Task-status routing: delivers cluster status reports to plan steps.
//!
//! Reports arrive on an mpsc channel, independent of offer passes. The
//! router resolves the task name embedded in each task id and hands the
//! report to the step whose pod instance owns that task. The step decides
//! whether the report is relevant to its current launch attempt.

use std::sync::Arc;

use deckhand_core::TaskStatusEvent;
use deckhand_core::ids::task_name_from_id;
use deckhand_plan::{DeploymentStep, Element, Plan, Step};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::error::{SchedulerError, SchedulerResult};

/// Sending half handed to whatever receives cluster callbacks.
#[derive(Debug, Clone)]
pub struct StatusSender {
    tx: mpsc::Sender<TaskStatusEvent>,
}

impl StatusSender {
    pub async fn send(&self, event: TaskStatusEvent) -> SchedulerResult<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| SchedulerError::ChannelClosed)
    }
}

/// Create a bounded status channel.
pub fn status_channel(capacity: usize) -> (StatusSender, mpsc::Receiver<TaskStatusEvent>) {
    let (tx, rx) = mpsc::channel(capacity);
    (StatusSender { tx }, rx)
}

pub struct StatusRouter {
    plan: Arc<Plan>,
}

impl StatusRouter {
    pub fn new(plan: Arc<Plan>) -> Self {
        Self { plan }
    }

    /// Steps whose pod instance owns the task behind `task_id`.
    fn owners(&self, task_id: &str) -> SchedulerResult<Vec<Arc<DeploymentStep>>> {
        let task_name = task_name_from_id(task_id)?;
        Ok(self
            .plan
            .steps()
            .filter(|step| {
                step.asset().is_some_and(|req| {
                    req.pod_instance
                        .tasks
                        .iter()
                        .any(|t| req.pod_instance.task_name(&t.name) == task_name)
                })
            })
            .cloned()
            .collect())
    }

    /// Deliver one report. Returns the number of steps it reached.
    pub fn route(&self, event: &TaskStatusEvent) -> usize {
        let owners = match self.owners(&event.task_id) {
            Ok(owners) => owners,
            Err(e) => {
                warn!(task_id = %event.task_id, error = %e, "dropping status report");
                return 0;
            }
        };

        if owners.is_empty() {
            debug!(task_id = %event.task_id, "no step owns task, dropping status report");
        }
        if event.state.is_terminal() {
            info!(task_id = %event.task_id, state = %event.state, "task reached terminal state");
        }

        for step in &owners {
            step.update(event);
            debug!(step = %step.name(), status = %step.status(), "status report applied");
        }
        owners.len()
    }

    /// Drain the channel until shutdown or until every sender is dropped.
    pub async fn run(
        &self,
        mut rx: mpsc::Receiver<TaskStatusEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(plan = %self.plan.name(), "status router started");

        loop {
            tokio::select! {
                event = rx.recv() => {
                    match event {
                        Some(event) => {
                            self.route(&event);
                        }
                        None => {
                            info!("status channel closed, router stopping");
                            break;
                        }
                    }
                }
                _ = shutdown.changed() => {
                    info!("status router shutting down");
                    break;
                }
            }
        }
    }
}
