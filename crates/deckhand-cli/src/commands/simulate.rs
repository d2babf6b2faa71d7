use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use deckhand_core::{GoalState, ServiceConfig, TaskState, TaskStatusEvent};
use deckhand_plan::{Element, Plan, Status, Step};
use deckhand_scheduler::{PlanCoordinator, SimulatedEvaluator, StatusRouter, status_channel};
use tokio::sync::watch;
use tracing::info;

use super::print_snapshot;

/// Stand-in for the cluster: reports on every launched task exactly once.
struct SimulatedCluster {
    /// Task names whose first launch fails.
    fail_once: HashSet<String>,
    reported: HashSet<String>,
}

impl SimulatedCluster {
    fn new(fail: &[String]) -> Self {
        Self {
            fail_once: fail.iter().cloned().collect(),
            reported: HashSet::new(),
        }
    }

    /// Status reports for tasks launched since the last call.
    fn reports(&mut self, plan: &Plan) -> Vec<TaskStatusEvent> {
        let mut events = Vec::new();
        for step in plan.steps() {
            for task in step.tracked_tasks() {
                let descriptor = task.descriptor;
                if task.status != Status::Starting || !self.reported.insert(descriptor.task_id.clone()) {
                    continue;
                }

                let id = descriptor.task_id.as_str();
                events.push(TaskStatusEvent::new(id, TaskState::Staging));

                if self.fail_once.remove(&descriptor.name) {
                    events.push(
                        TaskStatusEvent::new(id, TaskState::Failed).with_message("simulated failure"),
                    );
                    continue;
                }

                events.push(match descriptor.goal {
                    GoalState::Running => {
                        TaskStatusEvent::new(id, TaskState::Running).with_readiness_passed()
                    }
                    GoalState::Finished => TaskStatusEvent::new(id, TaskState::Finished),
                });
            }
        }
        events
    }
}

pub async fn simulate(
    path: &Path,
    fail: &[String],
    timeout_secs: u64,
    format: &str,
) -> anyhow::Result<()> {
    let config = ServiceConfig::from_file(path)?;
    let settings = config.scheduler.clone().unwrap_or_default();
    let coordinator = Arc::new(PlanCoordinator::from_config(&config)?);
    let plan = coordinator.plan().clone();

    let invalid: Vec<String> = plan
        .steps()
        .filter(|s| s.has_errors())
        .map(|s| s.name().to_string())
        .collect();
    if !invalid.is_empty() {
        print_snapshot(&plan.snapshot(), format)?;
        anyhow::bail!("cannot simulate, invalid steps: {}", invalid.join(", "));
    }

    let interval = Duration::from_millis(settings.pass_interval_ms());
    let router = StatusRouter::new(plan.clone());
    let (sender, rx) = status_channel(settings.status_channel_capacity());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let router_handle = {
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move { router.run(rx, shutdown).await })
    };
    let coordinator_handle = {
        let coordinator = coordinator.clone();
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            coordinator
                .run(Arc::new(SimulatedEvaluator::unbounded()), interval, shutdown)
                .await
        })
    };

    info!(service = %config.service.name, ?interval, "simulation started");

    let mut cluster = SimulatedCluster::new(fail);
    let deadline = tokio::time::Instant::now() + Duration::from_secs(timeout_secs);
    while !plan.is_complete() && tokio::time::Instant::now() < deadline {
        for event in cluster.reports(&plan) {
            sender.send(event).await?;
        }
        tokio::time::sleep(interval / 2).await;
    }

    let _ = shutdown_tx.send(true);
    let _ = router_handle.await;
    let _ = coordinator_handle.await;

    print_snapshot(&plan.snapshot(), format)?;

    if !plan.is_complete() {
        anyhow::bail!(
            "plan did not complete within {timeout_secs}s (status {})",
            plan.status()
        );
    }
    info!(service = %config.service.name, "simulation complete");
    Ok(())
}
