//! Scheduler error types.

use thiserror::Error;

/// Errors that can occur while driving a plan.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("offer evaluation failed for {step}: {reason}")]
    Evaluation { step: String, reason: String },

    #[error("task {task} is not part of pod instance {pod_instance}")]
    UnknownTask { pod_instance: String, task: String },

    #[error("status channel closed")]
    ChannelClosed,

    #[error("plan error: {0}")]
    Plan(#[from] deckhand_plan::PlanError),

    #[error("core error: {0}")]
    Core(#[from] deckhand_core::CoreError),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
