//! Steps: the leaves of a plan.
//!
//! A step owns one unit of work (a [`PodInstanceRequirement`]) and exposes
//! two sets of hooks: `start`/`update_offer_status` for the offer pipeline,
//! and `update` for task-status reports from the cluster.

use std::collections::HashMap;

use deckhand_core::{OfferRecommendation, PodInstanceRequirement, TaskDescriptor, TaskStatusEvent};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::element::Element;
use crate::status::Status;

/// Lifecycle hooks of a plan leaf.
pub trait Step: Element {
    /// Unique id, used to tell steps apart in logs.
    fn id(&self) -> Uuid;

    /// The requirement to satisfy with offers this pass, with parameter
    /// overrides applied. `None` when there is nothing to do.
    fn start(&self) -> Option<PodInstanceRequirement>;

    /// Environment overrides merged into the next `start()` result.
    fn update_parameters(&self, parameters: HashMap<String, String>);

    /// The requirement as declared, without parameter overrides.
    fn asset(&self) -> Option<PodInstanceRequirement>;

    /// Apply the outcome of matching this step's requirement against offers.
    fn update_offer_status(&self, recommendations: &[OfferRecommendation]);

    /// Apply a task-status report.
    fn update(&self, event: &TaskStatusEvent);

    /// Forget launched tasks and go back to `Pending`.
    fn restart(&self);

    /// Mark the step and its tracked tasks complete.
    fn force_complete(&self);

    /// Tasks this step is currently waiting on.
    fn tracked_tasks(&self) -> Vec<TrackedTask> {
        Vec::new()
    }
}

/// A launched task and the step-level status derived for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedTask {
    pub descriptor: TaskDescriptor,
    pub status: Status,
}

impl TrackedTask {
    pub fn new(descriptor: TaskDescriptor, status: Status) -> Self {
        Self { descriptor, status }
    }

    pub fn with_status(&self, status: Status) -> Self {
        Self {
            descriptor: self.descriptor.clone(),
            status,
        }
    }
}

impl std::fmt::Display for TrackedTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.descriptor, self.status)
    }
}

/// Identity shared by every step implementation.
#[derive(Debug, Clone)]
pub struct StepHeader {
    pub id: Uuid,
    pub name: String,
    pub errors: Vec<String>,
}

impl StepHeader {
    pub fn new(name: &str, errors: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            errors,
        }
    }
}
