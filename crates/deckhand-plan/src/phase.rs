//! Phases and plans: the composite levels of the tree.
//!
//! Neither stores a status: both aggregate their children's statuses on
//! every read.

use std::sync::Arc;

use crate::deployment::DeploymentStep;
use crate::element::{Element, ParentElement, aggregate_children};
use crate::status::Status;
use crate::step::Step;
use crate::strategy::Strategy;

/// An ordered group of steps under one strategy.
#[derive(Debug)]
pub struct Phase<S: Step = DeploymentStep> {
    name: String,
    steps: Vec<Arc<S>>,
    strategy: Box<dyn Strategy>,
    errors: Vec<String>,
}

impl<S: Step> Phase<S> {
    pub fn new(name: &str, steps: Vec<Arc<S>>, strategy: Box<dyn Strategy>) -> Self {
        Self {
            name: name.to_string(),
            steps,
            strategy,
            errors: Vec::new(),
        }
    }

    /// Builder method: attach validation errors.
    pub fn with_errors(self, errors: Vec<String>) -> Self {
        Self { errors, ..self }
    }

    pub fn steps(&self) -> &[Arc<S>] {
        &self.steps
    }
}

impl<S: Step> Element for Phase<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn status(&self) -> Status {
        aggregate_children(&self.steps)
    }

    fn errors(&self) -> Vec<String> {
        self.errors.clone()
    }
}

impl<S: Step> ParentElement for Phase<S> {
    type Child = S;

    fn children(&self) -> &[Arc<S>] {
        &self.steps
    }

    fn strategy(&self) -> &dyn Strategy {
        self.strategy.as_ref()
    }
}

/// The root of a deployment: an ordered group of phases.
#[derive(Debug)]
pub struct Plan<S: Step = DeploymentStep> {
    name: String,
    phases: Vec<Arc<Phase<S>>>,
    strategy: Box<dyn Strategy>,
    errors: Vec<String>,
}

impl<S: Step> Plan<S> {
    pub fn new(name: &str, phases: Vec<Arc<Phase<S>>>, strategy: Box<dyn Strategy>) -> Self {
        Self {
            name: name.to_string(),
            phases,
            strategy,
            errors: Vec::new(),
        }
    }

    pub fn with_errors(self, errors: Vec<String>) -> Self {
        Self { errors, ..self }
    }

    pub fn phases(&self) -> &[Arc<Phase<S>>] {
        &self.phases
    }

    /// Every step in the plan, phase by phase.
    pub fn steps(&self) -> impl Iterator<Item = &Arc<S>> {
        self.phases.iter().flat_map(|p| p.steps().iter())
    }

    pub fn step(&self, name: &str) -> Option<Arc<S>> {
        self.steps().find(|s| s.name() == name).cloned()
    }

    /// Restart every step; the plan deploys again from the top.
    pub fn restart(&self) {
        for step in self.steps() {
            step.restart();
        }
    }
}

impl<S: Step> Element for Plan<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn status(&self) -> Status {
        aggregate_children(&self.phases)
    }

    fn errors(&self) -> Vec<String> {
        self.errors.clone()
    }
}

impl<S: Step> ParentElement for Plan<S> {
    type Child = Phase<S>;

    fn children(&self) -> &[Arc<Phase<S>>] {
        &self.phases
    }

    fn strategy(&self) -> &dyn Strategy {
        self.strategy.as_ref()
    }
}
