//! Point-in-time view of a plan tree, for reporting.

use serde::{Deserialize, Serialize};

use deckhand_core::{StrategyKind, TaskId};

use crate::element::{Element, ParentElement};
use crate::phase::{Phase, Plan};
use crate::status::Status;
use crate::step::Step;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementSnapshot {
    pub name: String,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<StrategyKind>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ElementSnapshot>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<TaskSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub name: String,
    pub task_id: TaskId,
    pub status: Status,
}

impl ElementSnapshot {
    pub fn of_step<S: Step>(step: &S) -> Self {
        Self {
            name: step.name().to_string(),
            status: step.status(),
            strategy: None,
            errors: step.errors(),
            children: Vec::new(),
            tasks: step
                .tracked_tasks()
                .into_iter()
                .map(|t| TaskSnapshot {
                    name: t.descriptor.name,
                    task_id: t.descriptor.task_id,
                    status: t.status,
                })
                .collect(),
        }
    }

    pub fn of_phase<S: Step>(phase: &Phase<S>) -> Self {
        Self {
            name: phase.name().to_string(),
            status: phase.status(),
            strategy: Some(phase.strategy().kind()),
            errors: phase.errors(),
            children: phase.steps().iter().map(|s| Self::of_step(s.as_ref())).collect(),
            tasks: Vec::new(),
        }
    }

    pub fn of_plan<S: Step>(plan: &Plan<S>) -> Self {
        Self {
            name: plan.name().to_string(),
            status: plan.status(),
            strategy: Some(plan.strategy().kind()),
            errors: plan.errors(),
            children: plan.phases().iter().map(|p| Self::of_phase(p)).collect(),
            tasks: Vec::new(),
        }
    }

    /// Indented text rendering, one element per line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out, 0);
        out
    }

    fn render_into(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        let strategy = match self.strategy {
            Some(StrategyKind::Serial) => " (serial)",
            Some(StrategyKind::Parallel) => " (parallel)",
            None => "",
        };
        out.push_str(&format!("{indent}{} [{}]{strategy}\n", self.name, self.status));
        for error in &self.errors {
            out.push_str(&format!("{indent}  ! {error}\n"));
        }
        for task in &self.tasks {
            out.push_str(&format!("{indent}  - {} {} [{}]\n", task.name, task.task_id, task.status));
        }
        for child in &self.children {
            child.render_into(out, depth + 1);
        }
    }
}

impl<S: Step> Plan<S> {
    pub fn snapshot(&self) -> ElementSnapshot {
        ElementSnapshot::of_plan(self)
    }
}
