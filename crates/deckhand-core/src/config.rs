//! deckhand.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::types::{GoalState, PodInstance, ReadinessCheck, StrategyKind, TaskSpec};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub service: ServiceSection,
    pub plan: Option<PlanConfig>,
    pub scheduler: Option<SchedulerConfig>,
    #[serde(default)]
    pub pods: Vec<PodConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSection {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanConfig {
    pub strategy: Option<StrategyKind>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SchedulerConfig {
    pub pass_interval_ms: Option<u64>,
    pub status_channel_capacity: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodConfig {
    #[serde(rename = "type")]
    pub pod_type: String,
    pub count: u32,
    pub strategy: Option<StrategyKind>,
    pub env: Option<HashMap<String, String>>,
    #[serde(default)]
    pub tasks: Vec<TaskConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    pub name: String,
    pub goal: Option<GoalState>,
    pub readiness_check: Option<ReadinessCheck>,
}

impl ServiceConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: ServiceConfig = toml::from_str(content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Strategy for the top-level plan (default: serial).
    pub fn plan_strategy(&self) -> StrategyKind {
        self.plan
            .as_ref()
            .and_then(|p| p.strategy)
            .unwrap_or_default()
    }

    /// Scaffold a minimal service with a single long-running pod.
    pub fn scaffold(name: &str, pod_type: &str, count: u32) -> Self {
        ServiceConfig {
            service: ServiceSection {
                name: name.to_string(),
                description: None,
            },
            plan: Some(PlanConfig {
                strategy: Some(StrategyKind::Serial),
            }),
            scheduler: None,
            pods: vec![PodConfig {
                pod_type: pod_type.to_string(),
                count,
                strategy: Some(StrategyKind::Serial),
                env: None,
                tasks: vec![TaskConfig {
                    name: "server".to_string(),
                    goal: Some(GoalState::Running),
                    readiness_check: None,
                }],
            }],
        }
    }
}

impl SchedulerConfig {
    pub fn pass_interval_ms(&self) -> u64 {
        self.pass_interval_ms.unwrap_or(1000)
    }

    pub fn status_channel_capacity(&self) -> usize {
        self.status_channel_capacity.unwrap_or(256)
    }
}

impl PodConfig {
    pub fn task_specs(&self) -> Vec<TaskSpec> {
        self.tasks
            .iter()
            .map(|t| TaskSpec {
                name: t.name.clone(),
                goal: t.goal.unwrap_or_default(),
                readiness_check: t.readiness_check.clone(),
            })
            .collect()
    }

    /// Expand into `count` pod instances, indexed from zero.
    pub fn instances(&self) -> Vec<PodInstance> {
        let tasks = self.task_specs();
        (0..self.count)
            .map(|index| PodInstance::new(&self.pod_type, index, tasks.clone()))
            .collect()
    }
}
