//! deckhand-plan: deployment plans and their execution strategies.
//!
//! A plan is a small tree: the plan holds phases, phases hold steps. Each
//! composite picks the children that may run next through its strategy, and
//! reports the weakest status among its children. Steps carry the real
//! state machine: a [`DeploymentStep`] folds offer outcomes and task-status
//! reports for one pod instance into a single status.
//!
//! # Components
//!
//! - **`status`**: `Status` and weakest-link aggregation
//! - **`element`**: `Element` / `ParentElement` tree abstraction
//! - **`strategy`**: serial and parallel candidate selection
//! - **`step`**: `Step` lifecycle hooks
//! - **`deployment`**: `DeploymentStep` state machine
//! - **`phase`**: `Phase` and `Plan` composites
//! - **`builder`**: plan construction from `deckhand.toml`
//! - **`snapshot`**: serializable view of a plan for reporting

pub mod builder;
pub mod deployment;
pub mod element;
pub mod error;
pub mod phase;
pub mod snapshot;
pub mod status;
pub mod step;
pub mod strategy;

pub use builder::PlanBuilder;
pub use deployment::DeploymentStep;
pub use element::{Element, ParentElement};
pub use error::{PlanError, PlanResult};
pub use phase::{Phase, Plan};
pub use snapshot::{ElementSnapshot, TaskSnapshot};
pub use status::{Status, aggregate};
pub use step::{Step, TrackedTask};
pub use strategy::{ParallelStrategy, SerialStrategy, Strategy};
