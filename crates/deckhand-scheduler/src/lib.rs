//! deckhand-scheduler: drives deployment plans.
//!
//! Two independent loops act on the same plan:
//!
//! - the **coordinator** runs offer passes, asking each composite's strategy
//!   for candidates and feeding offer outcomes to the chosen steps;
//! - the **router** delivers task-status reports from the cluster to the
//!   steps that launched those tasks.
//!
//! Each step serializes the two behind its own lock, so the loops never
//! coordinate with each other directly.
//!
//! # Architecture
//!
//! ```text
//! PlanCoordinator ── candidates ──► Plan ─► Phase ─► DeploymentStep
//!        │                                               ▲
//!        └── OfferEvaluator (offer matching)             │
//! StatusRouter ◄── mpsc<TaskStatusEvent> ────────────────┘
//! ```

pub mod coordinator;
pub mod error;
pub mod evaluator;
pub mod router;

pub use coordinator::{PassReport, PlanCoordinator};
pub use error::{SchedulerError, SchedulerResult};
pub use evaluator::{OfferEvaluator, SimulatedEvaluator};
pub use router::{StatusRouter, StatusSender, status_channel};
