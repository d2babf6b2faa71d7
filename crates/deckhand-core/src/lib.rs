//! deckhand-core: types shared by every Deckhand crate.
//!
//! - **`types`**: pod instances, requirements, task descriptors, task-status
//!   reports, and offer recommendations
//! - **`ids`**: task id encoding (`{task_name}__{uuid}`)
//! - **`config`**: `deckhand.toml` service configuration

pub mod config;
pub mod error;
pub mod ids;
pub mod types;

pub use config::ServiceConfig;
pub use error::{CoreError, CoreResult};
pub use types::*;
