//! Plan construction error types.

use thiserror::Error;

/// Errors that prevent a plan from being built at all.
///
/// Problems local to a single pod instance do not fail the build; they are
/// attached to the affected step as validation errors instead.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("duplicate element {name} in {parent}")]
    DuplicateElement { parent: String, name: String },

    #[error("service {0} defines no pods")]
    NoPods(String),
}

pub type PlanResult<T> = Result<T, PlanError>;
