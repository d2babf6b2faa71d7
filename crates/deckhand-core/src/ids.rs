//! Task identifier encoding.
//!
//! Task ids embed the task name so that a status report can be traced back
//! to the task specification that produced it: `{task_name}__{uuid}`.

use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::types::TaskId;

const SEPARATOR: &str = "__";

/// Generate a fresh task id for `task_name`.
pub fn new_task_id(task_name: &str) -> TaskId {
    format!("{task_name}{SEPARATOR}{}", Uuid::new_v4())
}

/// Recover the task name embedded in `task_id`.
pub fn task_name_from_id(task_id: &str) -> CoreResult<String> {
    match task_id.rsplit_once(SEPARATOR) {
        Some((name, suffix)) if !name.is_empty() && !suffix.is_empty() => Ok(name.to_string()),
        _ => Err(CoreError::InvalidTaskId(task_id.to_string())),
    }
}
