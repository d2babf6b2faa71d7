//! Element status and weakest-link aggregation.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Lifecycle status shared by every plan element.
///
/// Variants are declared most severe first; the derived ordering is the
/// aggregation order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Error,
    #[default]
    Pending,
    /// Offers were evaluated but nothing is running yet.
    Prepared,
    /// Tasks launched and not yet ready.
    Starting,
    Complete,
}

impl Status {
    /// Work that may be (re)offered: nothing launched or launch not yet confirmed.
    pub fn is_pending(&self) -> bool {
        matches!(self, Status::Pending | Status::Prepared)
    }

    pub fn is_complete(&self) -> bool {
        *self == Status::Complete
    }

    pub fn label(&self) -> &'static str {
        match self {
            Status::Error => "ERROR",
            Status::Pending => "PENDING",
            Status::Prepared => "PREPARED",
            Status::Starting => "STARTING",
            Status::Complete => "COMPLETE",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Combine a set of statuses into the least-progressed one.
///
/// `Complete` is only returned when every member is `Complete`. Mixtures
/// with no explicit rule keep `previous`. Empty input also yields
/// `previous`; callers with their own empty-set default check for it first.
pub fn aggregate<I>(statuses: I, previous: Status) -> Status
where
    I: IntoIterator<Item = Status>,
{
    let statuses: BTreeSet<Status> = statuses.into_iter().collect();

    if statuses.is_empty() {
        return previous;
    }

    if statuses.contains(&Status::Error) {
        Status::Error
    } else if statuses.contains(&Status::Pending) {
        Status::Pending
    } else if statuses.contains(&Status::Prepared) {
        Status::Prepared
    } else if statuses.contains(&Status::Starting) {
        Status::Starting
    } else if statuses.len() == 1 && statuses.contains(&Status::Complete) {
        Status::Complete
    } else {
        warn!(
            ?statuses,
            %previous,
            "status mixture not explicitly handled, keeping previous status"
        );
        previous
    }
}
