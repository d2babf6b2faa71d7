//! Execution strategies: which children of a phase or plan run next.
//!
//! A strategy is pure selection logic. It is asked afresh on every
//! scheduling pass and never caches a result, since child statuses move
//! between passes. The `dirty` set names elements claimed elsewhere in the
//! same pass; it is read, never modified.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use deckhand_core::StrategyKind;
use tracing::debug;

use crate::element::Element;

/// Selection logic over the children of a composite element.
pub trait Strategy: Send + Sync + fmt::Debug {
    fn kind(&self) -> StrategyKind;

    /// Indices of the children that may execute now, in declared order.
    fn select(&self, children: &[&dyn Element], dirty: &HashSet<String>) -> Vec<usize>;

    fn interrupt(&self);

    fn proceed(&self);

    fn is_interrupted(&self) -> bool;
}

/// Build the strategy for a configured kind.
pub fn from_kind(kind: StrategyKind) -> Box<dyn Strategy> {
    match kind {
        StrategyKind::Serial => Box::new(SerialStrategy::default()),
        StrategyKind::Parallel => Box::new(ParallelStrategy::default()),
    }
}

/// Ask `strategy` for candidates among `children`.
///
/// An interrupted strategy yields nothing.
pub fn candidates<C: Element>(
    strategy: &dyn Strategy,
    children: &[Arc<C>],
    dirty: &HashSet<String>,
) -> Vec<Arc<C>> {
    if strategy.is_interrupted() {
        debug!(strategy = ?strategy.kind(), "strategy interrupted, no candidates");
        return Vec::new();
    }

    let views: Vec<&dyn Element> = children.iter().map(|c| c.as_ref() as &dyn Element).collect();
    strategy
        .select(&views, dirty)
        .into_iter()
        .filter_map(|i| children.get(i).cloned())
        .collect()
}

/// Runs children one at a time, in declared order.
///
/// Complete and dirty children are skipped. The first remaining child is
/// returned when it is eligible; when it is still in progress or invalid,
/// nothing is returned so later children wait their turn.
#[derive(Debug, Default)]
pub struct SerialStrategy {
    interrupted: AtomicBool,
}

impl Strategy for SerialStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Serial
    }

    fn select(&self, children: &[&dyn Element], dirty: &HashSet<String>) -> Vec<usize> {
        for (i, child) in children.iter().enumerate() {
            if child.is_complete() || dirty.contains(child.name()) {
                continue;
            }
            if child.is_eligible(dirty) {
                return vec![i];
            }
            debug!(child = child.name(), status = %child.status(), "serial strategy blocked");
            return Vec::new();
        }
        Vec::new()
    }

    fn interrupt(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
    }

    fn proceed(&self) {
        self.interrupted.store(false, Ordering::SeqCst);
    }

    fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }
}

/// Runs every eligible child at once.
#[derive(Debug, Default)]
pub struct ParallelStrategy {
    interrupted: AtomicBool,
}

impl Strategy for ParallelStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Parallel
    }

    fn select(&self, children: &[&dyn Element], dirty: &HashSet<String>) -> Vec<usize> {
        children
            .iter()
            .enumerate()
            .filter(|(_, child)| child.is_eligible(dirty))
            .map(|(i, _)| i)
            .collect()
    }

    fn interrupt(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
    }

    fn proceed(&self) {
        self.interrupted.store(false, Ordering::SeqCst);
    }

    fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }
}
