//! The plan tree abstraction.
//!
//! Every node of a plan is an [`Element`]. Composite nodes (phases and
//! plans) also implement [`ParentElement`], which exposes their children
//! and the [`Strategy`] used to pick among them.

use std::collections::HashSet;
use std::sync::Arc;

use crate::status::{Status, aggregate};
use crate::strategy::{self, Strategy};

/// Capability set shared by plans, phases, and steps.
pub trait Element: Send + Sync {
    /// Name, unique among siblings.
    fn name(&self) -> &str;

    /// Current status. Composites recompute it on every call.
    fn status(&self) -> Status;

    /// Validation errors attached when the element was built.
    fn errors(&self) -> Vec<String>;

    fn has_errors(&self) -> bool {
        !self.errors().is_empty()
    }

    fn is_pending(&self) -> bool {
        self.status().is_pending()
    }

    fn is_complete(&self) -> bool {
        self.status().is_complete()
    }

    /// Whether a strategy may hand this element out as a candidate.
    fn is_eligible(&self, dirty: &HashSet<String>) -> bool {
        self.is_pending() && !self.has_errors() && !dirty.contains(self.name())
    }
}

/// An element with ordered children and a selection strategy.
pub trait ParentElement: Element {
    type Child: Element;

    fn children(&self) -> &[Arc<Self::Child>];

    fn strategy(&self) -> &dyn Strategy;

    /// Children eligible to execute now, as chosen by this element's strategy.
    fn candidates(&self, dirty: &HashSet<String>) -> Vec<Arc<Self::Child>> {
        strategy::candidates(self.strategy(), self.children(), dirty)
    }

    /// Stop handing out candidates until [`ParentElement::proceed`] is called.
    fn interrupt(&self) {
        self.strategy().interrupt();
    }

    fn proceed(&self) {
        self.strategy().proceed();
    }

    fn is_interrupted(&self) -> bool {
        self.strategy().is_interrupted()
    }

    fn child(&self, name: &str) -> Option<Arc<Self::Child>> {
        self.children().iter().find(|c| c.name() == name).cloned()
    }
}

/// Aggregate status of a composite's children.
///
/// A composite with nothing to do is complete.
pub fn aggregate_children<C: Element>(children: &[Arc<C>]) -> Status {
    if children.is_empty() {
        return Status::Complete;
    }
    aggregate(children.iter().map(|c| c.status()), Status::Pending)
}
