//! Lifecycle event model for host components.
//!
//! A host component (a screen, a sub-view) moves through a fixed, ordered set
//! of events. Work that starts while the component sits at one event must end
//! at that event's *corresponding* event:
//!
//! | Bound at | Ends at |
//! |----------|---------|
//! | Create   | Destroy |
//! | Start    | Stop    |
//! | Resume   | Pause   |
//! | Pause    | Stop    |
//! | Stop     | Destroy |
//!
//! [`CorrespondingEvents`] holds that mapping as a table that is checked for
//! completeness when it is built, instead of failing at lookup time.

mod events;
pub mod resolver;
pub mod source;

pub use events::{ScreenEvent, ViewEvent};
pub use resolver::{resolve_end_signal, resolve_provider, ArmedSignal, TerminalSignal};
pub use source::{LifecycleEvents, LifecycleHost, LifecycleScopeProvider, LifecycleSource, LifecycleWatch};

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use crate::app::{Result, ScopeError};

/// One event set, listed in lifecycle order. The last entry is terminal.
pub trait LifecycleEvent: Copy + Eq + Hash + Debug + Send + Sync + 'static {
    const ALL: &'static [Self];

    fn is_terminal(&self) -> bool {
        Self::ALL.last() == Some(self)
    }
}

/// Maps the event a binding started at to the event that ends it.
#[derive(Debug, Clone)]
pub struct CorrespondingEvents<E: LifecycleEvent> {
    table: HashMap<E, E>,
}

impl<E: LifecycleEvent> CorrespondingEvents<E> {
    /// Build the table, rejecting it unless every non-terminal event has
    /// exactly one end event and the terminal event has none.
    pub fn new(pairs: impl IntoIterator<Item = (E, E)>) -> Result<Self> {
        let mut table = HashMap::new();
        for (start, end) in pairs {
            if start.is_terminal() {
                return Err(ScopeError::IncompleteCorrespondingEvents {
                    missing: format!("terminal event {:?} must not be mapped", start),
                });
            }
            if table.insert(start, end).is_some() {
                return Err(ScopeError::IncompleteCorrespondingEvents {
                    missing: format!("{:?} is mapped more than once", start),
                });
            }
        }

        let missing: Vec<String> = E::ALL
            .iter()
            .filter(|e| !e.is_terminal() && !table.contains_key(*e))
            .map(|e| format!("{:?}", e))
            .collect();
        if !missing.is_empty() {
            return Err(ScopeError::IncompleteCorrespondingEvents {
                missing: format!("no end event for {}", missing.join(", ")),
            });
        }

        Ok(Self { table })
    }

    /// The end event for a binding made while the component is at `event`.
    ///
    /// Fails with [`ScopeError::LifecycleEnded`] for the terminal event.
    pub fn end_for(&self, event: E) -> Result<E> {
        self.table
            .get(&event)
            .copied()
            .ok_or_else(|| ScopeError::ended(event))
    }
}
