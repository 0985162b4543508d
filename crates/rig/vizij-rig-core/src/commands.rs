//! Deferred add/remove requests.
//!
//! Code that cannot borrow the compositor mutably (providers answering a
//! query mid-tick, callbacks holding only a queue handle) pushes commands
//! here. They are applied at the start of the next fixed tick in submission
//! order.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::provider::{ConstraintAxis, ConstraintProvider, SharedProvider};

pub enum ConstraintCommand {
    Add {
        axis: ConstraintAxis,
        provider: Weak<RefCell<dyn ConstraintProvider>>,
        priority: i32,
        blend_duration: f32,
    },
    Remove {
        axis: ConstraintAxis,
        provider: Weak<RefCell<dyn ConstraintProvider>>,
        blend_duration: f32,
    },
}

impl fmt::Debug for ConstraintCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintCommand::Add {
                axis,
                priority,
                blend_duration,
                ..
            } => f
                .debug_struct("Add")
                .field("axis", axis)
                .field("priority", priority)
                .field("blend_duration", blend_duration)
                .finish(),
            ConstraintCommand::Remove {
                axis,
                blend_duration,
                ..
            } => f
                .debug_struct("Remove")
                .field("axis", axis)
                .field("blend_duration", blend_duration)
                .finish(),
        }
    }
}

/// Cloneable handle to a compositor's pending command list.
#[derive(Clone, Default)]
pub struct CommandQueue {
    inner: Rc<RefCell<Vec<ConstraintCommand>>>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &self,
        axis: ConstraintAxis,
        provider: &SharedProvider,
        priority: i32,
        blend_duration: f32,
    ) {
        self.push(ConstraintCommand::Add {
            axis,
            provider: Rc::downgrade(provider),
            priority,
            blend_duration,
        });
    }

    pub fn remove(&self, axis: ConstraintAxis, provider: &SharedProvider, blend_duration: f32) {
        self.push(ConstraintCommand::Remove {
            axis,
            provider: Rc::downgrade(provider),
            blend_duration,
        });
    }

    pub fn push(&self, command: ConstraintCommand) {
        self.inner.borrow_mut().push(command);
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }

    /// Take every pending command, leaving the queue empty.
    pub fn drain(&self) -> Vec<ConstraintCommand> {
        std::mem::take(&mut *self.inner.borrow_mut())
    }
}

impl fmt::Debug for CommandQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandQueue")
            .field("pending", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{share, FixedProvider};

    #[test]
    fn drain_preserves_submission_order() {
        let queue = CommandQueue::new();
        let p = share(FixedProvider::position([1.0, 0.0, 0.0]));
        queue.add(ConstraintAxis::Position, &p, 1, 0.0);
        queue.remove(ConstraintAxis::Position, &p, 0.5);
        let clone = queue.clone();
        assert_eq!(clone.len(), 2);

        let drained = queue.drain();
        assert!(matches!(drained[0], ConstraintCommand::Add { priority: 1, .. }));
        assert!(matches!(drained[1], ConstraintCommand::Remove { .. }));
        assert!(clone.is_empty());
    }
}
