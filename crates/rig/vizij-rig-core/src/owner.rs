//! Liveness handles for provider owners.
//!
//! A gameplay object keeps an [`OwnerToken`] for as long as it exists; the
//! compositor only ever sees the matching [`OwnerHandle`] and asks it whether
//! the owner is still around. Dropping (or releasing) the token is how an
//! owner announces its destruction.

use std::fmt;
use std::rc::{Rc, Weak};

/// Strong side of an owner liveness pair. Not `Clone`: one token, one owner.
pub struct OwnerToken {
    alive: Option<Rc<()>>,
}

impl OwnerToken {
    pub fn new() -> Self {
        Self {
            alive: Some(Rc::new(())),
        }
    }

    /// Observer handle for this owner.
    pub fn handle(&self) -> OwnerHandle {
        match &self.alive {
            Some(rc) => OwnerHandle(HandleKind::Bound(Rc::downgrade(rc))),
            None => OwnerHandle(HandleKind::Bound(Weak::new())),
        }
    }

    /// Mark the owner destroyed without dropping the token.
    pub fn release(&mut self) {
        self.alive = None;
    }

    pub fn is_alive(&self) -> bool {
        self.alive.is_some()
    }
}

impl Default for OwnerToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for OwnerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnerToken")
            .field("alive", &self.is_alive())
            .finish()
    }
}

#[derive(Clone)]
enum HandleKind {
    /// Not tied to any owner; always reports alive.
    Detached,
    Bound(Weak<()>),
}

/// Weak observer of an [`OwnerToken`].
#[derive(Clone)]
pub struct OwnerHandle(HandleKind);

impl OwnerHandle {
    pub fn detached() -> Self {
        Self(HandleKind::Detached)
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        match &self.0 {
            HandleKind::Detached => true,
            HandleKind::Bound(w) => w.strong_count() > 0,
        }
    }

    /// Two handles observe the same owner. Detached handles never compare equal.
    pub fn ptr_eq(&self, other: &OwnerHandle) -> bool {
        match (&self.0, &other.0) {
            (HandleKind::Bound(a), HandleKind::Bound(b)) => Weak::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Default for OwnerHandle {
    fn default() -> Self {
        Self::detached()
    }
}

impl fmt::Debug for OwnerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.0 {
            HandleKind::Detached => "detached",
            HandleKind::Bound(_) => "bound",
        };
        f.debug_struct("OwnerHandle")
            .field("kind", &kind)
            .field("alive", &self.is_alive())
            .finish()
    }
}
