//! Identifiers and a simple allocator for constraint entries.

use serde::{Deserialize, Serialize};

/// Identity of one registration in a blend stack. Adding the same provider
/// twice yields two distinct ids.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct EntryId(pub u64);

/// Monotonic allocator for EntryId.
#[derive(Default, Debug)]
pub struct IdAllocator {
    next_entry: u64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn alloc_entry(&mut self) -> EntryId {
        let id = EntryId(self.next_entry);
        self.next_entry = self.next_entry.wrapping_add(1);
        id
    }
}
