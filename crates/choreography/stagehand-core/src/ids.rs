//! Identifiers and the monotonic allocator for performances.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of one running performance. Never reused by the scheduler that issued it.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct PerformanceId(pub u64);

impl fmt::Display for PerformanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "perf-{}", self.0)
    }
}

/// Monotonic allocator owned by a single scheduler instance.
/// IDs start at 1 so that 0 never shows up in emitted commands.
#[derive(Debug)]
pub struct PerformanceIdAllocator {
    next: u64,
}

impl Default for PerformanceIdAllocator {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl PerformanceIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn alloc(&mut self) -> PerformanceId {
        let id = PerformanceId(self.next);
        self.next = self.next.wrapping_add(1);
        id
    }

    /// Peek at the id the next call to `alloc` will hand out.
    #[inline]
    pub fn peek(&self) -> PerformanceId {
        PerformanceId(self.next)
    }

    /// Test hook: restart numbering from 1.
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
