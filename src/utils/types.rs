use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies one live connection. Bound into a user record while that user is logged in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnId(pub u64);

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

#[derive(Debug, Default)]
pub struct ConnIdAllocator {
    next: AtomicU64,
}

impl ConnIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&self) -> ConnId {
        ConnId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}
