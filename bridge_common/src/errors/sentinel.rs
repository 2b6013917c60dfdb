//! Process-wide sentinel errors.
//!
//! Sentinels are `static` items; two sentinels are the same error only if
//! they are the same item. The message text plays no part in comparison.

use std::fmt;

/// A constant error identity for a fixed domain condition.
pub struct Sentinel {
    message: &'static str,
}

impl Sentinel {
    /// Define a sentinel. Only meaningful in a `static` item.
    pub const fn new(message: &'static str) -> Self {
        Self { message }
    }

    /// The sentinel's message text.
    pub const fn message(&self) -> &'static str {
        self.message
    }

    /// Identity comparison.
    #[inline]
    pub fn same_as(&self, other: &Sentinel) -> bool {
        std::ptr::eq(self, other)
    }
}

impl fmt::Display for Sentinel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message)
    }
}

impl fmt::Debug for Sentinel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sentinel({:?} @ {:p})", self.message, self)
    }
}

impl std::error::Error for Sentinel {}

// Repository layer lookups
/// A looked-up key does not exist.
pub static NOT_FOUND: Sentinel = Sentinel::new("not found");
/// An inserted key already exists.
pub static DUPLICATE_VALUE: Sentinel = Sentinel::new("duplicate value");
