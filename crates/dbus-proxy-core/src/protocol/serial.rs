//! Thread-safe serial counter.
//!
//! Listener handles and subscription generations are both plain integers
//! handed out by a [`SerialCounter`].  Serials start at 1, so 0 never names a
//! live listener or subscription.
//!
//! # Thread safety
//!
//! The counter is a single `AtomicU64`.  Two threads calling [`SerialCounter::next`]
//! at the same time always receive different values.

use std::sync::atomic::{AtomicU64, Ordering};

/// A monotonically increasing source of non-zero serial numbers.
///
/// # Examples
///
/// ```rust
/// use dbus_proxy_core::protocol::SerialCounter;
///
/// let counter = SerialCounter::new();
/// assert_eq!(counter.next(), 1);
/// assert_eq!(counter.next(), 2);
/// ```
#[derive(Debug)]
pub struct SerialCounter {
    inner: AtomicU64,
}

impl SerialCounter {
    pub fn new() -> Self {
        Self {
            inner: AtomicU64::new(0),
        }
    }

    /// Returns the next serial.  Skips 0 if the counter ever wraps.
    ///
    /// `Relaxed` ordering is enough: serials identify things, they do not
    /// publish memory to other threads.
    pub fn next(&self) -> u64 {
        loop {
            let serial = self.inner.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
            if serial != 0 {
                return serial;
            }
        }
    }

    /// The most recently issued serial (0 if none).
    pub fn current(&self) -> u64 {
        self.inner.load(Ordering::Relaxed)
    }
}

impl Default for SerialCounter {
    fn default() -> Self {
        Self::new()
    }
}
