//! Per-process sequence numbers stamped into every outgoing header.
//!
//! # Why number the frames? (for beginners)
//!
//! Announcements travel over UDP broadcast, which may duplicate or reorder
//! datagrams.  Receivers do not reorder anything, but a monotonically
//! increasing number in each header lets a log reader tell a genuine second
//! announcement apart from a duplicated datagram.
//!
//! The counter is an `AtomicU64`, so the broadcast sender, the subscription
//! caller, and the stop fan-out can all draw numbers from one shared counter
//! without a lock.

use std::sync::atomic::{AtomicU64, Ordering};

/// A lock-free, monotonically increasing counter for frame sequence numbers.
///
/// Starts at 0 and wraps from `u64::MAX` back to 0.
///
/// # Examples
///
/// ```rust
/// use collab_core::protocol::SequenceCounter;
///
/// let counter = SequenceCounter::new();
/// assert_eq!(counter.next(), 0);
/// assert_eq!(counter.next(), 1);
/// ```
#[derive(Debug, Default)]
pub struct SequenceCounter {
    inner: AtomicU64,
}

impl SequenceCounter {
    /// `const` so a process-wide counter can live in a `static`.
    pub const fn new() -> Self {
        Self {
            inner: AtomicU64::new(0),
        }
    }

    /// Returns the next sequence number and advances the counter.
    ///
    /// `Relaxed` is enough: the numbers label frames, they do not publish
    /// any other memory to the reader.
    pub fn next(&self) -> u64 {
        self.inner.fetch_add(1, Ordering::Relaxed)
    }
}
