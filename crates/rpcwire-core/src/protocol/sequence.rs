//! Sequence ids for request/reply correlation.
//!
//! # What is a sequence id? (for beginners)
//!
//! Every request envelope carries a 32-bit *sequence id*, and the peer copies
//! it into the matching reply.  The client uses it to:
//!
//! - **Correlate replies** – the reply to request 7 must carry id 7; anything
//!   else means the stream is out of step and cannot be trusted.
//! - **Track in-flight calls** – the pending-call table is keyed by id, so no
//!   two calls awaiting a reply may share one.
//!
//! # Thread safety
//!
//! The counter is a plain integer mutated through `&mut self`.  It lives
//! inside the dispatcher's connection lock together with the pending table,
//! so allocating an id and registering the call happen in one critical
//! section and need no atomics of their own.

/// A wrapping counter producing sequence ids.
///
/// The first id handed out is 1.  After `i32::MAX` the counter wraps to
/// `i32::MIN` without panicking.
///
/// # Examples
///
/// ```rust
/// use rpcwire_core::protocol::SequenceCounter;
///
/// let mut counter = SequenceCounter::new();
/// assert_eq!(counter.next(), 1);
/// assert_eq!(counter.next(), 2);
/// ```
#[derive(Debug, Default, Clone)]
pub struct SequenceCounter {
    /// The id handed out most recently (0 before the first call).
    last: i32,
}

impl SequenceCounter {
    /// Creates a counter whose first id is 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances the counter and returns the new id.
    pub fn next(&mut self) -> i32 {
        self.last = self.last.wrapping_add(1);
        self.last
    }

    /// Advances past every id for which `in_use` returns `true`.
    ///
    /// Returns `None` only if all 2^32 ids are in use.
    pub fn next_free(&mut self, in_use: impl Fn(i32) -> bool) -> Option<i32> {
        for _ in 0..=u32::MAX {
            let id = self.next();
            if !in_use(id) {
                return Some(id);
            }
        }
        None
    }

    /// The id handed out most recently, without advancing.
    pub fn current(&self) -> i32 {
        self.last
    }
}
