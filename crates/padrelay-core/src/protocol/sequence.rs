//! Sequence numbering on the sender and sequence gating on the receiver.
//!
//! # Why sequence numbers?
//!
//! Datagrams can arrive out of order or twice.  Every packet carries the full
//! controller state, so the receiver only ever wants the *latest* one: if a
//! packet with sequence 3 has been applied, an older packet 2 arriving late
//! must be dropped, or a released button would appear pressed again.
//!
//! Sequence numbers live on a ring of `2^bits` values (32 bits on the full
//! layout, 8 bits on the compact layout) and wrap around.  The
//! [`SequenceGate`] uses serial-number arithmetic to decide what "newer"
//! means across the wrap.

use std::sync::atomic::{AtomicU32, Ordering};

/// A thread-safe counter that stamps outgoing records.
///
/// Wraps around at `u32::MAX` back to 0 without panicking.  On the compact
/// layout only the low byte reaches the wire, which wraps at 255 the same way.
///
/// # Examples
///
/// ```rust
/// use padrelay_core::SequenceCounter;
///
/// let counter = SequenceCounter::starting_at(1);
/// assert_eq!(counter.next(), 1);
/// assert_eq!(counter.next(), 2);
/// ```
pub struct SequenceCounter {
    inner: AtomicU32,
}

impl SequenceCounter {
    /// Creates a new counter starting at 0.
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Creates a counter whose first [`next`](Self::next) returns `first`.
    pub fn starting_at(first: u32) -> Self {
        Self {
            inner: AtomicU32::new(first),
        }
    }

    /// Returns the next sequence number and atomically increments the counter.
    ///
    /// `Ordering::Relaxed` is enough: the value orders packets, it does not
    /// publish memory to other threads.
    pub fn next(&self) -> u32 {
        self.inner.fetch_add(1, Ordering::Relaxed)
    }

    /// Returns the value the next call to [`next`](Self::next) will hand out.
    pub fn current(&self) -> u32 {
        self.inner.load(Ordering::Relaxed)
    }
}

impl Default for SequenceCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Accept/reject decision for incoming sequence numbers.
///
/// `incoming` is newer than `last` when `(incoming - last) mod 2^bits` is
/// nonzero and strictly less than half the ring.  A distance of exactly half
/// the ring is ambiguous and is rejected as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceGate {
    bits: u32,
}

impl SequenceGate {
    /// Creates a gate for a ring of `2^bits` sequence numbers.
    ///
    /// # Panics
    ///
    /// Panics if `bits` is not in `1..=32`.
    pub fn new(bits: u32) -> Self {
        assert!((1..=32).contains(&bits), "sequence ring width must be 1..=32 bits");
        Self { bits }
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Returns `true` if a record carrying `incoming` should be applied.
    ///
    /// The first packet of a session (`last == None`) is always accepted.
    pub fn accept(&self, last: Option<u32>, incoming: u32) -> bool {
        match last {
            None => true,
            Some(last) => self.is_newer(incoming, last),
        }
    }

    /// Serial-number comparison: is `incoming` ahead of `last` on the ring?
    pub fn is_newer(&self, incoming: u32, last: u32) -> bool {
        let distance = incoming.wrapping_sub(last) & self.mask();
        distance != 0 && distance < self.half_ring()
    }

    fn mask(&self) -> u32 {
        if self.bits == 32 {
            u32::MAX
        } else {
            (1u32 << self.bits) - 1
        }
    }

    fn half_ring(&self) -> u32 {
        1u32 << (self.bits - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    // ── SequenceCounter ───────────────────────────────────────────────────────

    #[test]
    fn test_sequence_counter_starts_at_zero() {
        let counter = SequenceCounter::new();
        assert_eq!(counter.next(), 0);
    }

    #[test]
    fn test_sequence_counter_starting_at_one() {
        let counter = SequenceCounter::starting_at(1);
        let values: Vec<u32> = (0..5).map(|_| counter.next()).collect();
        assert_eq!(values, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_sequence_counter_wraps_at_u32_max() {
        // Arrange – start the counter one step before overflow
        let counter = SequenceCounter::starting_at(u32::MAX);

        // Act
        let before_wrap = counter.next();
        let after_wrap = counter.next();

        // Assert
        assert_eq!(before_wrap, u32::MAX);
        assert_eq!(after_wrap, 0, "counter must wrap to 0 after u32::MAX");
    }

    #[test]
    fn test_current_does_not_increment() {
        let counter = SequenceCounter::new();
        counter.next();
        assert_eq!(counter.current(), 1);
        assert_eq!(counter.next(), 1);
    }

    #[test]
    fn test_sequence_counter_is_thread_safe() {
        // Arrange
        let counter = Arc::new(SequenceCounter::new());
        let thread_count = 8;
        let increments_per_thread = 1000;

        // Act – increment from many threads simultaneously
        let handles: Vec<_> = (0..thread_count)
            .map(|_| {
                let c = Arc::clone(&counter);
                thread::spawn(move || (0..increments_per_thread).map(|_| c.next()).collect::<Vec<_>>())
            })
            .collect();

        let mut all_values: Vec<u32> = handles
            .into_iter()
            .flat_map(|h| h.join().expect("thread panicked"))
            .collect();

        // Assert – no two threads got the same sequence number
        all_values.sort_unstable();
        all_values.dedup();
        assert_eq!(all_values.len(), thread_count * increments_per_thread);
    }

    // ── SequenceGate (32-bit ring) ────────────────────────────────────────────

    #[test]
    fn test_gate_accepts_first_packet_of_session() {
        let gate = SequenceGate::new(32);
        assert!(gate.accept(None, 0));
        assert!(gate.accept(None, u32::MAX));
    }

    #[test]
    fn test_gate_accepts_next_sequence() {
        let gate = SequenceGate::new(32);
        assert!(gate.accept(Some(41), 42));
    }

    #[test]
    fn test_gate_rejects_previous_sequence() {
        let gate = SequenceGate::new(32);
        assert!(!gate.accept(Some(42), 41));
    }

    #[test]
    fn test_gate_rejects_duplicate() {
        let gate = SequenceGate::new(32);
        assert!(!gate.accept(Some(42), 42));
    }

    #[test]
    fn test_gate_accepts_wraparound_from_max_to_zero() {
        let gate = SequenceGate::new(32);
        assert!(gate.accept(Some(u32::MAX), 0));
        assert!(!gate.accept(Some(0), u32::MAX), "s-1 across the wrap is stale");
    }

    #[test]
    fn test_gate_half_ring_distance_is_rejected() {
        // Tie rule: exactly half the ring ahead is treated as stale.
        let gate = SequenceGate::new(32);
        let s = 1000u32;
        assert!(!gate.accept(Some(s), s.wrapping_add(1 << 31)));
        assert!(gate.accept(Some(s), s.wrapping_add((1 << 31) - 1)));
    }

    // ── SequenceGate (8-bit ring) ─────────────────────────────────────────────

    #[test]
    fn test_gate_8_bit_wraps_at_256() {
        let gate = SequenceGate::new(8);
        assert!(gate.accept(Some(255), 0));
        assert!(gate.accept(Some(250), 3));
        assert!(!gate.accept(Some(3), 250));
    }

    #[test]
    fn test_gate_8_bit_half_ring_tie_is_rejected() {
        let gate = SequenceGate::new(8);
        assert!(!gate.accept(Some(10), 138), "distance 128 is the tie and is stale");
        assert!(gate.accept(Some(10), 137), "distance 127 is newer");
        assert!(!gate.accept(Some(138), 10), "distance 128 backwards is stale too");
    }

    #[test]
    fn test_gate_8_bit_ignores_high_bits() {
        // Compact packets only carry the low byte; high bits never matter.
        let gate = SequenceGate::new(8);
        assert!(gate.accept(Some(0x0000_0005), 0x0000_0106));
    }

    #[test]
    #[should_panic(expected = "sequence ring width")]
    fn test_gate_rejects_zero_width_ring() {
        let _ = SequenceGate::new(0);
    }
}
