//! SessionTable: slot allocation and liveness tracking for senders.
//!
//! Every distinct sender identity (its source address) that delivers a valid
//! packet gets a [`Session`] bound to one virtual-device *slot*.  The slot
//! stays the same for the whole session so the consumer sees one stable
//! virtual controller per producer.
//!
//! # Slot lifecycle
//!
//! ```text
//! Free ──resolve──► Active ──sweep_expired──► Draining ──release_slot──► Free
//! ```
//!
//! An evicted session's slot does not become free immediately.  It sits in
//! `Draining` until the caller has reset the virtual device for that slot and
//! calls [`SessionTable::release_slot`].  A new sender can therefore never
//! receive a slot whose device still shows the previous sender's stuck state,
//! even though the caller drops the table lock while it talks to the device.
//!
//! The table performs no I/O and never calls a device backend.  Shared use
//! goes through a single `Mutex<SessionTable>`; every method takes
//! `&mut self` or `&self`, so the borrow checker enforces one writer at a time.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::Hash;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::debug;

/// Largest number of slots a table can manage (slot ids are one byte).
pub const MAX_SLOTS: usize = 256;

/// Errors returned by [`SessionTable`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    /// Every slot is either active or draining.
    #[error("no free slot: all {max_slots} slots are in use")]
    NoCapacity { max_slots: usize },
}

/// Server-side tracking record for one sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    assigned_slot: u8,
    created_at: Instant,
    last_seen: Instant,
    last_sequence: Option<u32>,
    packets_accepted: u64,
    packets_rejected: u64,
}

impl Session {
    fn new(slot: u8, now: Instant) -> Self {
        Self {
            assigned_slot: slot,
            created_at: now,
            last_seen: now,
            last_sequence: None,
            packets_accepted: 0,
            packets_rejected: 0,
        }
    }

    pub fn assigned_slot(&self) -> u8 {
        self.assigned_slot
    }

    pub fn last_seen(&self) -> Instant {
        self.last_seen
    }

    /// Sequence number of the last applied record; `None` before the first.
    pub fn last_sequence(&self) -> Option<u32> {
        self.last_sequence
    }

    pub fn packets_accepted(&self) -> u64 {
        self.packets_accepted
    }

    pub fn packets_rejected(&self) -> u64 {
        self.packets_rejected
    }
}

/// A copy of one session's state, safe to hand out beyond the table lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot<K> {
    pub identity: K,
    pub slot: u8,
    pub last_sequence: Option<u32>,
    pub packets_accepted: u64,
    pub packets_rejected: u64,
    /// Time since the session was created.
    pub connected_for: Duration,
    /// Time since the last accepted packet.
    pub idle: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Free,
    Active,
    Draining,
}

/// Maps sender identities to slots.
///
/// The identity type defaults to [`SocketAddr`], the sender's source address.
#[derive(Debug)]
pub struct SessionTable<K = SocketAddr> {
    sessions: HashMap<K, Session>,
    slots: Vec<SlotState>,
}

impl<K> SessionTable<K>
where
    K: Eq + Hash + Copy + std::fmt::Debug,
{
    /// Creates a table managing slots `0..max_slots`.
    ///
    /// # Panics
    ///
    /// Panics if `max_slots` is 0 or greater than [`MAX_SLOTS`].  The
    /// configuration layer validates this before a table is built.
    pub fn new(max_slots: usize) -> Self {
        assert!(
            (1..=MAX_SLOTS).contains(&max_slots),
            "max_slots must be between 1 and {MAX_SLOTS}, got {max_slots}"
        );
        Self {
            sessions: HashMap::with_capacity(max_slots),
            slots: vec![SlotState::Free; max_slots],
        }
    }

    pub fn max_slots(&self) -> usize {
        self.slots.len()
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Number of slots a new sender could be given right now.
    pub fn free_slots(&self) -> usize {
        self.slots.iter().filter(|s| **s == SlotState::Free).count()
    }

    /// Slots evicted but not yet released by the caller.
    pub fn draining_slots(&self) -> Vec<u8> {
        self.slots_in(SlotState::Draining)
    }

    pub fn get(&self, identity: &K) -> Option<&Session> {
        self.sessions.get(identity)
    }

    /// Returns the session for `identity`, creating one on the lowest free
    /// slot if the identity is new.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NoCapacity`] if the identity is new and no slot
    /// is free.  Nothing is created in that case.
    pub fn resolve(&mut self, identity: K, now: Instant) -> Result<&mut Session, SessionError> {
        self.resolve_inner(identity, None, now)
    }

    /// Like [`resolve`](Self::resolve), but a new session takes slot `hint`
    /// when it is in range and free.  Otherwise the lowest free slot is used.
    ///
    /// The hint is ignored for identities that already have a session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NoCapacity`] under the same conditions as
    /// [`resolve`](Self::resolve).
    pub fn resolve_with_hint(
        &mut self,
        identity: K,
        hint: u8,
        now: Instant,
    ) -> Result<&mut Session, SessionError> {
        self.resolve_inner(identity, Some(hint), now)
    }

    fn resolve_inner(
        &mut self,
        identity: K,
        hint: Option<u8>,
        now: Instant,
    ) -> Result<&mut Session, SessionError> {
        match self.sessions.entry(identity) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let slot = pick_slot(&self.slots, hint).ok_or(SessionError::NoCapacity {
                    max_slots: self.slots.len(),
                })?;
                self.slots[usize::from(slot)] = SlotState::Active;
                debug!("session opened for {identity:?} on slot {slot}");
                Ok(entry.insert(Session::new(slot, now)))
            }
        }
    }

    /// Records an applied packet.  Call only after the sequence gate accepted it.
    ///
    /// Returns `false` if `identity` has no session.
    pub fn touch(&mut self, identity: &K, sequence: u32, now: Instant) -> bool {
        match self.sessions.get_mut(identity) {
            Some(session) => {
                session.last_seen = now;
                session.last_sequence = Some(sequence);
                session.packets_accepted += 1;
                true
            }
            None => false,
        }
    }

    /// Records a packet dropped as stale.  Does not refresh liveness.
    ///
    /// Returns `false` if `identity` has no session.
    pub fn reject(&mut self, identity: &K) -> bool {
        match self.sessions.get_mut(identity) {
            Some(session) => {
                session.packets_rejected += 1;
                true
            }
            None => false,
        }
    }

    /// Removes every session silent for longer than `timeout` and returns
    /// their slots in ascending order.
    ///
    /// A session is expired when `now - last_seen > timeout`.  The returned
    /// slots are `Draining`: the caller must reset the device for each and
    /// then call [`release_slot`](Self::release_slot).
    pub fn sweep_expired(&mut self, now: Instant, timeout: Duration) -> Vec<u8> {
        let expired: Vec<K> = self
            .sessions
            .iter()
            .filter(|(_, s)| now.saturating_duration_since(s.last_seen) > timeout)
            .map(|(id, _)| *id)
            .collect();

        let mut evicted = Vec::with_capacity(expired.len());
        for identity in expired {
            if let Some(session) = self.sessions.remove(&identity) {
                let slot = session.assigned_slot;
                self.slots[usize::from(slot)] = SlotState::Draining;
                debug!(
                    "session for {identity:?} on slot {slot} expired after {} accepted packets",
                    session.packets_accepted
                );
                evicted.push(slot);
            }
        }
        evicted.sort_unstable();
        evicted
    }

    /// Removes every session regardless of liveness, e.g. on shutdown.
    ///
    /// The slots are left `Draining` exactly as with
    /// [`sweep_expired`](Self::sweep_expired).
    pub fn evict_all(&mut self) -> Vec<u8> {
        let mut evicted: Vec<u8> = self
            .sessions
            .drain()
            .map(|(_, session)| session.assigned_slot)
            .collect();
        for slot in &evicted {
            self.slots[usize::from(*slot)] = SlotState::Draining;
        }
        evicted.sort_unstable();
        evicted
    }

    /// Marks a draining slot free again.
    ///
    /// Returns `false` (and changes nothing) if the slot is not draining.
    pub fn release_slot(&mut self, slot: u8) -> bool {
        match self.slots.get_mut(usize::from(slot)) {
            Some(state @ SlotState::Draining) => {
                *state = SlotState::Free;
                true
            }
            _ => false,
        }
    }

    /// Copies out every live session, ordered by slot.
    pub fn snapshot(&self, now: Instant) -> Vec<SessionSnapshot<K>> {
        let mut out: Vec<SessionSnapshot<K>> = self
            .sessions
            .iter()
            .map(|(id, s)| SessionSnapshot {
                identity: *id,
                slot: s.assigned_slot,
                last_sequence: s.last_sequence,
                packets_accepted: s.packets_accepted,
                packets_rejected: s.packets_rejected,
                connected_for: now.saturating_duration_since(s.created_at),
                idle: now.saturating_duration_since(s.last_seen),
            })
            .collect();
        out.sort_by_key(|s| s.slot);
        out
    }

    fn slots_in(&self, wanted: SlotState) -> Vec<u8> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| **s == wanted)
            .map(|(i, _)| i as u8)
            .collect()
    }
}

/// The hinted slot if it is in range and free, else the lowest free slot.
fn pick_slot(slots: &[SlotState], hint: Option<u8>) -> Option<u8> {
    hint.filter(|h| slots.get(usize::from(*h)) == Some(&SlotState::Free))
        .or_else(|| {
            slots
                .iter()
                .position(|s| *s == SlotState::Free)
                .map(|i| i as u8)
        })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(1000);

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([192, 168, 1, 10], port))
    }

    #[test]
    fn test_table_starts_empty() {
        let table: SessionTable = SessionTable::new(4);
        assert!(table.is_empty());
        assert_eq!(table.free_slots(), 4);
        assert_eq!(table.max_slots(), 4);
    }

    #[test]
    fn test_resolve_assigns_lowest_free_slot() {
        // Arrange
        let mut table = SessionTable::new(4);
        let now = Instant::now();

        // Act
        let a = table.resolve(addr(1), now).unwrap().assigned_slot();
        let b = table.resolve(addr(2), now).unwrap().assigned_slot();

        // Assert
        assert_eq!((a, b), (0, 1));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_resolve_returns_existing_session() {
        let mut table = SessionTable::new(4);
        let now = Instant::now();
        let first = table.resolve(addr(1), now).unwrap().assigned_slot();
        let again = table.resolve(addr(1), now).unwrap().assigned_slot();
        assert_eq!(first, again);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_new_session_has_no_last_sequence() {
        let mut table = SessionTable::new(1);
        let session = table.resolve(addr(1), Instant::now()).unwrap();
        assert_eq!(session.last_sequence(), None);
        assert_eq!(session.packets_accepted(), 0);
    }

    #[test]
    fn test_resolve_full_table_returns_no_capacity_without_side_effects() {
        // Arrange
        let mut table = SessionTable::new(2);
        let now = Instant::now();
        table.resolve(addr(1), now).unwrap();
        table.resolve(addr(2), now).unwrap();

        // Act
        let result = table.resolve(addr(3), now).map(|s| s.assigned_slot());

        // Assert
        assert_eq!(result, Err(SessionError::NoCapacity { max_slots: 2 }));
        assert!(table.get(&addr(3)).is_none());
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_resolve_with_hint_takes_free_hinted_slot() {
        let mut table = SessionTable::new(4);
        let slot = table
            .resolve_with_hint(addr(1), 2, Instant::now())
            .unwrap()
            .assigned_slot();
        assert_eq!(slot, 2);
    }

    #[test]
    fn test_resolve_with_hint_falls_back_when_hint_taken_or_out_of_range() {
        let mut table = SessionTable::new(4);
        let now = Instant::now();
        table.resolve_with_hint(addr(1), 0, now).unwrap();
        let taken = table.resolve_with_hint(addr(2), 0, now).unwrap().assigned_slot();
        let out_of_range = table.resolve_with_hint(addr(3), 9, now).unwrap().assigned_slot();
        assert_eq!(taken, 1);
        assert_eq!(out_of_range, 2);
    }

    #[test]
    fn test_touch_updates_liveness_and_counters() {
        // Arrange
        let mut table = SessionTable::new(1);
        let t0 = Instant::now();
        table.resolve(addr(1), t0).unwrap();
        let t1 = t0 + Duration::from_millis(5);

        // Act
        assert!(table.touch(&addr(1), 17, t1));

        // Assert
        let session = table.get(&addr(1)).unwrap();
        assert_eq!(session.last_seen(), t1);
        assert_eq!(session.last_sequence(), Some(17));
        assert_eq!(session.packets_accepted(), 1);
    }

    #[test]
    fn test_touch_unknown_identity_returns_false() {
        let mut table: SessionTable = SessionTable::new(1);
        assert!(!table.touch(&addr(9), 1, Instant::now()));
        assert!(!table.reject(&addr(9)));
    }

    #[test]
    fn test_reject_counts_without_refreshing_liveness() {
        let mut table = SessionTable::new(1);
        let t0 = Instant::now();
        table.resolve(addr(1), t0).unwrap();
        table.reject(&addr(1));
        let session = table.get(&addr(1)).unwrap();
        assert_eq!(session.packets_rejected(), 1);
        assert_eq!(session.last_seen(), t0);
    }

    #[test]
    fn test_sweep_evicts_session_just_past_timeout() {
        // Arrange
        let mut table = SessionTable::new(2);
        let last_seen = Instant::now();
        table.resolve(addr(1), last_seen).unwrap();
        let now = last_seen + TIMEOUT + Duration::from_millis(1);

        // Act
        let evicted = table.sweep_expired(now, TIMEOUT);

        // Assert
        assert_eq!(evicted, vec![0]);
        assert!(table.is_empty());
    }

    #[test]
    fn test_sweep_retains_session_just_inside_timeout() {
        let mut table = SessionTable::new(2);
        let last_seen = Instant::now();
        table.resolve(addr(1), last_seen).unwrap();
        let now = last_seen + TIMEOUT - Duration::from_millis(1);

        assert!(table.sweep_expired(now, TIMEOUT).is_empty());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_sweep_at_exact_timeout_retains_session() {
        let mut table = SessionTable::new(1);
        let last_seen = Instant::now();
        table.resolve(addr(1), last_seen).unwrap();
        assert!(table.sweep_expired(last_seen + TIMEOUT, TIMEOUT).is_empty());
    }

    #[test]
    fn test_evicted_slot_is_not_reused_until_released() {
        // Arrange
        let mut table = SessionTable::new(1);
        let t0 = Instant::now();
        table.resolve(addr(1), t0).unwrap();
        let later = t0 + TIMEOUT * 2;
        assert_eq!(table.sweep_expired(later, TIMEOUT), vec![0]);

        // Act / Assert – draining slot blocks allocation
        assert_eq!(table.draining_slots(), vec![0]);
        assert!(table.resolve(addr(2), later).is_err());

        // Act / Assert – after release the slot is available again
        assert!(table.release_slot(0));
        assert_eq!(table.resolve(addr(2), later).unwrap().assigned_slot(), 0);
    }

    #[test]
    fn test_evict_all_drains_every_active_slot() {
        let mut table = SessionTable::new(3);
        let now = Instant::now();
        table.resolve(addr(1), now).unwrap();
        table.resolve(addr(2), now).unwrap();
        assert_eq!(table.evict_all(), vec![0, 1]);
        assert!(table.is_empty());
        assert_eq!(table.draining_slots(), vec![0, 1]);
        assert_eq!(table.free_slots(), 1);
    }

    #[test]
    fn test_release_slot_ignores_active_and_free_slots() {
        let mut table = SessionTable::new(2);
        table.resolve(addr(1), Instant::now()).unwrap();
        assert!(!table.release_slot(0), "active slot must not be released");
        assert!(!table.release_slot(1), "free slot is already free");
        assert!(!table.release_slot(200), "out-of-range slot");
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_sweep_returns_slots_in_ascending_order() {
        let mut table = SessionTable::new(4);
        let t0 = Instant::now();
        for port in 1..=4 {
            table.resolve(addr(port), t0).unwrap();
        }
        // Keep slot 1 alive
        table.touch(&addr(2), 1, t0 + TIMEOUT);
        let evicted = table.sweep_expired(t0 + TIMEOUT + Duration::from_millis(1), TIMEOUT);
        assert_eq!(evicted, vec![0, 2, 3]);
    }

    #[test]
    fn test_snapshot_is_ordered_by_slot() {
        let mut table = SessionTable::new(3);
        let now = Instant::now();
        table.resolve_with_hint(addr(1), 2, now).unwrap();
        table.resolve(addr(2), now).unwrap();
        let snap = table.snapshot(now);
        assert_eq!(snap.iter().map(|s| s.slot).collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(snap[0].identity, addr(2));
    }

    #[test]
    fn test_snapshot_reports_age_and_idle_time() {
        // Arrange
        let mut table = SessionTable::new(1);
        let t0 = Instant::now();
        table.resolve(addr(1), t0).unwrap();
        table.touch(&addr(1), 1, t0 + Duration::from_millis(300));

        // Act
        let snap = table.snapshot(t0 + Duration::from_millis(500));

        // Assert
        assert_eq!(snap[0].connected_for, Duration::from_millis(500));
        assert_eq!(snap[0].idle, Duration::from_millis(200));
        assert_eq!(snap[0].last_sequence, Some(1));
    }

    #[test]
    fn test_table_accepts_non_socket_identities() {
        let mut table: SessionTable<u32> = SessionTable::new(2);
        let now = Instant::now();
        assert_eq!(table.resolve(7, now).unwrap().assigned_slot(), 0);
    }

    #[test]
    #[should_panic(expected = "max_slots")]
    fn test_new_rejects_zero_slots() {
        let _: SessionTable = SessionTable::new(0);
    }

    #[test]
    fn test_table_supports_full_byte_range_of_slots() {
        let mut table: SessionTable<u32> = SessionTable::new(MAX_SLOTS);
        let now = Instant::now();
        for id in 0..MAX_SLOTS as u32 {
            table.resolve(id, now).unwrap();
        }
        assert_eq!(table.get(&255).unwrap().assigned_slot(), 255);
        assert!(table.resolve(9999, now).is_err());
    }
}
