//! RelayStateUseCase: turns received datagrams into virtual-device updates.
//!
//! This use case sits at the application layer and delegates to a
//! [`VirtualDevice`] trait object for the actual device update.  The
//! device implementations live in the infrastructure layer.
//!
//! # Per-datagram pipeline
//!
//! ```text
//! bytes ─decode─► StateRecord ─resolve─► slot ─gate─► touch ─► VirtualDevice::apply
//!          │                     │              │
//!          ▼                     ▼              ▼
//!     Malformed            NoCapacity         Stale        (all dropped)
//! ```
//!
//! Resolve, gate, and touch happen in one critical section on the shared
//! session table.  The lock is released before `apply`, so a slow device
//! never blocks the sweeper.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use padrelay_core::{peek_version, CodecError, SequenceGate, SessionSnapshot, StateCodec, StateRecord, WireLayout};
use thiserror::Error;
use tracing::{debug, trace, warn};

use super::{lock_table, SharedSessionTable};

/// Error type for virtual-device operations.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("platform error: {0}")]
    Platform(String),
    #[error("slot {0} is outside the device's range")]
    SlotOutOfRange(u8),
    #[error("virtual device is gone")]
    Disconnected,
}

/// Virtual controller backend, one controller per slot.
///
/// Each supported platform provides an implementation in the infrastructure
/// layer.  `apply` must update the whole controller state for a slot in one
/// step; the receiver never sends partial state.
#[cfg_attr(test, mockall::automock)]
pub trait VirtualDevice: Send + Sync {
    /// Sets the controller on `slot` to `record`.
    fn apply(&self, slot: u8, record: &StateRecord) -> Result<(), DeviceError>;

    /// Returns the controller on `slot` to the neutral state.
    fn reset(&self, slot: u8) -> Result<(), DeviceError>;

    /// Removes the controller on `slot`.
    fn release(&self, slot: u8) -> Result<(), DeviceError>;
}

/// Why a datagram did not reach the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Too short, foreign marker, or other protocol version.
    Malformed(CodecError),
    /// New sender while every slot is taken.
    NoCapacity,
    /// Sequence number not newer than the last applied one.
    Stale { last: Option<u32>, incoming: u32 },
}

/// Result of handling one datagram.
#[derive(Debug)]
pub enum RelayOutcome {
    /// The record was applied to the device.
    Applied { slot: u8, sequence: u32 },
    /// The record was accepted but the device refused it.  The session stays.
    DeviceFailed { slot: u8, error: DeviceError },
    /// The datagram was dropped before reaching the device.
    Dropped(DropReason),
}

/// Receiver-wide packet counters.
#[derive(Debug, Default)]
pub struct RelayStats {
    decode_rejected: AtomicU64,
    no_capacity: AtomicU64,
    stale: AtomicU64,
    applied: AtomicU64,
    device_errors: AtomicU64,
}

/// Point-in-time copy of [`RelayStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStatsSnapshot {
    pub decode_rejected: u64,
    pub no_capacity: u64,
    pub stale: u64,
    pub applied: u64,
    pub device_errors: u64,
}

impl RelayStats {
    pub fn snapshot(&self) -> RelayStatsSnapshot {
        RelayStatsSnapshot {
            decode_rejected: self.decode_rejected.load(Ordering::Relaxed),
            no_capacity: self.no_capacity.load(Ordering::Relaxed),
            stale: self.stale.load(Ordering::Relaxed),
            applied: self.applied.load(Ordering::Relaxed),
            device_errors: self.device_errors.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// The Relay State use case.
pub struct RelayStateUseCase {
    codec: StateCodec,
    gate: SequenceGate,
    table: SharedSessionTable,
    device: Arc<dyn VirtualDevice>,
    honor_slot_hints: bool,
    stats: RelayStats,
}

impl RelayStateUseCase {
    /// Creates a relay for `layout` that assigns the lowest free slot to new
    /// senders.
    pub fn new(layout: WireLayout, table: SharedSessionTable, device: Arc<dyn VirtualDevice>) -> Self {
        let codec = StateCodec::new(layout);
        Self {
            gate: SequenceGate::new(codec.sequence_bits()),
            codec,
            table,
            device,
            honor_slot_hints: false,
            stats: RelayStats::default(),
        }
    }

    /// Lets new senders claim the slot named in their packet's hint when free.
    #[must_use]
    pub fn with_slot_hints(mut self, honor: bool) -> Self {
        self.honor_slot_hints = honor;
        self
    }

    pub fn codec(&self) -> &StateCodec {
        &self.codec
    }

    pub fn stats(&self) -> RelayStatsSnapshot {
        self.stats.snapshot()
    }

    /// Copies out every live session, ordered by slot.
    pub fn sessions(&self, now: Instant) -> Vec<SessionSnapshot<SocketAddr>> {
        lock_table(&self.table).snapshot(now)
    }

    /// Runs one datagram from `sender` through the pipeline.
    ///
    /// Never fails: every problem is reported through [`RelayOutcome`] and
    /// counted in the stats.
    pub fn handle_datagram(&self, datagram: &[u8], sender: SocketAddr, now: Instant) -> RelayOutcome {
        let record = match self.codec.decode(datagram) {
            Ok(record) => record,
            Err(e) => {
                RelayStats::bump(&self.stats.decode_rejected);
                self.log_malformed(datagram, sender, e);
                return RelayOutcome::Dropped(DropReason::Malformed(e));
            }
        };

        let slot = match self.admit(&record, sender, now) {
            Ok(slot) => slot,
            Err(reason) => return RelayOutcome::Dropped(reason),
        };

        match self.device.apply(slot, &record) {
            Ok(()) => {
                RelayStats::bump(&self.stats.applied);
                RelayOutcome::Applied {
                    slot,
                    sequence: record.sequence(),
                }
            }
            Err(error) => {
                RelayStats::bump(&self.stats.device_errors);
                warn!("device apply failed for slot {slot} (seq {}): {error}", record.sequence());
                RelayOutcome::DeviceFailed { slot, error }
            }
        }
    }

    /// Resolve, gate, and touch under one table lock.  Returns the slot to apply to.
    fn admit(&self, record: &StateRecord, sender: SocketAddr, now: Instant) -> Result<u8, DropReason> {
        let mut table = lock_table(&self.table);

        let resolved = if self.honor_slot_hints {
            table.resolve_with_hint(sender, record.slot_hint(), now)
        } else {
            table.resolve(sender, now)
        };
        let (slot, last) = match resolved {
            Ok(session) => (session.assigned_slot(), session.last_sequence()),
            Err(e) => {
                RelayStats::bump(&self.stats.no_capacity);
                debug!("dropping packet from {sender}: {e}");
                return Err(DropReason::NoCapacity);
            }
        };

        let incoming = record.sequence();
        if !self.gate.accept(last, incoming) {
            table.reject(&sender);
            RelayStats::bump(&self.stats.stale);
            trace!("stale packet from {sender}: seq {incoming} after {last:?}");
            return Err(DropReason::Stale { last, incoming });
        }

        table.touch(&sender, incoming, now);
        Ok(slot)
    }

    fn log_malformed(&self, datagram: &[u8], sender: SocketAddr, error: CodecError) {
        match peek_version(datagram).and_then(WireLayout::from_version) {
            Some(layout) if layout != self.codec.layout() => debug!(
                "dropping packet from {sender}: sender uses the {layout:?} layout, receiver expects {:?}",
                self.codec.layout()
            ),
            _ => debug!("dropping packet from {sender}: {error}"),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
