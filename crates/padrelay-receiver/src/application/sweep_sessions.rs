//! SweepSessionsUseCase: evicts senders that stopped sending.
//!
//! A sender that crashes or loses its network never says goodbye, so its
//! virtual controller would otherwise keep the last state forever (a held
//! button, a tilted stick).  The sweeper runs on a fixed period and, for every
//! session silent longer than the timeout:
//!
//! 1. Removes the session from the table (its slot becomes draining).
//! 2. Resets the controller on that slot to neutral and releases it.
//! 3. Marks the slot free so a new sender can take it.
//!
//! Steps 2 and 3 run with the table unlocked; a draining slot cannot be
//! handed out in between.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::relay_state::VirtualDevice;
use super::{lock_table, SharedSessionTable};

/// The Sweep Sessions use case.
pub struct SweepSessionsUseCase {
    table: SharedSessionTable,
    device: Arc<dyn VirtualDevice>,
    timeout: Duration,
}

impl SweepSessionsUseCase {
    pub fn new(table: SharedSessionTable, device: Arc<dyn VirtualDevice>, timeout: Duration) -> Self {
        Self { table, device, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Evicts every session idle for longer than the timeout at `now`.
    ///
    /// Returns the freed slots in ascending order.  Each slot's controller has
    /// been reset before the slot was marked free.
    pub fn sweep_once(&self, now: Instant) -> Vec<u8> {
        let evicted = lock_table(&self.table).sweep_expired(now, self.timeout);
        for &slot in &evicted {
            self.drain(slot, "timeout");
            info!("slot {slot} timed out and was reset");
        }
        evicted
    }

    /// Evicts every session, resets and releases their controllers.
    ///
    /// Called once on shutdown so no controller is left holding input.
    pub fn shutdown(&self) -> Vec<u8> {
        let evicted = lock_table(&self.table).evict_all();
        for &slot in &evicted {
            self.drain(slot, "shutdown");
        }
        if !evicted.is_empty() {
            info!("reset {} virtual controller(s) on shutdown", evicted.len());
        }
        evicted
    }

    /// Reset, release, then free.  Device failures are logged; the slot is
    /// freed regardless so it cannot leak.
    fn drain(&self, slot: u8, cause: &str) {
        if let Err(e) = self.device.reset(slot) {
            warn!("failed to reset slot {slot} on {cause}: {e}");
        }
        if let Err(e) = self.device.release(slot) {
            warn!("failed to release slot {slot} on {cause}: {e}");
        }
        lock_table(&self.table).release_slot(slot);
    }

    /// Sweeps every `period` until `running` is cleared.
    ///
    /// The flag is checked every `poll`, independent of `period`, so a long
    /// sweep period never delays shutdown.
    pub async fn run(&self, period: Duration, poll: Duration, running: Arc<AtomicBool>) {
        let mut sweep = interval(period);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut stop_check = interval(poll);
        stop_check.set_missed_tick_behavior(MissedTickBehavior::Skip);

        debug!("session sweeper started (period {period:?}, timeout {:?})", self.timeout);
        while running.load(Ordering::Relaxed) {
            tokio::select! {
                _ = sweep.tick() => {
                    self.sweep_once(Instant::now());
                }
                _ = stop_check.tick() => {}
            }
        }
        debug!("session sweeper stopped");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
