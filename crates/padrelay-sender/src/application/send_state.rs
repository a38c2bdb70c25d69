//! StateSender: samples the controller and transmits state packets.
//!
//! # Per-tick pipeline
//!
//! ```text
//! CaptureBackend::sample ─► SendPolicy::should_send ─► stamp sequence ─► encode ─► DatagramTransport::send
//!        │                           │
//!        ▼                           ▼
//!   Disconnected → pause         Suppressed
//! ```
//!
//! # Send policies (for beginners)
//!
//! A send policy is a small strategy object deciding, frame by frame, whether
//! the current state is worth a packet:
//!
//! - [`AlwaysSend`] transmits every sample.  Highest bandwidth, lowest
//!   latency for analogue sticks, and every lost packet is repaired by the
//!   next sample.
//! - [`SendOnChange`] transmits only when a button or trigger changed or an
//!   axis moved further than the deadzone.  A heartbeat resends the current
//!   state periodically so the receiver's idle timeout does not evict a
//!   controller that is simply not being touched.
//!
//! # Disconnects
//!
//! When the capture backend reports [`CaptureError::Disconnected`] the
//! sender pauses: it stops sampling and only polls
//! [`CaptureBackend::is_connected`] at the sample cadence.  Both transitions
//! are logged once.  After a reconnect the policy forgets what it last sent,
//! so the first frame always goes out.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use padrelay_core::{SequenceCounter, StateCodec, StateRecord, WireLayout};
use tracing::{debug, info, trace, warn};

use crate::infrastructure::input_capture::{CaptureBackend, CaptureError};
use crate::infrastructure::network::DatagramTransport;

// ── Send policies ─────────────────────────────────────────────────────────────

/// Decides whether a sampled frame is transmitted.
pub trait SendPolicy: Send {
    /// Returns `true` if `current` should be sent at `now`.
    ///
    /// A `true` answer is taken as "sent": the policy records `current` as
    /// its new baseline.
    fn should_send(&mut self, current: &StateRecord, now: Instant) -> bool;

    /// Forgets the baseline so the next frame is sent unconditionally.
    fn reset(&mut self);
}

/// Transmit every frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysSend;

impl SendPolicy for AlwaysSend {
    fn should_send(&mut self, _current: &StateRecord, _now: Instant) -> bool {
        true
    }

    fn reset(&mut self) {}
}

/// Transmit on change beyond a deadzone, plus a periodic heartbeat.
#[derive(Debug, Clone)]
pub struct SendOnChange {
    deadzone: u16,
    heartbeat: Option<Duration>,
    last_sent: Option<(StateRecord, Instant)>,
}

impl SendOnChange {
    /// `heartbeat` of `None` disables the periodic resend.
    pub fn new(deadzone: u16, heartbeat: Option<Duration>) -> Self {
        Self {
            deadzone,
            heartbeat,
            last_sent: None,
        }
    }
}

impl SendPolicy for SendOnChange {
    fn should_send(&mut self, current: &StateRecord, now: Instant) -> bool {
        let send = match &self.last_sent {
            None => true,
            Some((sent, at)) => {
                current.differs_from(sent, self.deadzone)
                    || self
                        .heartbeat
                        .is_some_and(|period| now.saturating_duration_since(*at) >= period)
            }
        };
        if send {
            self.last_sent = Some((*current, now));
        }
        send
    }

    fn reset(&mut self) {
        self.last_sent = None;
    }
}

// ── Sender ────────────────────────────────────────────────────────────────────

/// What one sampling tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A packet with this sequence number was handed to the transport.
    Sent { sequence: u32 },
    /// The policy judged the frame redundant.
    Suppressed,
    /// The transport rejected the packet.  The sequence number is spent.
    SendFailed { sequence: u32 },
    /// The controller is disconnected; nothing was sampled.
    Paused,
}

/// Counters kept by [`StateSender`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SenderStats {
    pub sent: u64,
    pub suppressed: u64,
    pub send_failures: u64,
    pub paused_ticks: u64,
}

/// The Send State use case.
pub struct StateSender {
    capture: Arc<dyn CaptureBackend>,
    transport: Arc<dyn DatagramTransport>,
    policy: Box<dyn SendPolicy>,
    codec: StateCodec,
    sequence: SequenceCounter,
    slot_hint: u8,
    connected: bool,
    transport_ok: bool,
    stats: SenderStats,
}

impl StateSender {
    pub fn new(
        layout: WireLayout,
        capture: Arc<dyn CaptureBackend>,
        transport: Arc<dyn DatagramTransport>,
        policy: Box<dyn SendPolicy>,
    ) -> Self {
        Self {
            capture,
            transport,
            policy,
            codec: StateCodec::new(layout),
            sequence: SequenceCounter::starting_at(1),
            slot_hint: 0,
            connected: true,
            transport_ok: true,
            stats: SenderStats::default(),
        }
    }

    /// Slot requested in every packet.  Receivers may ignore it.
    #[must_use]
    pub fn with_slot_hint(mut self, slot_hint: u8) -> Self {
        self.slot_hint = slot_hint;
        self
    }

    pub fn stats(&self) -> SenderStats {
        self.stats
    }

    pub fn is_paused(&self) -> bool {
        !self.connected
    }

    /// Runs one sampling step at `now`.
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        if !self.connected {
            if !self.capture.is_connected() {
                self.stats.paused_ticks += 1;
                return TickOutcome::Paused;
            }
            info!("controller reconnected, resuming transmission");
            self.connected = true;
            self.policy.reset();
        }

        let record = match self.capture.sample() {
            Ok(record) => record,
            Err(CaptureError::Disconnected) => {
                warn!("controller disconnected, pausing transmission");
                self.connected = false;
                self.stats.paused_ticks += 1;
                return TickOutcome::Paused;
            }
            Err(e) => {
                // Transient backend trouble: skip the frame, the next one carries full state.
                debug!("capture failed: {e}");
                self.stats.suppressed += 1;
                return TickOutcome::Suppressed;
            }
        };

        if !self.policy.should_send(&record, now) {
            self.stats.suppressed += 1;
            return TickOutcome::Suppressed;
        }

        let sequence = self.sequence.next();
        let packet = self
            .codec
            .encode(&record.with_slot_hint(self.slot_hint).with_sequence(sequence));

        match self.transport.send(&packet) {
            Ok(()) => {
                if !self.transport_ok {
                    info!("transmission recovered at seq {sequence}");
                    self.transport_ok = true;
                }
                trace!("sent seq {sequence}");
                self.stats.sent += 1;
                TickOutcome::Sent { sequence }
            }
            Err(e) => {
                if self.transport_ok {
                    warn!("failed to send state packet: {e}");
                    self.transport_ok = false;
                } else {
                    debug!("failed to send state packet: {e}");
                }
                self.stats.send_failures += 1;
                TickOutcome::SendFailed { sequence }
            }
        }
    }

    /// Ticks every `sample_interval` until `running` is cleared.
    ///
    /// Blocks the calling thread; run it on a dedicated or blocking thread.
    pub fn run(&mut self, sample_interval: Duration, running: Arc<AtomicBool>) -> SenderStats {
        let mut next = Instant::now();
        info!("sender started (sample interval {sample_interval:?})");

        while running.load(Ordering::Relaxed) {
            let now = Instant::now();
            self.tick(now);

            next += sample_interval;
            // Fell behind (system suspend, debugger): restart the cadence instead of bursting.
            if next < now {
                next = now + sample_interval;
            }
            std::thread::sleep(next.saturating_duration_since(Instant::now()));
        }

        info!(
            "sender stopped: sent={}, suppressed={}, send_failures={}",
            self.stats.sent, self.stats.suppressed, self.stats.send_failures
        );
        self.stats
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
