//! The controller state snapshot carried by every padrelay datagram.
//!
//! A [`StateRecord`] is one instant of controller state: which buttons are
//! held, where the two analog triggers sit, and the position of the four
//! analog axes (left stick X/Y, right stick X/Y).  It also carries the
//! sender's preferred slot and a sequence number.
//!
//! Records are plain `Copy` values with private fields.  Once built, a record
//! never changes; the `with_*` methods return a new record instead, so a
//! record that has been applied to a virtual device can never be altered
//! behind the receiver's back.

use serde::{Deserialize, Serialize};

// ── Protocol constants ────────────────────────────────────────────────────────

/// Fixed marker at the start of every packet (`"PDRL"`), used to reject
/// foreign traffic that happens to arrive on the relay port.
pub const FRAME_MARKER: u32 = 0x5044_524C;

/// Protocol version byte of the full-precision layout.
pub const VERSION_FULL: u8 = 0x01;

/// Protocol version byte of the compact layout.
pub const VERSION_COMPACT: u8 = 0x02;

/// Total size of a full-precision packet in bytes.
pub const FULL_PACKET_SIZE: usize = 22;

/// Total size of a compact packet in bytes.
pub const COMPACT_PACKET_SIZE: usize = 16;

/// Number of analog triggers in a record.
pub const TRIGGER_COUNT: usize = 2;

/// Number of analog axes in a record.
pub const AXIS_COUNT: usize = 4;

// ── Wire layouts ──────────────────────────────────────────────────────────────

/// The two packet layouts a deployment can choose from.
///
/// The layouts are not versions of one another: each has its own version
/// byte and its own decode path, and a codec configured for one rejects the
/// other with a version mismatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireLayout {
    /// 16-bit axes and a 32-bit sequence number (22 bytes).
    #[default]
    Full,
    /// 8-bit axes, an 8-bit wrapping sequence number, and a flags byte (16 bytes).
    Compact,
}

impl WireLayout {
    /// The protocol version byte written into every packet of this layout.
    pub fn version(self) -> u8 {
        match self {
            WireLayout::Full => VERSION_FULL,
            WireLayout::Compact => VERSION_COMPACT,
        }
    }

    /// Fixed packet size in bytes.
    pub fn packet_size(self) -> usize {
        match self {
            WireLayout::Full => FULL_PACKET_SIZE,
            WireLayout::Compact => COMPACT_PACKET_SIZE,
        }
    }

    /// Width of the sequence-number ring on the wire.
    pub fn sequence_bits(self) -> u32 {
        match self {
            WireLayout::Full => 32,
            WireLayout::Compact => 8,
        }
    }

    /// Maps a version byte back to its layout, if it is one we know.
    pub fn from_version(version: u8) -> Option<Self> {
        match version {
            VERSION_FULL => Some(WireLayout::Full),
            VERSION_COMPACT => Some(WireLayout::Compact),
            _ => None,
        }
    }
}

// ── StateRecord ───────────────────────────────────────────────────────────────

/// One instant of controller state.
///
/// The all-zero record (see [`StateRecord::neutral`]) is the *neutral state*:
/// nothing pressed, triggers released, sticks centred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StateRecord {
    buttons: u16,
    triggers: [u8; TRIGGER_COUNT],
    axes: [i16; AXIS_COUNT],
    slot_hint: u8,
    sequence: u32,
}

impl StateRecord {
    /// Builds a record with slot hint 0 and sequence 0.
    pub fn new(buttons: u16, triggers: [u8; TRIGGER_COUNT], axes: [i16; AXIS_COUNT]) -> Self {
        Self {
            buttons,
            triggers,
            axes,
            slot_hint: 0,
            sequence: 0,
        }
    }

    /// The neutral state: all buttons released, triggers at 0, axes centred.
    pub fn neutral() -> Self {
        Self::default()
    }

    /// Returns a copy of this record carrying `slot_hint`.
    #[must_use]
    pub fn with_slot_hint(self, slot_hint: u8) -> Self {
        Self { slot_hint, ..self }
    }

    /// Returns a copy of this record carrying `sequence`.
    #[must_use]
    pub fn with_sequence(self, sequence: u32) -> Self {
        Self { sequence, ..self }
    }

    pub fn buttons(&self) -> u16 {
        self.buttons
    }

    pub fn triggers(&self) -> [u8; TRIGGER_COUNT] {
        self.triggers
    }

    pub fn axes(&self) -> [i16; AXIS_COUNT] {
        self.axes
    }

    pub fn slot_hint(&self) -> u8 {
        self.slot_hint
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Returns `true` if button `index` (0–15) is held.
    pub fn is_pressed(&self, index: u8) -> bool {
        index < 16 && self.buttons & (1 << index) != 0
    }

    /// Returns `true` if the controller state (buttons, triggers, axes) is neutral.
    ///
    /// The slot hint and sequence number are not part of the controller state.
    pub fn is_neutral(&self) -> bool {
        self.buttons == 0 && self.triggers == [0; TRIGGER_COUNT] && self.axes == [0; AXIS_COUNT]
    }

    /// Compares the controller state of two records.
    ///
    /// Buttons and triggers must match exactly; an axis only counts as changed
    /// when it moved by more than `deadzone`.  Slot hint and sequence number
    /// are ignored.
    pub fn differs_from(&self, other: &StateRecord, deadzone: u16) -> bool {
        if self.buttons != other.buttons || self.triggers != other.triggers {
            return true;
        }
        self.axes
            .iter()
            .zip(other.axes.iter())
            .any(|(a, b)| (i32::from(*a) - i32::from(*b)).unsigned_abs() > u32::from(deadzone))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
