//! Binary codec for padrelay state packets.
//!
//! Full-precision layout (version `0x01`, 22 bytes):
//! ```text
//! [marker:4][version:1][buttons:2][triggers:2][axes:4x2][slot_hint:1][seq:4]
//! ```
//!
//! Compact layout (version `0x02`, 16 bytes):
//! ```text
//! [marker:4][version:1][buttons:2][triggers:2][axes:4x1][slot_hint:1][seq:1][flags:1]
//! ```
//!
//! All multi-byte integers are little-endian.  A packet is accepted or
//! rejected as a whole; there is no partial decode.

use thiserror::Error;

use crate::protocol::record::{
    StateRecord, WireLayout, AXIS_COUNT, FRAME_MARKER, TRIGGER_COUNT,
};

/// Errors that can occur while decoding a packet.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    /// The datagram is shorter than the fixed packet size.
    #[error("framing error: need {needed} bytes, got {available}")]
    Framing { needed: usize, available: usize },

    /// The first four bytes are not the padrelay frame marker.
    #[error("bad frame marker: 0x{0:08X}")]
    BadMarker(u32),

    /// The version byte does not match the codec's configured layout.
    #[error("protocol version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u8, found: u8 },
}

// Field offsets shared by both layouts.
const MARKER_OFFSET: usize = 0;
const VERSION_OFFSET: usize = 4;
const BUTTONS_OFFSET: usize = 5;
const TRIGGERS_OFFSET: usize = 7;
const AXES_OFFSET: usize = 9;

/// Encodes and decodes [`StateRecord`]s for exactly one [`WireLayout`].
///
/// # Examples
///
/// ```rust
/// use padrelay_core::{StateCodec, StateRecord, WireLayout};
///
/// let codec = StateCodec::new(WireLayout::Full);
/// let record = StateRecord::new(0x1000, [0, 255], [-1, 2, -3, 4]).with_sequence(9);
/// let bytes = codec.encode(&record);
/// assert_eq!(bytes.len(), 22);
/// assert_eq!(codec.decode(&bytes).unwrap(), record);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateCodec {
    layout: WireLayout,
}

impl StateCodec {
    /// Creates a codec bound to `layout`.
    pub fn new(layout: WireLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> WireLayout {
        self.layout
    }

    /// Fixed size of every packet this codec produces and accepts.
    pub fn packet_size(&self) -> usize {
        self.layout.packet_size()
    }

    /// Width of the sequence ring carried on the wire.
    pub fn sequence_bits(&self) -> u32 {
        self.layout.sequence_bits()
    }

    /// Encodes `record` into a packet of exactly [`packet_size`](Self::packet_size) bytes.
    ///
    /// On the compact layout the axes are scaled down to 8 bits and the
    /// sequence number is truncated to its low byte.
    pub fn encode(&self, record: &StateRecord) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.packet_size());
        buf.extend_from_slice(&FRAME_MARKER.to_le_bytes());
        buf.push(self.layout.version());
        buf.extend_from_slice(&record.buttons().to_le_bytes());
        buf.extend_from_slice(&record.triggers());

        match self.layout {
            WireLayout::Full => encode_full_tail(&mut buf, record),
            WireLayout::Compact => encode_compact_tail(&mut buf, record),
        }

        debug_assert_eq!(buf.len(), self.packet_size());
        buf
    }

    /// Decodes one packet.
    ///
    /// Bytes beyond the fixed packet size are ignored.
    ///
    /// # Errors
    ///
    /// Checked in this order: [`CodecError::Framing`] if `bytes` is too short,
    /// [`CodecError::BadMarker`] if the marker is wrong, and
    /// [`CodecError::VersionMismatch`] if the version byte is not this
    /// codec's layout.
    pub fn decode(&self, bytes: &[u8]) -> Result<StateRecord, CodecError> {
        let needed = self.packet_size();
        if bytes.len() < needed {
            return Err(CodecError::Framing {
                needed,
                available: bytes.len(),
            });
        }

        let marker = read_u32(bytes, MARKER_OFFSET);
        if marker != FRAME_MARKER {
            return Err(CodecError::BadMarker(marker));
        }

        let found = bytes[VERSION_OFFSET];
        let expected = self.layout.version();
        if found != expected {
            return Err(CodecError::VersionMismatch { expected, found });
        }

        let buttons = read_u16(bytes, BUTTONS_OFFSET);
        let triggers = [bytes[TRIGGERS_OFFSET], bytes[TRIGGERS_OFFSET + 1]];

        let record = match self.layout {
            WireLayout::Full => decode_full_tail(bytes, buttons, triggers),
            WireLayout::Compact => decode_compact_tail(bytes, buttons, triggers),
        };
        Ok(record)
    }
}

/// Returns the version byte of a datagram that carries the padrelay marker.
///
/// Used for diagnostics when a peer is configured with the other layout.
pub fn peek_version(bytes: &[u8]) -> Option<u8> {
    if bytes.len() <= VERSION_OFFSET || read_u32(bytes, MARKER_OFFSET) != FRAME_MARKER {
        return None;
    }
    Some(bytes[VERSION_OFFSET])
}

// ── Full-precision layout ─────────────────────────────────────────────────────

const FULL_SLOT_OFFSET: usize = AXES_OFFSET + AXIS_COUNT * 2;
const FULL_SEQ_OFFSET: usize = FULL_SLOT_OFFSET + 1;

fn encode_full_tail(buf: &mut Vec<u8>, record: &StateRecord) {
    for axis in record.axes() {
        buf.extend_from_slice(&axis.to_le_bytes());
    }
    buf.push(record.slot_hint());
    buf.extend_from_slice(&record.sequence().to_le_bytes());
}

fn decode_full_tail(bytes: &[u8], buttons: u16, triggers: [u8; TRIGGER_COUNT]) -> StateRecord {
    let mut axes = [0i16; AXIS_COUNT];
    for (i, axis) in axes.iter_mut().enumerate() {
        *axis = read_u16(bytes, AXES_OFFSET + i * 2) as i16;
    }
    StateRecord::new(buttons, triggers, axes)
        .with_slot_hint(bytes[FULL_SLOT_OFFSET])
        .with_sequence(read_u32(bytes, FULL_SEQ_OFFSET))
}

// ── Compact layout ────────────────────────────────────────────────────────────

const COMPACT_SLOT_OFFSET: usize = AXES_OFFSET + AXIS_COUNT;
const COMPACT_SEQ_OFFSET: usize = COMPACT_SLOT_OFFSET + 1;
const COMPACT_FLAGS_OFFSET: usize = COMPACT_SEQ_OFFSET + 1;

fn encode_compact_tail(buf: &mut Vec<u8>, record: &StateRecord) {
    for axis in record.axes() {
        buf.push(compact_axis(axis) as u8);
    }
    buf.push(record.slot_hint());
    buf.push(record.sequence() as u8);
    debug_assert_eq!(buf.len(), COMPACT_FLAGS_OFFSET);
    buf.push(0x00); // flags, reserved
}

fn decode_compact_tail(bytes: &[u8], buttons: u16, triggers: [u8; TRIGGER_COUNT]) -> StateRecord {
    let mut axes = [0i16; AXIS_COUNT];
    for (i, axis) in axes.iter_mut().enumerate() {
        *axis = expand_axis(bytes[AXES_OFFSET + i] as i8);
    }
    // The flags byte is reserved – ignored on decode
    StateRecord::new(buttons, triggers, axes)
        .with_slot_hint(bytes[COMPACT_SLOT_OFFSET])
        .with_sequence(u32::from(bytes[COMPACT_SEQ_OFFSET]))
}

/// Scales a full-range axis down to 8 bits (divisor 256).
pub fn compact_axis(value: i16) -> i8 {
    (value >> 8) as i8
}

/// Scales an 8-bit axis back to the full 16-bit range.
pub fn expand_axis(value: i8) -> i16 {
    i16::from(value) << 8
}

// ── Utility helpers ───────────────────────────────────────────────────────────

fn read_u16(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buf[offset], buf[offset + 1]])
}

fn read_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}

// ── Tests ─────────────────────────────────────────────────────────────────────
