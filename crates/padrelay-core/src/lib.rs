//! # padrelay-core
//!
//! Shared library for padrelay containing the state-packet codec, the
//! sequence gate, and the session table.
//!
//! This crate is used by both the sender and receiver applications.
//! It has zero dependencies on OS APIs, device backends, or network sockets.
//!
//! # Architecture overview
//!
//! padrelay streams gamepad-style input state from one or more *senders*
//! (machines with a physical controller) to a *receiver* that drives a local
//! virtual controller per sender.  Every datagram carries the complete
//! controller state, so a lost packet is healed by the next one.
//!
//! - **`protocol`** – How a state snapshot travels over the wire.  A
//!   [`StateRecord`] is encoded into a fixed-size little-endian packet by the
//!   [`StateCodec`], and the [`SequenceGate`] decides whether a decoded record
//!   is newer than what the receiver already applied.
//!
//! - **`domain`** – The receiver's bookkeeping.  The [`SessionTable`] binds
//!   each sender address to a virtual-device slot and tracks liveness so dead
//!   senders can be evicted.

pub mod domain;
pub mod protocol;

pub use domain::session::{Session, SessionError, SessionSnapshot, SessionTable, MAX_SLOTS};
pub use protocol::codec::{peek_version, CodecError, StateCodec};
pub use protocol::record::{StateRecord, WireLayout, AXIS_COUNT, FRAME_MARKER, TRIGGER_COUNT};
pub use protocol::sequence::{SequenceCounter, SequenceGate};
