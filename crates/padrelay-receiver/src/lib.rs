//! padrelay-receiver library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does the receiver do?
//!
//! The *receiver* is the machine whose virtual controllers are driven by
//! remote senders.  It:
//!
//! 1. Listens on one UDP port for state packets.
//! 2. Decodes each datagram and drops anything malformed or foreign.
//! 3. Binds each sender address to a virtual-device slot (one controller per
//!    sender) through the shared `SessionTable`.
//! 4. Drops packets older than what was already applied for that sender.
//! 5. Applies accepted state to the virtual device for the sender's slot.
//! 6. Meanwhile a sweeper evicts senders that went silent, resetting their
//!    virtual controller to neutral so nothing stays stuck.

/// Application layer: the relay and sweeper use cases.
pub mod application;

/// Infrastructure layer: virtual-device backends, UDP listener, and config.
pub mod infrastructure;
