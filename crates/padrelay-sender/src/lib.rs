//! padrelay-sender library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does the sender do?
//!
//! The *sender* runs on the machine with the physical controller.  At a fixed
//! sample rate it:
//!
//! 1. Reads the complete controller state from a capture backend.
//! 2. Asks the configured send policy whether this frame should go out.
//! 3. Stamps the frame with the next sequence number and encodes it.
//! 4. Sends the datagram to the receiver.  Nothing is ever retransmitted: the
//!    next frame carries the full state again.
//!
//! When the controller is unplugged the sender pauses and waits for it to
//! come back instead of exiting.

/// Application layer: send policies and the sampling loop.
pub mod application;

/// Infrastructure layer: capture backends, UDP transport, and config.
pub mod infrastructure;
