//! Virtual-device backend implementations.
//!
//! - [`logging::LoggingVirtualDevice`] tracks per-slot controller state and
//!   reports every change through `tracing`.  It is the backend the receiver
//!   binary runs with.
//! - [`mock::RecordingVirtualDevice`] records every call for assertions in
//!   integration tests.

pub mod logging;
pub mod mock;
