//! Infrastructure layer for the sender application.
//!
//! Contains OS-facing adapters: controller capture backends, the UDP
//! transport, and file-system storage for configuration.  The capture and
//! transport traits live here next to their implementations; the
//! application layer drives them through trait objects.

pub mod input_capture;
pub mod network;
pub mod storage;
