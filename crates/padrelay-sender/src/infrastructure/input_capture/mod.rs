//! Controller capture for the sender application.
//!
//! A capture backend reads the complete state of one local controller on
//! demand.  The sender calls [`CaptureBackend::sample`] once per sample
//! interval and never keeps events of its own: whatever the backend reports
//! is the state that goes on the wire.
//!
//! # Testability
//!
//! The `CaptureBackend` trait allows tests and the demo binary to supply
//! controller state without a physical device:
//! [`mock::ScriptedCaptureBackend`] replays a fixed script and
//! [`synthetic::SyntheticCaptureBackend`] generates a moving stick.

use padrelay_core::StateRecord;

pub mod mock;
pub mod synthetic;

/// Error type for capture operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    /// The controller is unplugged or the backend lost it.
    #[error("controller disconnected")]
    Disconnected,
    #[error("platform capture error: {0}")]
    Platform(String),
}

/// Trait abstracting controller state capture.
#[cfg_attr(test, mockall::automock)]
pub trait CaptureBackend: Send + Sync {
    /// Reads the current controller state.
    ///
    /// The returned record's slot hint and sequence number are ignored; the
    /// sender stamps its own.
    fn sample(&self) -> Result<StateRecord, CaptureError>;

    /// Cheap presence check used while the sender is paused.
    fn is_connected(&self) -> bool;
}
