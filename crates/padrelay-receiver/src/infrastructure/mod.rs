//! Infrastructure layer for the receiver application.
//!
//! Contains OS-facing adapters: virtual-device backends, the UDP listener,
//! and file-system storage for configuration.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `padrelay_core`, but MUST NOT be imported by the `application` layer.

pub mod network;
pub mod storage;
pub mod virtual_device;
