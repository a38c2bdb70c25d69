//! Receiver-side domain entities.
//!
//! - **`session`** – [`session::SessionTable`]: which sender owns which
//!   virtual-device slot, when it was last heard from, and how many of its
//!   packets were applied or dropped as stale.

pub mod session;

pub use session::{Session, SessionError, SessionSnapshot, SessionTable};
