//! Application layer use cases for the sender.
//!
//! - **`send_state`** – The sampling loop.  Defines the [`send_state::SendPolicy`]
//!   strategy trait with its two implementations and the
//!   [`send_state::StateSender`] that ties capture, policy, codec, and
//!   transport together.

pub mod send_state;
