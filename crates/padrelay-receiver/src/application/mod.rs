//! Application layer use cases for the receiver.
//!
//! - **`relay_state`** – Per-datagram pipeline: decode, resolve the sender's
//!   session, gate by sequence number, record the packet, and apply the state
//!   to the virtual device.  Also defines the [`relay_state::VirtualDevice`]
//!   trait the infrastructure layer implements.
//!
//! - **`sweep_sessions`** – Periodic eviction of silent senders.  Each evicted
//!   slot is reset to neutral and released on the device before the slot can
//!   be handed to another sender.
//!
//! Both use cases share one [`SharedSessionTable`].  Neither holds the table
//! lock while calling into the device.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use padrelay_core::SessionTable;

pub mod relay_state;
pub mod sweep_sessions;

/// The session table shared between the relay thread and the sweeper task.
pub type SharedSessionTable = Arc<Mutex<SessionTable>>;

/// Creates an empty shared table with `max_sessions` slots.
pub fn shared_session_table(max_sessions: usize) -> SharedSessionTable {
    Arc::new(Mutex::new(SessionTable::new(max_sessions)))
}

/// Locks the table, recovering the data if a previous holder panicked.
///
/// Every table operation leaves the table consistent before returning, so a
/// poisoned lock carries no half-applied update.
pub(crate) fn lock_table(table: &SharedSessionTable) -> MutexGuard<'_, SessionTable> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}
