//! A virtual device that logs controller state instead of driving a driver.
//!
//! Keeps the last applied record per slot and reports transitions:
//! `info!` when a slot's controller appears or disappears, `debug!` when the
//! state of a slot changes, and nothing for repeats of the same state.
//! Useful for running the receiver on a machine without a controller driver
//! and for watching what remote senders transmit.

use std::sync::Mutex;

use padrelay_core::StateRecord;
use tracing::{debug, info};

use crate::application::relay_state::{DeviceError, VirtualDevice};

pub struct LoggingVirtualDevice {
    slots: Mutex<Vec<Option<StateRecord>>>,
}

impl LoggingVirtualDevice {
    /// Creates a device with `slot_count` controllers, all absent.
    pub fn new(slot_count: usize) -> Self {
        Self {
            slots: Mutex::new(vec![None; slot_count]),
        }
    }

    /// The last state applied to `slot`, if the controller exists.
    pub fn state(&self, slot: u8) -> Option<StateRecord> {
        self.lock().get(usize::from(slot)).copied().flatten()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Option<StateRecord>>> {
        self.slots.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

fn slot_mut(slots: &mut [Option<StateRecord>], slot: u8) -> Result<&mut Option<StateRecord>, DeviceError> {
    slots.get_mut(usize::from(slot)).ok_or(DeviceError::SlotOutOfRange(slot))
}

impl VirtualDevice for LoggingVirtualDevice {
    fn apply(&self, slot: u8, record: &StateRecord) -> Result<(), DeviceError> {
        let mut slots = self.lock();
        let current = slot_mut(&mut slots, slot)?;

        // Sequence numbers differ on every packet; compare the controls only.
        let incoming = record.with_sequence(0).with_slot_hint(0);
        match current {
            None => info!("controller plugged into slot {slot}"),
            Some(previous) if *previous == incoming => return Ok(()),
            Some(_) => {}
        }
        debug!(
            "slot {slot}: buttons={:#06x} triggers={:?} axes={:?}",
            record.buttons(),
            record.triggers(),
            record.axes()
        );
        *current = Some(incoming);
        Ok(())
    }

    fn reset(&self, slot: u8) -> Result<(), DeviceError> {
        let mut slots = self.lock();
        let current = slot_mut(&mut slots, slot)?;
        if let Some(state) = current {
            if !state.is_neutral() {
                debug!("slot {slot}: reset to neutral");
            }
            *state = StateRecord::neutral();
        }
        Ok(())
    }

    fn release(&self, slot: u8) -> Result<(), DeviceError> {
        let mut slots = self.lock();
        let current = slot_mut(&mut slots, slot)?;
        if current.take().is_some() {
            info!("controller unplugged from slot {slot}");
        }
        Ok(())
    }
}
