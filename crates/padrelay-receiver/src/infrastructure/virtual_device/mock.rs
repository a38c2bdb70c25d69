//! Recording virtual device for integration tests.
//!
//! # Why a recording device?
//!
//! Real virtual-controller drivers need a kernel module or a signed driver,
//! and their output cannot be observed from Rust test code.  The
//! `RecordingVirtualDevice` replaces the driver with in-memory recording:
//! each call is pushed into a `Mutex<Vec<DeviceCall>>` so assertions can
//! inspect exactly what reached the device and in what order.
//!
//! # Usage in tests
//!
//! ```ignore
//! let device = Arc::new(RecordingVirtualDevice::new());
//! let relay = RelayStateUseCase::new(WireLayout::Full, table, device.clone());
//!
//! relay.handle_datagram(&bytes, src, Instant::now());
//!
//! assert_eq!(device.applied_sequences(0), vec![1]);
//! ```
//!
//! # `should_fail` flag
//!
//! Set `should_fail` to make every method return `DeviceError::Platform`.
//! This exercises the error paths in the use cases without a broken driver.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use padrelay_core::StateRecord;

use crate::application::relay_state::{DeviceError, VirtualDevice};

/// One call observed by [`RecordingVirtualDevice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCall {
    Apply { slot: u8, record: StateRecord },
    Reset { slot: u8 },
    Release { slot: u8 },
}

impl DeviceCall {
    pub fn slot(&self) -> u8 {
        match *self {
            DeviceCall::Apply { slot, .. } | DeviceCall::Reset { slot } | DeviceCall::Release { slot } => slot,
        }
    }
}

/// A device that records all calls instead of driving a controller.
#[derive(Debug, Default)]
pub struct RecordingVirtualDevice {
    /// Every call in arrival order.  Failed calls are not recorded.
    pub calls: Mutex<Vec<DeviceCall>>,
    /// When `true`, every method returns `DeviceError::Platform`.
    pub should_fail: AtomicBool,
}

impl RecordingVirtualDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_should_fail(&self, fail: bool) {
        self.should_fail.store(fail, Ordering::SeqCst);
    }

    /// Copies out the calls recorded so far.
    pub fn calls(&self) -> Vec<DeviceCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Sequence numbers of the records applied to `slot`, in order.
    pub fn applied_sequences(&self, slot: u8) -> Vec<u32> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|call| match call {
                DeviceCall::Apply { slot: s, record } if *s == slot => Some(record.sequence()),
                _ => None,
            })
            .collect()
    }

    /// Number of resets recorded for `slot`.
    pub fn reset_count(&self, slot: u8) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| matches!(call, DeviceCall::Reset { slot: s } if *s == slot))
            .count()
    }

    fn record(&self, call: DeviceCall) -> Result<(), DeviceError> {
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(DeviceError::Platform("mock failure".into()));
        }
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

impl VirtualDevice for RecordingVirtualDevice {
    fn apply(&self, slot: u8, record: &StateRecord) -> Result<(), DeviceError> {
        self.record(DeviceCall::Apply { slot, record: *record })
    }

    fn reset(&self, slot: u8) -> Result<(), DeviceError> {
        self.record(DeviceCall::Reset { slot })
    }

    fn release(&self, slot: u8) -> Result<(), DeviceError> {
        self.record(DeviceCall::Release { slot })
    }
}
