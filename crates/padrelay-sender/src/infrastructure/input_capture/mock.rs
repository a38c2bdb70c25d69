//! Scripted capture backend for tests.
//!
//! Replays a fixed list of capture results, one per call, so a test can
//! describe a controller session frame by frame:
//!
//! ```ignore
//! let capture = ScriptedCaptureBackend::new([
//!     Ok(pressed),
//!     Err(CaptureError::Disconnected),
//!     Err(CaptureError::Disconnected),
//!     Ok(released),
//! ]);
//! ```
//!
//! A scripted `Disconnected` step is consumed either by `sample` (the sender
//! notices the unplug) or by `is_connected` (the sender polls while paused),
//! so every scripted step accounts for exactly one sender tick.  Once the
//! script is exhausted the last successful state repeats forever.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use padrelay_core::StateRecord;

use super::{CaptureBackend, CaptureError};

pub struct ScriptedCaptureBackend {
    script: Mutex<VecDeque<Result<StateRecord, CaptureError>>>,
    last: Mutex<StateRecord>,
    samples: AtomicUsize,
}

impl ScriptedCaptureBackend {
    pub fn new(script: impl IntoIterator<Item = Result<StateRecord, CaptureError>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            last: Mutex::new(StateRecord::neutral()),
            samples: AtomicUsize::new(0),
        }
    }

    /// A backend that reports `record` on every sample.
    pub fn constant(record: StateRecord) -> Self {
        let backend = Self::new([]);
        *backend.last.lock().unwrap() = record;
        backend
    }

    /// Number of `sample` calls so far.
    pub fn samples(&self) -> usize {
        self.samples.load(Ordering::SeqCst)
    }

    /// Number of scripted steps not yet consumed.
    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap().len()
    }
}

impl CaptureBackend for ScriptedCaptureBackend {
    fn sample(&self) -> Result<StateRecord, CaptureError> {
        self.samples.fetch_add(1, Ordering::SeqCst);
        match self.script.lock().unwrap().pop_front() {
            Some(Ok(record)) => {
                *self.last.lock().unwrap() = record;
                Ok(record)
            }
            Some(Err(e)) => Err(e),
            None => Ok(*self.last.lock().unwrap()),
        }
    }

    fn is_connected(&self) -> bool {
        let mut script = self.script.lock().unwrap();
        if matches!(script.front(), Some(Err(CaptureError::Disconnected))) {
            script.pop_front();
            return false;
        }
        true
    }
}
