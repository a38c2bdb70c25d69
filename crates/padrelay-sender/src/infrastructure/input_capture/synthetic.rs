//! A capture backend that invents controller input.
//!
//! Lets the sender run end to end on a machine without a controller: the
//! left stick traces a circle once every `period` samples, the triggers ramp
//! up and down, and button 0 toggles every half period.

use std::f64::consts::TAU;
use std::sync::atomic::{AtomicU32, Ordering};

use padrelay_core::StateRecord;

use super::{CaptureBackend, CaptureError};

const STICK_RADIUS: f64 = 20_000.0;

pub struct SyntheticCaptureBackend {
    tick: AtomicU32,
    period: u32,
}

impl SyntheticCaptureBackend {
    /// `period` is the number of samples per full stick revolution (min 2).
    pub fn new(period: u32) -> Self {
        Self {
            tick: AtomicU32::new(0),
            period: period.max(2),
        }
    }

    fn state_at(&self, tick: u32) -> StateRecord {
        let phase = tick % self.period;
        let angle = TAU * f64::from(phase) / f64::from(self.period);
        let x = (angle.cos() * STICK_RADIUS) as i16;
        let y = (angle.sin() * STICK_RADIUS) as i16;

        let half = self.period / 2;
        let buttons = u16::from(phase < half);
        let ramp = if phase < half { phase } else { self.period - phase };
        let trigger = (u64::from(ramp) * 255 / u64::from(half.max(1))).min(255) as u8;

        StateRecord::new(buttons, [trigger, 0], [x, y, 0, 0])
    }
}

impl CaptureBackend for SyntheticCaptureBackend {
    fn sample(&self) -> Result<StateRecord, CaptureError> {
        let tick = self.tick.fetch_add(1, Ordering::Relaxed);
        Ok(self.state_at(tick))
    }

    fn is_connected(&self) -> bool {
        true
    }
}
