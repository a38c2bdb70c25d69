//! Recording transport for tests.
//!
//! Stores every datagram in a `Mutex<Vec<Vec<u8>>>` instead of sending it.
//! Set `should_fail` to simulate a send error.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::{DatagramTransport, TransportError};

#[derive(Debug, Default)]
pub struct RecordingTransport {
    /// Every datagram handed to `send`, in order.  Failed sends are not recorded.
    pub sent: Mutex<Vec<Vec<u8>>>,
    pub should_fail: AtomicBool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_should_fail(&self, fail: bool) {
        self.should_fail.store(fail, Ordering::SeqCst);
    }

    /// Copies out the datagrams sent so far.
    pub fn datagrams(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }
}

impl DatagramTransport for RecordingTransport {
    fn send(&self, datagram: &[u8]) -> Result<(), TransportError> {
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(TransportError::Send(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "mock failure",
            )));
        }
        self.sent.lock().unwrap().push(datagram.to_vec());
        Ok(())
    }
}
