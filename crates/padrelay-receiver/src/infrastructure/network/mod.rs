//! UDP listener that feeds received datagrams into the relay.
//!
//! The receiver binds one UDP socket and runs the relay loop on a dedicated
//! OS thread.  Each datagram is handed to
//! [`RelayStateUseCase::handle_datagram`]; the listener itself knows nothing
//! about packet contents.
//!
//! # Why a blocking thread? (for beginners)
//!
//! The relay does a handful of microseconds of work per datagram and must
//! react to each one immediately.  A plain `std::net::UdpSocket` on its own
//! thread gives the lowest and most predictable latency, and keeps the relay
//! out of the way of the Tokio tasks (the session sweeper) running alongside.
//!
//! # Read timeout
//!
//! The socket is configured with a short read timeout (the poll interval,
//! 50 ms by default).  `recv_from` blocks for at most that long before
//! returning a timeout error; on each timeout we check the `running` flag and
//! exit the loop cleanly once the application is shutting down.

use std::net::{SocketAddr, UdpSocket};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, error, info};

use crate::application::relay_state::RelayStateUseCase;

/// Receive buffer size.  Larger than any supported packet, so trailing bytes
/// of oversize datagrams are dropped by the OS rather than misread.
const RECV_BUFFER_SIZE: usize = 2048;

/// Error type for the relay listener.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The UDP socket could not be bound.
    #[error("failed to bind relay socket on {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    /// The socket rejected the read timeout.
    #[error("failed to configure relay socket: {0}")]
    Configure(#[source] std::io::Error),
    /// The relay thread could not be started.
    #[error("failed to spawn relay thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Binds the relay socket on `addr` with a read timeout of `poll_interval`.
///
/// # Errors
///
/// Returns [`ListenerError::BindFailed`] if the address is unavailable and
/// [`ListenerError::Configure`] if the timeout cannot be set (for example a
/// zero duration).
pub fn bind_relay_socket(addr: SocketAddr, poll_interval: Duration) -> Result<UdpSocket, ListenerError> {
    let socket = UdpSocket::bind(addr).map_err(|source| ListenerError::BindFailed { addr, source })?;
    socket
        .set_read_timeout(Some(poll_interval))
        .map_err(ListenerError::Configure)?;
    Ok(socket)
}

/// Spawns the relay loop on a thread named `padrelay-relay`.
///
/// The loop runs until `running` is cleared; the returned handle joins once
/// it has noticed.
///
/// # Errors
///
/// Returns [`ListenerError::Spawn`] if the OS refuses to create the thread.
pub fn start_relay_listener(
    socket: UdpSocket,
    relay: Arc<RelayStateUseCase>,
    running: Arc<AtomicBool>,
) -> Result<JoinHandle<()>, ListenerError> {
    let local = socket.local_addr().ok();
    let handle = std::thread::Builder::new()
        .name("padrelay-relay".to_string())
        .spawn(move || relay_loop(socket, relay, running))
        .map_err(ListenerError::Spawn)?;

    match local {
        Some(addr) => info!("relay listening on UDP {addr}"),
        None => info!("relay listening"),
    }
    Ok(handle)
}

/// The main receive loop executed on the relay thread.
fn relay_loop(socket: UdpSocket, relay: Arc<RelayStateUseCase>, running: Arc<AtomicBool>) {
    let mut buf = vec![0u8; RECV_BUFFER_SIZE];

    while running.load(Ordering::Relaxed) {
        let (len, src) = match socket.recv_from(&mut buf) {
            Ok(pair) => pair,
            Err(e) if is_timeout_error(&e) => continue,
            Err(e) if is_connection_reset(&e) => {
                // ICMP port-unreachable surfaced by some platforms; not ours to handle.
                debug!("ignoring connection reset on relay socket: {e}");
                continue;
            }
            Err(e) => {
                error!("relay recv error: {e}");
                continue;
            }
        };

        relay.handle_datagram(&buf[..len], src, Instant::now());
    }

    info!("relay loop stopped");
}

/// Returns `true` for OS timeout / would-block errors that should be retried.
fn is_timeout_error(e: &std::io::Error) -> bool {
    matches!(e.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut)
}

fn is_connection_reset(e: &std::io::Error) -> bool {
    e.kind() == std::io::ErrorKind::ConnectionReset
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::shared_session_table;
    use crate::infrastructure::virtual_device::mock::RecordingVirtualDevice;
    use padrelay_core::{StateCodec, StateRecord, WireLayout};

    #[test]
    fn test_is_timeout_error_recognises_timed_out() {
        // Arrange
        let err = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");

        // Act / Assert
        assert!(is_timeout_error(&err));
    }

    #[test]
    fn test_is_timeout_error_recognises_would_block() {
        let err = std::io::Error::new(std::io::ErrorKind::WouldBlock, "would block");
        assert!(is_timeout_error(&err));
    }

    #[test]
    fn test_is_timeout_error_rejects_other_kinds() {
        let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert!(!is_timeout_error(&err));
        assert!(!is_connection_reset(&err));
    }

    #[test]
    fn test_bind_relay_socket_fails_on_address_in_use() {
        // Arrange
        let taken = UdpSocket::bind("127.0.0.1:0").unwrap();
        let addr = taken.local_addr().unwrap();

        // Act
        let result = bind_relay_socket(addr, Duration::from_millis(50));

        // Assert
        assert!(matches!(result, Err(ListenerError::BindFailed { .. })));
    }

    #[test]
    fn test_relay_loop_applies_datagrams_and_stops_on_flag() {
        // Arrange
        let socket = bind_relay_socket("127.0.0.1:0".parse().unwrap(), Duration::from_millis(20)).unwrap();
        let addr = socket.local_addr().unwrap();
        let device = Arc::new(RecordingVirtualDevice::new());
        let relay = Arc::new(RelayStateUseCase::new(
            WireLayout::Full,
            shared_session_table(2),
            Arc::clone(&device) as Arc<dyn crate::application::relay_state::VirtualDevice>,
        ));
        let running = Arc::new(AtomicBool::new(true));
        let handle = start_relay_listener(socket, Arc::clone(&relay), Arc::clone(&running)).unwrap();

        // Act
        let client = UdpSocket::bind("127.0.0.1:0").unwrap();
        let bytes = StateCodec::new(WireLayout::Full).encode(&StateRecord::new(0x0001, [0, 0], [0; 4]).with_sequence(1));
        client.send_to(&bytes, addr).unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while device.applied_sequences(0).is_empty() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        running.store(false, Ordering::Relaxed);
        handle.join().unwrap();

        // Assert
        assert_eq!(device.applied_sequences(0), vec![1]);
        assert_eq!(relay.stats().applied, 1);
    }
}
