//! UDP transport for state packets.
//!
//! The sender owns one UDP socket connected to the receiver.  Connecting a
//! UDP socket sends nothing over the network; it only fixes the destination
//! so every `send` goes to the receiver and ICMP errors for it are reported
//! back to us.
//!
//! # Why shrink the send buffer?
//!
//! Every packet carries the complete controller state, so an old packet
//! waiting in a queue is worth nothing once a newer one exists.  With the
//! OS default buffer (often 200 KB or more) a stalled link would queue
//! seconds of outdated frames and replay them late.  A buffer of a few
//! packets makes the OS drop instead.  `std::net::UdpSocket` cannot set the
//! buffer size, so the socket is built with `socket2` and converted.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};

use socket2::{Domain, Protocol, Socket, Type};
use thiserror::Error;
use tracing::debug;

pub mod mock;

/// Error type for the datagram transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The socket could not be created, configured, or connected.
    #[error("failed to open UDP socket to {target}: {source}")]
    Open {
        target: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    /// The OS rejected a send.
    #[error("send failed: {0}")]
    Send(#[source] std::io::Error),
    /// Fewer bytes left than were handed over.
    #[error("short send: {sent} of {expected} bytes")]
    ShortSend { sent: usize, expected: usize },
}

/// Sends one datagram to a fixed destination.
#[cfg_attr(test, mockall::automock)]
pub trait DatagramTransport: Send + Sync {
    fn send(&self, datagram: &[u8]) -> Result<(), TransportError>;
}

/// Connected UDP socket with a minimal send buffer.
#[derive(Debug)]
pub struct UdpStateTransport {
    socket: UdpSocket,
    target: SocketAddr,
}

impl UdpStateTransport {
    /// Opens a socket on an ephemeral port and connects it to `target`.
    ///
    /// `send_buffer_bytes` is a request; the OS may round it up.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Open`] if any socket call fails.
    pub fn connect(target: SocketAddr, send_buffer_bytes: usize) -> Result<Self, TransportError> {
        let open_err = |source| TransportError::Open { target, source };

        let socket = Socket::new(Domain::for_address(target), Type::DGRAM, Some(Protocol::UDP)).map_err(open_err)?;
        socket.set_send_buffer_size(send_buffer_bytes).map_err(open_err)?;

        let local: SocketAddr = if target.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        socket.bind(&local.into()).map_err(open_err)?;
        socket.connect(&target.into()).map_err(open_err)?;

        match socket.send_buffer_size() {
            Ok(actual) => debug!("UDP send buffer to {target}: requested {send_buffer_bytes}, got {actual}"),
            Err(e) => debug!("could not read back UDP send buffer size: {e}"),
        }

        Ok(Self {
            socket: socket.into(),
            target,
        })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// The ephemeral address the socket was bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

impl DatagramTransport for UdpStateTransport {
    fn send(&self, datagram: &[u8]) -> Result<(), TransportError> {
        let sent = self.socket.send(datagram).map_err(TransportError::Send)?;
        if sent != datagram.len() {
            return Err(TransportError::ShortSend {
                sent,
                expected: datagram.len(),
            });
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
