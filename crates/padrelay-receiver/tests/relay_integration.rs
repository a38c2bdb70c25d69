//! Integration tests for the receiver pipeline.
//!
//! These tests exercise the receiver end-to-end: `RelayStateUseCase` +
//! `SweepSessionsUseCase` + the recording virtual device, fed either
//! directly or through real loopback UDP by the padrelay sender.

use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use padrelay_core::{StateCodec, StateRecord, WireLayout};
use padrelay_receiver::application::relay_state::{DropReason, RelayOutcome, RelayStateUseCase, VirtualDevice};
use padrelay_receiver::application::shared_session_table;
use padrelay_receiver::application::sweep_sessions::SweepSessionsUseCase;
use padrelay_receiver::infrastructure::network::{bind_relay_socket, start_relay_listener};
use padrelay_receiver::infrastructure::virtual_device::mock::{DeviceCall, RecordingVirtualDevice};
use padrelay_sender::application::send_state::{AlwaysSend, StateSender, TickOutcome};
use padrelay_sender::infrastructure::input_capture::mock::ScriptedCaptureBackend;
use padrelay_sender::infrastructure::network::{DatagramTransport, TransportError, UdpStateTransport};

const TIMEOUT: Duration = Duration::from_millis(1000);

struct Receiver {
    relay: Arc<RelayStateUseCase>,
    sweeper: SweepSessionsUseCase,
    device: Arc<RecordingVirtualDevice>,
}

fn receiver(layout: WireLayout, max_sessions: usize) -> Receiver {
    let table = shared_session_table(max_sessions);
    let device = Arc::new(RecordingVirtualDevice::new());
    let as_device: Arc<dyn VirtualDevice> = device.clone();
    Receiver {
        relay: Arc::new(RelayStateUseCase::new(layout, Arc::clone(&table), Arc::clone(&as_device))),
        sweeper: SweepSessionsUseCase::new(table, as_device, TIMEOUT),
        device,
    }
}

fn addr(port: u16) -> SocketAddr {
    SocketAddr::from(([192, 168, 0, 10], port))
}

/// Hands every datagram straight to the relay, as if it arrived from `from`.
struct DirectTransport {
    relay: Arc<RelayStateUseCase>,
    from: SocketAddr,
}

impl DatagramTransport for DirectTransport {
    fn send(&self, datagram: &[u8]) -> Result<(), TransportError> {
        self.relay.handle_datagram(datagram, self.from, Instant::now());
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[test]
fn test_five_frames_are_applied_then_reset_after_silence() {
    // Arrange
    let rx = receiver(WireLayout::Full, 4);
    let capture = Arc::new(ScriptedCaptureBackend::constant(StateRecord::new(0x1000, [0, 0], [0; 4])));
    let transport = Arc::new(DirectTransport {
        relay: Arc::clone(&rx.relay),
        from: addr(5000),
    });
    let mut sender = StateSender::new(WireLayout::Full, capture, transport, Box::new(AlwaysSend));

    // Act
    for _ in 0..5 {
        sender.tick(Instant::now());
    }
    let silence = Instant::now() + TIMEOUT + Duration::from_millis(1);
    let evicted = rx.sweeper.sweep_once(silence);

    // Assert
    let calls = rx.device.calls();
    let applies: Vec<_> = calls
        .iter()
        .filter_map(|c| match c {
            DeviceCall::Apply { record, .. } => Some(*record),
            _ => None,
        })
        .collect();
    assert_eq!(applies.len(), 5);
    assert!(applies.iter().all(|r| r.buttons() == 0x1000));
    assert_eq!(rx.device.applied_sequences(0), vec![1, 2, 3, 4, 5]);
    assert_eq!(evicted, vec![0]);
    assert_eq!(calls[5], DeviceCall::Reset { slot: 0 });
}

#[test]
fn test_reordered_delivery_applies_one_and_three_only() {
    // Arrange
    let rx = receiver(WireLayout::Full, 4);
    let codec = StateCodec::new(WireLayout::Full);
    let now = Instant::now();

    // Act
    let outcomes: Vec<_> = [1u32, 3, 2]
        .iter()
        .map(|&seq| {
            let bytes = codec.encode(&StateRecord::neutral().with_sequence(seq));
            rx.relay.handle_datagram(&bytes, addr(5000), now)
        })
        .collect();

    // Assert
    assert_eq!(rx.device.applied_sequences(0), vec![1, 3]);
    assert!(matches!(outcomes[2], RelayOutcome::Dropped(DropReason::Stale { .. })));
}

#[test]
fn test_eviction_boundary_is_strictly_greater_than_timeout() {
    // Arrange
    let rx = receiver(WireLayout::Full, 4);
    let codec = StateCodec::new(WireLayout::Full);
    let t0 = Instant::now();
    rx.relay
        .handle_datagram(&codec.encode(&StateRecord::neutral().with_sequence(1)), addr(1), t0);

    // Act / Assert – one millisecond inside the timeout: kept
    assert!(rx.sweeper.sweep_once(t0 + TIMEOUT - Duration::from_millis(1)).is_empty());
    // One millisecond past it: evicted and reset
    assert_eq!(rx.sweeper.sweep_once(t0 + TIMEOUT + Duration::from_millis(1)), vec![0]);
    assert_eq!(rx.device.reset_count(0), 1);
}

#[test]
fn test_freed_slot_is_reset_before_next_sender_uses_it() {
    // Arrange – a single slot, first sender goes silent
    let rx = receiver(WireLayout::Full, 1);
    let codec = StateCodec::new(WireLayout::Full);
    let t0 = Instant::now();
    let held = StateRecord::new(0xFFFF, [255, 255], [i16::MAX; 4]).with_sequence(1);
    rx.relay.handle_datagram(&codec.encode(&held), addr(1), t0);

    // While the first session is alive the second sender is refused
    let refused = rx
        .relay
        .handle_datagram(&codec.encode(&StateRecord::neutral().with_sequence(1)), addr(2), t0);
    assert!(matches!(refused, RelayOutcome::Dropped(DropReason::NoCapacity)));

    // Act
    let later = t0 + TIMEOUT + Duration::from_millis(5);
    rx.sweeper.sweep_once(later);
    let accepted = rx
        .relay
        .handle_datagram(&codec.encode(&StateRecord::neutral().with_sequence(1)), addr(2), later);

    // Assert
    assert!(matches!(accepted, RelayOutcome::Applied { slot: 0, .. }));
    let calls = rx.device.calls();
    let reset_at = calls.iter().position(|c| *c == DeviceCall::Reset { slot: 0 }).unwrap();
    let second_apply = calls.iter().rposition(|c| matches!(c, DeviceCall::Apply { .. })).unwrap();
    assert!(reset_at < second_apply);
}

#[test]
fn test_compact_stream_survives_sequence_wrap() {
    // Arrange – 300 frames wrap the 8-bit counter once
    let rx = receiver(WireLayout::Compact, 1);
    let capture = Arc::new(ScriptedCaptureBackend::constant(StateRecord::new(1, [0, 0], [256, -256, 0, 0])));
    let transport = Arc::new(DirectTransport {
        relay: Arc::clone(&rx.relay),
        from: addr(6000),
    });
    let mut sender = StateSender::new(WireLayout::Compact, capture, transport, Box::new(AlwaysSend));

    // Act
    for _ in 0..300 {
        sender.tick(Instant::now());
    }

    // Assert
    let stats = rx.relay.stats();
    assert_eq!(stats.applied, 300);
    assert_eq!(stats.stale, 0);
}

#[test]
fn test_layout_mismatch_is_dropped_as_malformed() {
    let rx = receiver(WireLayout::Full, 1);
    let capture = Arc::new(ScriptedCaptureBackend::constant(StateRecord::neutral()));
    let transport = Arc::new(DirectTransport {
        relay: Arc::clone(&rx.relay),
        from: addr(7000),
    });
    let mut sender = StateSender::new(WireLayout::Compact, capture, transport, Box::new(AlwaysSend));

    sender.tick(Instant::now());

    assert_eq!(rx.relay.stats().decode_rejected, 1);
    assert!(rx.device.calls().is_empty());
}

#[test]
fn test_loopback_udp_sender_to_receiver() {
    // Arrange – real sockets on both ends
    let rx = receiver(WireLayout::Full, 2);
    let socket: UdpSocket = bind_relay_socket("127.0.0.1:0".parse().unwrap(), Duration::from_millis(20)).unwrap();
    let listen = socket.local_addr().unwrap();
    let running = Arc::new(AtomicBool::new(true));
    let handle = start_relay_listener(socket, Arc::clone(&rx.relay), Arc::clone(&running)).unwrap();

    let capture = Arc::new(ScriptedCaptureBackend::constant(StateRecord::new(0x1000, [0, 0], [0; 4])));
    let transport = Arc::new(UdpStateTransport::connect(listen, 1024).unwrap());
    let mut sender = StateSender::new(WireLayout::Full, capture, transport, Box::new(AlwaysSend));

    // Act
    for _ in 0..5 {
        assert!(matches!(sender.tick(Instant::now()), TickOutcome::Sent { .. }));
        std::thread::sleep(Duration::from_millis(2));
    }
    let deadline = Instant::now() + Duration::from_secs(2);
    while rx.relay.stats().applied < 5 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    running.store(false, Ordering::Relaxed);
    handle.join().unwrap();
    let reset = rx.sweeper.shutdown();

    // Assert – loopback may reorder in theory, so only newer-than-last frames apply
    let applied = rx.device.applied_sequences(0);
    assert!(!applied.is_empty());
    assert!(applied.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(reset, vec![0]);
    assert_eq!(rx.device.reset_count(0), 1);
}

#[test]
fn test_failing_device_keeps_session_and_sweeper_still_frees_slot() {
    // Arrange – the driver fails from the first packet on
    let rx = receiver(WireLayout::Full, 1);
    let codec = StateCodec::new(WireLayout::Full);
    let t0 = Instant::now();
    rx.device.set_should_fail(true);

    // Act – packets reach the session but not the device
    let first = rx
        .relay
        .handle_datagram(&codec.encode(&StateRecord::neutral().with_sequence(1)), addr(1), t0);
    let second = rx
        .relay
        .handle_datagram(&codec.encode(&StateRecord::neutral().with_sequence(2)), addr(1), t0);
    let evicted = rx.sweeper.sweep_once(t0 + TIMEOUT + Duration::from_millis(1));

    // Assert
    assert!(matches!(first, RelayOutcome::DeviceFailed { slot: 0, .. }));
    assert!(matches!(second, RelayOutcome::DeviceFailed { slot: 0, .. }));
    let stats = rx.relay.stats();
    assert_eq!((stats.device_errors, stats.applied, stats.stale), (2, 0, 0));
    assert_eq!(evicted, vec![0]);
    assert!(rx.device.calls().is_empty());

    // Once the driver recovers, a new sender gets the freed slot
    rx.device.set_should_fail(false);
    let later = t0 + TIMEOUT + Duration::from_millis(2);
    let recovered = rx
        .relay
        .handle_datagram(&codec.encode(&StateRecord::neutral().with_sequence(1)), addr(2), later);
    assert!(matches!(recovered, RelayOutcome::Applied { slot: 0, sequence: 1 }));
}
