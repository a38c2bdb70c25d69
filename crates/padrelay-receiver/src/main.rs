//! padrelay receiver entry point.
//!
//! Loads the configuration, binds the relay socket, and runs the relay loop
//! and the session sweeper until Ctrl-C.
//!
//! # Usage
//!
//! ```text
//! padrelay-receiver [OPTIONS]
//!
//! Options:
//!   --config      <PATH>   Config file [default: platform config dir]
//!   --listen-port <PORT>   Override [network] listen_port
//! ```
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load + validate ReceiverConfig
//!  └─ start services
//!       ├─ relay loop        (dedicated OS thread, blocking UDP recv)
//!       └─ session sweeper   (Tokio task, fixed interval, polls the stop flag)
//!  └─ on Ctrl-C: stop both, reset every controller, log stats
//! ```

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use padrelay_receiver::application::relay_state::{RelayStateUseCase, VirtualDevice};
use padrelay_receiver::application::shared_session_table;
use padrelay_receiver::application::sweep_sessions::SweepSessionsUseCase;
use padrelay_receiver::infrastructure::network::{bind_relay_socket, start_relay_listener};
use padrelay_receiver::infrastructure::storage::config::{self, ConfigError, ReceiverConfig};
use padrelay_receiver::infrastructure::virtual_device::logging::LoggingVirtualDevice;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Relays controller state from remote senders to local virtual controllers.
#[derive(Debug, Parser)]
#[command(name = "padrelay-receiver", version)]
struct Cli {
    /// Path to `receiver.toml`.  Defaults to the platform config directory.
    #[arg(long, env = "PADRELAY_RECEIVER_CONFIG")]
    config: Option<PathBuf>,

    /// UDP port to listen on, overriding the config file.
    #[arg(long, env = "PADRELAY_LISTEN_PORT")]
    listen_port: Option<u16>,
}

impl Cli {
    /// Loads the config file and applies the command-line overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// resulting configuration is invalid.
    fn into_receiver_config(self) -> anyhow::Result<ReceiverConfig> {
        let mut cfg = match &self.config {
            Some(path) => config::load_config_from(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => match config::load_config() {
                Err(ConfigError::NoPlatformConfigDir) => ReceiverConfig::default(),
                other => other.context("failed to load receiver config")?,
            },
        };

        if let Some(port) = self.listen_port {
            cfg.network.listen_port = port;
        }

        cfg.validate().context("invalid receiver config")?;
        Ok(cfg)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Cli::parse().into_receiver_config()?;

    // `RUST_LOG` wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.receiver.log_level)),
        )
        .init();

    info!(
        "padrelay receiver starting: layout={:?}, max_sessions={}, timeout={:?}",
        cfg.network.layout,
        cfg.sessions.max_sessions,
        cfg.session_timeout()
    );

    // Shutdown flag shared by the relay thread and the sweeper task.
    let running = Arc::new(AtomicBool::new(true));

    let table = shared_session_table(cfg.sessions.max_sessions);
    let device: Arc<dyn VirtualDevice> = Arc::new(LoggingVirtualDevice::new(cfg.sessions.max_sessions));
    let relay = Arc::new(
        RelayStateUseCase::new(cfg.network.layout, Arc::clone(&table), Arc::clone(&device))
            .with_slot_hints(cfg.sessions.honor_slot_hint),
    );
    let sweeper = Arc::new(SweepSessionsUseCase::new(
        Arc::clone(&table),
        Arc::clone(&device),
        cfg.session_timeout(),
    ));

    // ── Relay loop ────────────────────────────────────────────────────────────
    let addr = cfg.listen_addr()?;
    let socket = bind_relay_socket(addr, cfg.poll_interval()).context("failed to open relay socket")?;
    let relay_thread = start_relay_listener(socket, Arc::clone(&relay), Arc::clone(&running))?;

    // ── Session sweeper ───────────────────────────────────────────────────────
    let sweep_task = {
        let sweeper = Arc::clone(&sweeper);
        let running = Arc::clone(&running);
        let period = cfg.sweep_interval();
        let poll = cfg.poll_interval();
        tokio::spawn(async move { sweeper.run(period, poll, running).await })
    };

    // ── Ctrl-C handler ────────────────────────────────────────────────────────
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown signal received");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => error!("failed to listen for Ctrl-C: {e}"),
        }
    });

    info!("padrelay receiver ready.  Press Ctrl-C to exit.");

    while running.load(Ordering::Relaxed) {
        tokio::time::sleep(cfg.poll_interval()).await;
    }

    // ── Shutdown ──────────────────────────────────────────────────────────────
    if let Err(e) = sweep_task.await {
        warn!("session sweeper ended abnormally: {e}");
    }
    match tokio::task::spawn_blocking(move || relay_thread.join()).await {
        Ok(Ok(())) => {}
        Ok(Err(_)) => error!("relay thread panicked"),
        Err(e) => error!("failed to join relay thread: {e}"),
    }

    for session in relay.sessions(Instant::now()) {
        info!(
            "slot {} ({}): connected {:?}, idle {:?}, accepted={}, rejected={}",
            session.slot,
            session.identity,
            session.connected_for,
            session.idle,
            session.packets_accepted,
            session.packets_rejected
        );
    }
    sweeper.shutdown();

    let stats = relay.stats();
    info!(
        "padrelay receiver stopped: applied={}, stale={}, malformed={}, no_capacity={}, device_errors={}",
        stats.applied, stats.stale, stats.decode_rejected, stats.no_capacity, stats.device_errors
    );
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
