//! padrelay sender entry point.
//!
//! Samples a controller and streams its state to a padrelay receiver until
//! Ctrl-C.  This build drives the synthetic capture backend, so it runs on
//! machines without a controller attached.
//!
//! # Usage
//!
//! ```text
//! padrelay-sender [OPTIONS]
//!
//! Options:
//!   --config <PATH>       Config file [default: platform config dir]
//!   --target <IP:PORT>    Override [network] target_address
//! ```

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use padrelay_sender::application::send_state::StateSender;
use padrelay_sender::infrastructure::input_capture::synthetic::SyntheticCaptureBackend;
use padrelay_sender::infrastructure::network::UdpStateTransport;
use padrelay_sender::infrastructure::storage::config::{self, ConfigError, SenderConfig};

/// Samples per revolution of the synthetic stick (2 s at the default 8 ms).
const SYNTHETIC_PERIOD: u32 = 250;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Streams controller state to a padrelay receiver.
#[derive(Debug, Parser)]
#[command(name = "padrelay-sender", version)]
struct Cli {
    /// Path to `sender.toml`.  Defaults to the platform config directory.
    #[arg(long, env = "PADRELAY_SENDER_CONFIG")]
    config: Option<PathBuf>,

    /// Receiver address (`ip:port`), overriding the config file.
    #[arg(long, env = "PADRELAY_TARGET")]
    target: Option<String>,
}

impl Cli {
    /// Loads the config file and applies the command-line overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// resulting configuration is invalid.
    fn into_sender_config(self) -> anyhow::Result<SenderConfig> {
        let mut cfg = match &self.config {
            Some(path) => config::load_config_from(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => match config::load_config() {
                Err(ConfigError::NoPlatformConfigDir) => SenderConfig::default(),
                other => other.context("failed to load sender config")?,
            },
        };

        if let Some(target) = self.target {
            cfg.network.target_address = target;
        }

        cfg.validate().context("invalid sender config")?;
        Ok(cfg)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Cli::parse().into_sender_config()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.sender.log_level)),
        )
        .init();

    let target = cfg.target_addr()?;
    let transport = UdpStateTransport::connect(target, cfg.network.send_buffer_bytes)
        .context("failed to open sender socket")?;
    info!(
        "padrelay sender starting: target={target}, layout={:?}, policy={:?}",
        cfg.network.layout, cfg.sampling.policy
    );

    let mut sender = StateSender::new(
        cfg.network.layout,
        Arc::new(SyntheticCaptureBackend::new(SYNTHETIC_PERIOD)),
        Arc::new(transport),
        cfg.build_policy(),
    )
    .with_slot_hint(cfg.sender.slot_hint);

    let running = Arc::new(AtomicBool::new(true));

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

    // ── Sampling loop ─────────────────────────────────────────────────────────
    let interval = cfg.sample_interval();
    tokio::task::spawn_blocking(move || sender.run(interval, running))
        .await
        .context("sender thread failed")?;

    info!("padrelay sender stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
