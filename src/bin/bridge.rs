//! Fader Bridge Host
//!
//! Opens the serial link to the fader panel and routes decoded fader
//! positions to per-application session volume. Owns the reconnect
//! policy: a dead link is reopened with a fixed backoff.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fader_bridge::config::AppConfig;
use fader_bridge::sessions::SessionBackend;
use fader_bridge::transport::TransportEvent;
use fader_bridge::MixerBridge;

/// Delay before the host retries a dead serial link
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

fn pick_backend() -> Arc<dyn SessionBackend> {
    #[cfg(windows)]
    {
        Arc::new(fader_bridge::sessions::WasapiBackend::new())
    }
    #[cfg(not(windows))]
    {
        tracing::warn!("no session backend for this platform, channels will never resolve");
        Arc::new(fader_bridge::sessions::NullBackend)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting fader bridge");

    let config = AppConfig::load()?;
    config.validate()?;
    tracing::info!(
        port = %config.serial.port,
        baud = config.serial.baud,
        channels = config.panel.channels,
        "configuration loaded"
    );

    let mut bridge = MixerBridge::new(config, pick_backend());

    // Candidate applications, for operators running without the UI
    for name in bridge.list_candidate_applications() {
        tracing::info!("audio session: {}", name);
    }

    if let Err(e) = bridge.start() {
        // a failed open surfaces once here; the loop below keeps retrying
        tracing::error!("serial open failed: {}", e);
    }

    let transport_events = bridge.transport_events();
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    let mut last_applied = 0u64;
    let mut ticks = 0u64;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                break;
            }
            _ = ticker.tick() => {
                while let Ok(TransportEvent::Closed { reason }) = transport_events.try_recv() {
                    tracing::warn!("serial link closed: {}", reason);
                }

                if !bridge.is_connected() {
                    tokio::time::sleep(RECONNECT_DELAY).await;
                    match bridge.connect() {
                        Ok(()) => tracing::info!("serial link reopened"),
                        Err(e) => tracing::debug!("reconnect failed: {}", e),
                    }
                }

                // Periodic stats logging
                ticks += 1;
                if ticks % 30 == 0 {
                    let applied = bridge.applied_count();
                    if applied != last_applied {
                        tracing::info!(
                            "{} volume updates applied, {} coalesced away",
                            applied,
                            bridge.queue().coalesced_count()
                        );
                        last_applied = applied;
                    }
                }
            }
        }
    }

    bridge.shutdown();
    Ok(())
}
