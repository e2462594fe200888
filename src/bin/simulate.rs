//! Diagnostic playback tool
//!
//! Writes frame lines to the device in the panel's own wire format,
//! forcing fader positions for test and demo runs.
//!
//! Usage: `simulate [PORT] [v0|v1|...]`
//!
//! With no frame argument, plays a ramp across every channel.

use anyhow::{Context, Result};
use std::io::Write;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fader_bridge::config::AppConfig;
use fader_bridge::protocol::encode_line;

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load()?;
    config.validate()?;

    let port_name = std::env::args()
        .nth(1)
        .unwrap_or_else(|| config.serial.port.clone());
    let frame_arg = std::env::args().nth(2);

    let mut port = serialport::new(&port_name, config.serial.baud)
        .timeout(Duration::from_millis(500))
        .open()
        .with_context(|| format!("opening {}", port_name))?;

    match frame_arg {
        Some(arg) => {
            let levels = parse_levels(&arg)?;
            port.write_all(encode_line(&levels).as_bytes())?;
            port.flush()?;
            tracing::info!("sent frame {:?}", levels);
        }
        None => {
            tracing::info!(
                "no frame given; playing a ramp across {} channels",
                config.panel.channels
            );
            for step in 0..=16u16 {
                let level = config.panel.max_raw / 16 * step;
                let levels = vec![level; config.panel.channels];
                port.write_all(encode_line(&levels).as_bytes())?;
                port.flush()?;
                std::thread::sleep(Duration::from_millis(100));
            }
        }
    }

    Ok(())
}

fn parse_levels(arg: &str) -> Result<Vec<u16>> {
    arg.split('|')
        .filter(|field| !field.is_empty())
        .map(|field| {
            field
                .trim()
                .parse::<u16>()
                .with_context(|| format!("bad level {:?}", field))
        })
        .collect()
}
