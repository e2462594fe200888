//! # Fader Bridge
//!
//! Bridges a panel of physical faders, read over a serial link, to the
//! per-application output volume of the desktop audio mixer.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                            FADER PANEL                               │
//! │   fader 0    fader 1    fader 2    fader 3    fader 4                │
//! │      └──────────┴──────────┴──────────┴──────────┘                   │
//! │                  "v0|v1|v2|v3|v4|\n"  @ 115200 baud                  │
//! └───────────────────────────────┬──────────────────────────────────────┘
//!                                 │ serial
//!                                 ▼
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                              HOST                                    │
//! │  ┌────────────────────────────────────────────────────────────────┐  │
//! │  │ SerialLink reader thread (transport::serial)                   │  │
//! │  │    └─ FrameDecoder (protocol::frame) ── level events ──┐       │  │
//! │  └────────────────────────────────────────────────────────┼───────┘  │
//! │            │ feedback tap (to the selection/rendering UI) │          │
//! │            ▼                                              ▼          │
//! │     subscribe_levels()                  UpdateQueue (router::queue)  │
//! │                                         latest-wins slot per channel │
//! │                                                           │          │
//! │  ┌────────────────────────────────────────────────────────┼───────┐  │
//! │  │ Dispatcher worker thread (router::dispatcher)          ▼       │  │
//! │  │   ChannelRegistry ─► SessionDirectory ─► VolumeApplier         │  │
//! │  │   (channel → ids)    (cached snapshot)   (per-session volume)  │  │
//! │  └────────────────────────────────────────────────────────────────┘  │
//! │                                                           │          │
//! └───────────────────────────────────────────────────────────┼──────────┘
//!                                                             ▼
//!                                        OS audio sessions (one volume
//!                                        scalar per application stream)
//! ```

pub mod bridge;
pub mod config;
pub mod error;
pub mod protocol;
pub mod router;
pub mod sessions;
pub mod transport;

pub use bridge::MixerBridge;
pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Number of physical faders on the shipped panel
    pub const DEFAULT_CHANNEL_COUNT: usize = 5;

    /// Largest raw reading the firmware reports (10-bit ADC scale)
    pub const DEFAULT_MAX_RAW_LEVEL: u16 = 1024;

    /// Baud rate the firmware runs the link at
    pub const DEFAULT_BAUD_RATE: u32 = 115_200;

    /// Default serial read timeout in milliseconds
    pub const DEFAULT_SERIAL_TIMEOUT_MS: u64 = 50;

    /// Field delimiter in a frame line
    pub const FIELD_DELIMITER: char = '|';

    /// Longest line buffered before the decoder discards it as noise
    pub const MAX_LINE_LEN: usize = 256;

    /// Capacity of the level-feedback channel to the UI
    pub const FEEDBACK_CAPACITY: usize = 256;

    /// Session snapshot age after which a read triggers a refresh
    pub const SNAPSHOT_MAX_AGE_MS: u64 = 2_000;
}
