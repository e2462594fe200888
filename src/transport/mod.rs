//! Serial transport to the fader hardware

pub mod serial;

pub use serial::{LevelUpdate, SerialLink, TransportEvent};
