//! Wire protocol for the fader panel

pub mod frame;

pub use frame::{encode_line, FrameDecoder, LevelEvent};
