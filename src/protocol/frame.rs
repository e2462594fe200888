//! Frame decoding for the fader wire protocol
//!
//! The hardware sends ASCII lines of `|`-separated decimal readings, one
//! field per channel, e.g. `200|400|600|800|1000|` (trailing delimiter
//! tolerated). Decoding is permissive to hardware noise: a field that
//! fails to parse is skipped on its own, fields beyond the channel count
//! are ignored, and a short line leaves the remaining channels untouched.

use tracing::debug;

use crate::constants::{FIELD_DELIMITER, MAX_LINE_LEN};

/// A single decoded fader reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelEvent {
    /// Channel index, straight from the field position
    pub channel: usize,
    /// Raw fader level as reported by the firmware
    pub raw: u16,
}

/// Push parser over the raw serial byte stream
///
/// Bytes arrive in arbitrary chunks; a line split across chunks is
/// buffered until its newline shows up. `reset` restarts the parser for
/// a fresh connection.
pub struct FrameDecoder {
    channel_count: usize,
    line: String,
    frames_decoded: u64,
    fields_skipped: u64,
}

impl FrameDecoder {
    /// Create a decoder for a panel with `channel_count` faders
    pub fn new(channel_count: usize) -> Self {
        Self {
            channel_count,
            line: String::new(),
            frames_decoded: 0,
            fields_skipped: 0,
        }
    }

    /// Consume a chunk of bytes, returning decoded events in field order
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<LevelEvent> {
        let mut events = Vec::new();
        for &byte in bytes {
            match byte {
                b'\n' => self.decode_line(&mut events),
                b'\r' => {}
                _ => {
                    // a line this long without a newline is noise, not a frame
                    if self.line.len() >= MAX_LINE_LEN {
                        self.line.clear();
                    }
                    self.line.push(byte as char);
                }
            }
        }
        events
    }

    /// Drop any partially-buffered line; use when a connection restarts
    pub fn reset(&mut self) {
        self.line.clear();
    }

    /// Frames that produced at least one event
    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }

    /// Fields dropped because they did not parse
    pub fn fields_skipped(&self) -> u64 {
        self.fields_skipped
    }

    fn decode_line(&mut self, events: &mut Vec<LevelEvent>) {
        let line = std::mem::take(&mut self.line);
        if line.is_empty() {
            return;
        }
        if !line.contains(FIELD_DELIMITER) {
            debug!("discarding malformed frame line: {:?}", line);
            return;
        }

        let mut decoded_any = false;
        for (channel, field) in line.split(FIELD_DELIMITER).enumerate() {
            if channel >= self.channel_count {
                break;
            }
            // a trailing delimiter leaves one empty field; not an error
            if field.is_empty() {
                continue;
            }
            match field.trim().parse::<u16>() {
                Ok(raw) => {
                    events.push(LevelEvent { channel, raw });
                    decoded_any = true;
                }
                Err(_) => {
                    self.fields_skipped += 1;
                }
            }
        }
        if decoded_any {
            self.frames_decoded += 1;
        }
    }
}

/// Render a frame line in the panel's wire format
///
/// Reciprocal send direction: the host writes these to force fader
/// positions on the device during diagnostic playback.
pub fn encode_line(levels: &[u16]) -> String {
    let mut out = String::with_capacity(levels.len() * 5 + 1);
    for level in levels {
        out.push_str(&level.to_string());
        out.push(FIELD_DELIMITER);
    }
    out.push('\n');
    out
}
