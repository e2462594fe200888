//! Per-channel state

use crate::sessions::SessionId;

/// Index of a physical fader and its slot in the wire protocol
pub type ChannelId = usize;

/// Assignment lifecycle of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// No application assigned; levels are tracked but never applied
    Unassigned,
    /// Assigned to live session(s)
    Assigned,
    /// The backing session(s) vanished; waits for reassignment or clear
    Stale,
}

/// State of one fader channel
///
/// Created at startup for each physical fader and never destroyed while
/// the process runs.
#[derive(Debug, Clone)]
pub struct ChannelSlot {
    pub state: ChannelState,
    /// Process image name of the assigned application, if any
    pub application: Option<String>,
    /// Session ids owned by this channel
    pub sessions: Vec<SessionId>,
    /// Most recent raw reading from the hardware
    pub raw_level: u16,
    /// Last normalized volume actually applied
    pub last_applied: Option<f32>,
}

impl ChannelSlot {
    pub fn new() -> Self {
        Self {
            state: ChannelState::Unassigned,
            application: None,
            sessions: Vec::new(),
            raw_level: 0,
            last_applied: None,
        }
    }

    /// Whether level events should reach the OS for this channel
    pub fn is_active(&self) -> bool {
        self.state == ChannelState::Assigned
    }
}

impl Default for ChannelSlot {
    fn default() -> Self {
        Self::new()
    }
}
