//! Channel → session assignment registry
//!
//! One mutex guards every slot. The UI assignment path and the dispatch
//! path both go through it, so an assignment and a resolution can never
//! interleave into a torn read (an id visible to two channels at once, or
//! a channel with a half-replaced set).

use parking_lot::Mutex;
use tracing::{debug, info};

use super::channel::{ChannelId, ChannelSlot, ChannelState};
use crate::error::ChannelError;
use crate::sessions::{SessionDirectory, SessionId};

pub struct ChannelRegistry {
    slots: Mutex<Vec<ChannelSlot>>,
}

impl ChannelRegistry {
    pub fn new(channel_count: usize) -> Self {
        Self {
            slots: Mutex::new((0..channel_count).map(|_| ChannelSlot::new()).collect()),
        }
    }

    pub fn channel_count(&self) -> usize {
        self.slots.lock().len()
    }

    /// Assign an application to a channel.
    ///
    /// Resolves the process image name to the currently-active session
    /// ids through the directory. Zero matches leaves the previous
    /// assignment untouched. Each claimed id is detached from whichever
    /// channel held it before; session ids have exactly one owner.
    pub fn assign(
        &self,
        channel: ChannelId,
        application: &str,
        directory: &SessionDirectory,
    ) -> Result<Vec<SessionId>, ChannelError> {
        // resolve before taking the lock; enumeration can be slow
        let matches = directory.find_by_process_name(application);
        if matches.is_empty() {
            return Err(ChannelError::NoMatchingSessions(application.to_string()));
        }
        let ids: Vec<SessionId> = matches.into_iter().map(|s| s.id).collect();

        let mut slots = self.slots.lock();
        if channel >= slots.len() {
            return Err(ChannelError::OutOfRange(channel));
        }

        for (index, slot) in slots.iter_mut().enumerate() {
            if index == channel {
                continue;
            }
            let before = slot.sessions.len();
            slot.sessions.retain(|id| !ids.contains(id));
            if slot.sessions.len() != before {
                debug!(channel = index, "released sessions claimed by another channel");
                if slot.sessions.is_empty() && slot.state == ChannelState::Assigned {
                    slot.state = ChannelState::Stale;
                }
            }
        }

        let slot = &mut slots[channel];
        slot.state = ChannelState::Assigned;
        slot.application = Some(application.to_string());
        slot.sessions = ids.clone();
        slot.last_applied = None;

        info!(channel, application, sessions = ids.len(), "channel assigned");
        Ok(ids)
    }

    /// Session ids currently assigned to a channel; empty when none
    pub fn resolve(&self, channel: ChannelId) -> Vec<SessionId> {
        self.slots
            .lock()
            .get(channel)
            .map(|slot| slot.sessions.clone())
            .unwrap_or_default()
    }

    /// Clear a channel back to unassigned
    pub fn clear(&self, channel: ChannelId) {
        if let Some(slot) = self.slots.lock().get_mut(channel) {
            slot.state = ChannelState::Unassigned;
            slot.application = None;
            slot.sessions.clear();
            slot.last_applied = None;
            debug!(channel, "channel cleared");
        }
    }

    /// Consistent view of one slot
    pub fn slot(&self, channel: ChannelId) -> Option<ChannelSlot> {
        self.slots.lock().get(channel).cloned()
    }

    pub fn state(&self, channel: ChannelId) -> Option<ChannelState> {
        self.slots.lock().get(channel).map(|slot| slot.state)
    }

    /// Record the latest raw reading for a channel
    pub fn record_level(&self, channel: ChannelId, raw: u16) {
        if let Some(slot) = self.slots.lock().get_mut(channel) {
            slot.raw_level = raw;
        }
    }

    /// Record the normalized volume that was just applied
    pub fn record_applied(&self, channel: ChannelId, normalized: f32) {
        if let Some(slot) = self.slots.lock().get_mut(channel) {
            slot.last_applied = Some(normalized);
        }
    }

    /// Mark a channel stale after its backing sessions vanished
    pub fn mark_stale(&self, channel: ChannelId) {
        if let Some(slot) = self.slots.lock().get_mut(channel) {
            if slot.state == ChannelState::Assigned {
                slot.state = ChannelState::Stale;
                info!(channel, application = ?slot.application, "channel is stale");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::backend::testing::FakeBackend;
    use std::sync::Arc;
    use std::time::Duration;

    fn setup() -> (Arc<FakeBackend>, SessionDirectory, ChannelRegistry) {
        let backend = Arc::new(FakeBackend::new());
        let directory = SessionDirectory::new(backend.clone(), Duration::from_millis(0));
        let registry = ChannelRegistry::new(5);
        (backend, directory, registry)
    }

    #[test]
    fn test_assign_resolves_sessions() {
        let (backend, directory, registry) = setup();
        backend.add_session("s1", 100, "spotify.exe");
        backend.add_session("s2", 100, "spotify.exe");

        let ids = registry.assign(0, "spotify.exe", &directory).unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(registry.resolve(0), ids);
        assert_eq!(registry.state(0), Some(ChannelState::Assigned));
    }

    #[test]
    fn test_failed_assign_keeps_previous_assignment() {
        let (backend, directory, registry) = setup();
        backend.add_session("s1", 100, "spotify.exe");

        registry.assign(0, "spotify.exe", &directory).unwrap();
        let before = registry.resolve(0);

        let result = registry.assign(0, "missing.exe", &directory);
        assert!(result.is_err());
        assert_eq!(registry.resolve(0), before);
        assert_eq!(registry.state(0), Some(ChannelState::Assigned));
    }

    #[test]
    fn test_reassignment_moves_session_ownership() {
        let (backend, directory, registry) = setup();
        backend.add_session("s1", 100, "spotify.exe");

        registry.assign(0, "spotify.exe", &directory).unwrap();
        registry.assign(1, "spotify.exe", &directory).unwrap();

        assert!(!registry.resolve(0).contains(&SessionId::new("s1")));
        assert!(registry.resolve(1).contains(&SessionId::new("s1")));
    }

    #[test]
    fn test_channel_losing_all_sessions_goes_stale() {
        let (backend, directory, registry) = setup();
        backend.add_session("s1", 100, "spotify.exe");

        registry.assign(0, "spotify.exe", &directory).unwrap();
        registry.assign(1, "spotify.exe", &directory).unwrap();

        assert_eq!(registry.state(0), Some(ChannelState::Stale));
        assert_eq!(registry.state(1), Some(ChannelState::Assigned));
    }

    #[test]
    fn test_clear_returns_channel_to_unassigned() {
        let (backend, directory, registry) = setup();
        backend.add_session("s1", 100, "spotify.exe");

        registry.assign(0, "spotify.exe", &directory).unwrap();
        registry.clear(0);

        assert!(registry.resolve(0).is_empty());
        assert_eq!(registry.state(0), Some(ChannelState::Unassigned));
    }

    #[test]
    fn test_assign_out_of_range_channel_fails() {
        let (backend, directory, registry) = setup();
        backend.add_session("s1", 100, "spotify.exe");

        let result = registry.assign(9, "spotify.exe", &directory);
        assert!(matches!(result, Err(ChannelError::OutOfRange(9))));
    }

    #[test]
    fn test_level_tracking_survives_assignment_changes() {
        let (backend, directory, registry) = setup();
        backend.add_session("s1", 100, "spotify.exe");

        registry.record_level(0, 512);
        registry.assign(0, "spotify.exe", &directory).unwrap();
        assert_eq!(registry.slot(0).unwrap().raw_level, 512);

        registry.clear(0);
        assert_eq!(registry.slot(0).unwrap().raw_level, 512);
    }

    #[test]
    fn test_reassignment_resets_last_applied() {
        let (backend, directory, registry) = setup();
        backend.add_session("s1", 100, "spotify.exe");

        registry.assign(0, "spotify.exe", &directory).unwrap();
        registry.record_applied(0, 0.5);
        assert_eq!(registry.slot(0).unwrap().last_applied, Some(0.5));

        registry.assign(0, "spotify.exe", &directory).unwrap();
        assert_eq!(registry.slot(0).unwrap().last_applied, None);
    }
}
