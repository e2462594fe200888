//! Volume application to resolved sessions

use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::SessionError;
use crate::sessions::{SessionDirectory, SessionId};

/// Result of applying one normalized level to a channel's session set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Every session took the new volume
    Applied { sessions: usize },
    /// Some sessions took it; the rest were missing or failed
    PartialFailure { applied: usize, missing: usize },
    /// No session in the set exists any more
    NotFound,
}

impl ApplyOutcome {
    /// Whether the channel's backing has vanished entirely
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApplyOutcome::NotFound)
    }
}

pub struct VolumeApplier {
    directory: Arc<SessionDirectory>,
}

impl VolumeApplier {
    pub fn new(directory: Arc<SessionDirectory>) -> Self {
        Self { directory }
    }

    /// Set `normalized` on every session in the set.
    ///
    /// A missing or failing session is skipped, never fatal to the call;
    /// the outcome reports how the set fared as a whole. `NotFound` means
    /// every id in the set is gone, not merely that a set call failed.
    pub fn apply(&self, sessions: &[SessionId], normalized: f32) -> ApplyOutcome {
        if sessions.is_empty() {
            return ApplyOutcome::NotFound;
        }

        let mut applied = 0usize;
        let mut missing = 0usize;
        let mut failed = 0usize;

        for id in sessions {
            if self.directory.find_by_id(id).is_none() {
                debug!(%id, "session vanished, skipping");
                missing += 1;
                continue;
            }
            match self.directory.backend().set_volume(id, normalized) {
                Ok(()) => applied += 1,
                Err(SessionError::NotFound(_)) => {
                    // lost the race between lookup and apply
                    missing += 1;
                }
                Err(e) => {
                    warn!(%id, "volume set failed: {}", e);
                    failed += 1;
                }
            }
        }

        if missing == sessions.len() {
            ApplyOutcome::NotFound
        } else if missing + failed > 0 {
            ApplyOutcome::PartialFailure {
                applied,
                missing: missing + failed,
            }
        } else {
            ApplyOutcome::Applied { sessions: applied }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::backend::testing::FakeBackend;
    use std::time::Duration;

    fn setup() -> (Arc<FakeBackend>, VolumeApplier) {
        let backend = Arc::new(FakeBackend::new());
        let directory = Arc::new(SessionDirectory::new(
            backend.clone(),
            Duration::from_millis(0),
        ));
        (backend, VolumeApplier::new(directory))
    }

    #[test]
    fn test_applies_to_every_session() {
        let (backend, applier) = setup();
        backend.add_session("s1", 100, "spotify.exe");
        backend.add_session("s2", 100, "spotify.exe");
        let ids = [SessionId::new("s1"), SessionId::new("s2")];

        let outcome = applier.apply(&ids, 0.75);

        assert_eq!(outcome, ApplyOutcome::Applied { sessions: 2 });
        assert_eq!(backend.volume_of("s1"), Some(0.75));
        assert_eq!(backend.volume_of("s2"), Some(0.75));
    }

    #[test]
    fn test_missing_session_is_skipped_not_fatal() {
        let (backend, applier) = setup();
        backend.add_session("s1", 100, "spotify.exe");
        let ids = [SessionId::new("s1"), SessionId::new("gone")];

        let outcome = applier.apply(&ids, 0.3);

        assert_eq!(outcome, ApplyOutcome::PartialFailure { applied: 1, missing: 1 });
        assert_eq!(backend.volume_of("s1"), Some(0.3));
    }

    #[test]
    fn test_all_sessions_gone_is_not_found() {
        let (backend, applier) = setup();
        let ids = [SessionId::new("gone1"), SessionId::new("gone2")];

        let outcome = applier.apply(&ids, 0.9);

        assert!(outcome.is_not_found());
        assert!(backend.set_calls().is_empty());
    }

    #[test]
    fn test_empty_set_is_not_found() {
        let (_backend, applier) = setup();
        assert!(applier.apply(&[], 0.5).is_not_found());
    }

    #[test]
    fn test_apply_is_idempotent() {
        let (backend, applier) = setup();
        backend.add_session("s1", 100, "spotify.exe");
        let ids = [SessionId::new("s1")];

        let first = applier.apply(&ids, 0.42);
        let volume_after_first = backend.volume_of("s1");
        let second = applier.apply(&ids, 0.42);

        assert_eq!(first, second);
        assert_eq!(backend.volume_of("s1"), volume_after_first);
    }
}
