//! Cached directory of active audio sessions
//!
//! Raw enumeration through the OS is expensive, so reads go through a
//! snapshot that refreshes when it ages out or when a lookup misses.
//! Forced refreshes are floored at a tenth of the max age so a lingering
//! stale id cannot turn every fader tick into a full enumeration. A
//! backend failure keeps the previous snapshot; it never propagates.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

use super::backend::{AudioSession, SessionBackend, SessionId};

struct Snapshot {
    sessions: Vec<AudioSession>,
    taken_at: Option<Instant>,
}

pub struct SessionDirectory {
    backend: Arc<dyn SessionBackend>,
    cache: Mutex<Snapshot>,
    max_age: Duration,
    min_refresh: Duration,
}

impl SessionDirectory {
    pub fn new(backend: Arc<dyn SessionBackend>, max_age: Duration) -> Self {
        Self {
            backend,
            cache: Mutex::new(Snapshot {
                sessions: Vec::new(),
                taken_at: None,
            }),
            max_age,
            min_refresh: max_age / 10,
        }
    }

    /// Current sessions, refreshing first when the snapshot has aged out
    pub fn snapshot(&self) -> Vec<AudioSession> {
        let aged_out = {
            let cache = self.cache.lock();
            match cache.taken_at {
                None => true,
                Some(taken_at) => taken_at.elapsed() > self.max_age,
            }
        };
        if aged_out {
            self.refresh();
        }
        self.cache.lock().sessions.clone()
    }

    /// Re-enumerate now, unless a refresh just happened.
    ///
    /// On backend failure the previous snapshot stays in place.
    pub fn refresh(&self) {
        if let Some(taken_at) = self.cache.lock().taken_at {
            if taken_at.elapsed() < self.min_refresh {
                return;
            }
        }
        match self.backend.enumerate() {
            Ok(sessions) => {
                let mut cache = self.cache.lock();
                cache.sessions = sessions;
                cache.taken_at = Some(Instant::now());
            }
            Err(e) => {
                warn!("session enumeration failed, keeping previous snapshot: {}", e);
            }
        }
    }

    /// Sessions owned by the named process image; refreshes on a miss
    pub fn find_by_process_name(&self, name: &str) -> Vec<AudioSession> {
        let wanted = name.to_lowercase();
        let hits = self.lookup(|s| s.process_name == wanted);
        if !hits.is_empty() {
            return hits;
        }
        self.refresh();
        self.lookup(|s| s.process_name == wanted)
    }

    /// Session by id; refreshes on a miss
    pub fn find_by_id(&self, id: &SessionId) -> Option<AudioSession> {
        if let Some(found) = self.lookup(|s| &s.id == id).into_iter().next() {
            return Some(found);
        }
        self.refresh();
        self.lookup(|s| &s.id == id).into_iter().next()
    }

    /// The backend behind this directory (for volume application)
    pub fn backend(&self) -> &Arc<dyn SessionBackend> {
        &self.backend
    }

    fn lookup(&self, pred: impl Fn(&AudioSession) -> bool) -> Vec<AudioSession> {
        {
            let cache = self.cache.lock();
            if cache.taken_at.is_some() {
                return cache.sessions.iter().filter(|s| pred(s)).cloned().collect();
            }
        }
        // first lookup ever; populate the snapshot lazily
        self.refresh();
        let cache = self.cache.lock();
        cache.sessions.iter().filter(|s| pred(s)).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::backend::testing::FakeBackend;

    fn directory_with(backend: Arc<FakeBackend>) -> SessionDirectory {
        // zero max age: every read may refresh, which keeps tests deterministic
        SessionDirectory::new(backend, Duration::from_millis(0))
    }

    #[test]
    fn test_first_lookup_populates_snapshot() {
        let backend = Arc::new(FakeBackend::new());
        backend.add_session("s1", 100, "spotify.exe");
        let directory = directory_with(backend);

        let found = directory.find_by_process_name("spotify.exe");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, SessionId::new("s1"));
    }

    #[test]
    fn test_refresh_on_miss_sees_new_sessions() {
        let backend = Arc::new(FakeBackend::new());
        let directory = directory_with(backend.clone());

        assert!(directory.find_by_process_name("game.exe").is_empty());

        backend.add_session("s2", 200, "game.exe");
        let found = directory.find_by_process_name("game.exe");
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_lookup_is_case_insensitive_on_process_name() {
        let backend = Arc::new(FakeBackend::new());
        backend.add_session("s1", 100, "spotify.exe");
        let directory = directory_with(backend);

        assert_eq!(directory.find_by_process_name("Spotify.EXE").len(), 1);
    }

    #[test]
    fn test_enumeration_failure_keeps_previous_snapshot() {
        let backend = Arc::new(FakeBackend::new());
        backend.add_session("s1", 100, "spotify.exe");
        let directory = directory_with(backend.clone());

        assert_eq!(directory.snapshot().len(), 1);

        backend.set_fail_enumeration(true);
        directory.refresh();
        assert_eq!(directory.snapshot().len(), 1);
    }

    #[test]
    fn test_find_by_id_miss_returns_none() {
        let backend = Arc::new(FakeBackend::new());
        let directory = directory_with(backend);

        assert!(directory.find_by_id(&SessionId::new("nope")).is_none());
    }

    #[test]
    fn test_vanished_session_disappears_from_lookup() {
        let backend = Arc::new(FakeBackend::new());
        backend.add_session("s1", 100, "spotify.exe");
        let directory = directory_with(backend.clone());

        assert!(directory.find_by_id(&SessionId::new("s1")).is_some());

        backend.remove_session("s1");
        assert!(directory.find_by_id(&SessionId::new("s1")).is_none());
    }
}
