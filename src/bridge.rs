//! Bridge facade wiring transport, routing and sessions together
//!
//! This is the surface the (external) selection UI talks to: candidate
//! applications, channel assignment and clearing, the level-feedback
//! subscription. The host binary drives connection lifecycle through it.

use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::AppConfig;
use crate::constants::FEEDBACK_CAPACITY;
use crate::error::{Result, TransportError};
use crate::router::{ChannelRegistry, ChannelState, Dispatcher, UpdateQueue, VolumeApplier};
use crate::sessions::{SessionBackend, SessionDirectory, SessionId};
use crate::transport::{LevelUpdate, SerialLink, TransportEvent};

pub struct MixerBridge {
    config: AppConfig,
    registry: Arc<ChannelRegistry>,
    directory: Arc<SessionDirectory>,
    queue: Arc<UpdateQueue>,
    dispatcher: Dispatcher,
    link: Option<SerialLink>,
    feedback_tx: Sender<LevelUpdate>,
    feedback_rx: Receiver<LevelUpdate>,
    events_tx: Sender<TransportEvent>,
    events_rx: Receiver<TransportEvent>,
}

impl MixerBridge {
    /// Wire up the pipeline; nothing runs until `start`
    pub fn new(config: AppConfig, backend: Arc<dyn SessionBackend>) -> Self {
        let registry = Arc::new(ChannelRegistry::new(config.panel.channels));
        let directory = Arc::new(SessionDirectory::new(
            backend,
            Duration::from_millis(config.sessions.snapshot_max_age_ms),
        ));
        let queue = Arc::new(UpdateQueue::new(config.panel.channels));
        let applier = Arc::new(VolumeApplier::new(directory.clone()));
        let dispatcher = Dispatcher::new(
            queue.clone(),
            registry.clone(),
            applier,
            config.panel.max_raw,
        );
        let (feedback_tx, feedback_rx) = bounded(FEEDBACK_CAPACITY);
        let (events_tx, events_rx) = bounded(16);

        Self {
            config,
            registry,
            directory,
            queue,
            dispatcher,
            link: None,
            feedback_tx,
            feedback_rx,
            events_tx,
            events_rx,
        }
    }

    /// Start the dispatch worker and open the serial link
    pub fn start(&mut self) -> Result<()> {
        self.dispatcher.start()?;
        self.connect()
    }

    /// (Re)open the serial link; the host's reconnect policy calls this
    pub fn connect(&mut self) -> Result<()> {
        if let Some(mut old) = self.link.take() {
            old.stop();
        }
        let mut link = SerialLink::open(&self.config.serial)?;
        link.start(
            self.queue.clone(),
            self.feedback_tx.clone(),
            self.events_tx.clone(),
            self.config.panel.max_raw,
        )?;
        self.link = Some(link);
        Ok(())
    }

    /// Whether the serial link is currently alive
    pub fn is_connected(&self) -> bool {
        self.link.as_ref().map(SerialLink::is_running).unwrap_or(false)
    }

    // --- channel-assignment interface (consumed by the selection UI) ---

    /// Display names the user can pick from: distinct process images
    /// with at least one live audio session, sorted
    pub fn list_candidate_applications(&self) -> Vec<String> {
        self.directory.refresh();
        let mut names: Vec<String> = self
            .directory
            .snapshot()
            .into_iter()
            .map(|s| s.process_name)
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Assign an application to a channel
    pub fn assign_channel(&self, channel: usize, application: &str) -> Result<Vec<SessionId>> {
        Ok(self.registry.assign(channel, application, &self.directory)?)
    }

    /// Clear a channel back to unassigned
    pub fn clear_channel(&self, channel: usize) {
        self.registry.clear(channel);
    }

    /// Current lifecycle state of a channel
    pub fn channel_state(&self, channel: usize) -> Option<ChannelState> {
        self.registry.state(channel)
    }

    // --- level-feedback interface ---

    /// Subscription delivering one update per decoded field per frame,
    /// regardless of assignment
    pub fn subscribe_levels(&self) -> Receiver<LevelUpdate> {
        self.feedback_rx.clone()
    }

    /// Terminal transport notifications; the host owns reconnection
    pub fn transport_events(&self) -> Receiver<TransportEvent> {
        self.events_rx.clone()
    }

    /// Force fader positions on the device (diagnostic playback)
    pub fn send_frame(&mut self, levels: &[u16]) -> Result<()> {
        match self.link.as_mut() {
            Some(link) => link.write_line(levels),
            None => Err(TransportError::Closed.into()),
        }
    }

    /// Stop the pipeline and release the port; idempotent
    pub fn shutdown(&mut self) {
        if let Some(mut link) = self.link.take() {
            link.stop();
        }
        self.dispatcher.stop();
        info!("bridge stopped");
    }

    pub fn registry(&self) -> &Arc<ChannelRegistry> {
        &self.registry
    }

    pub fn queue(&self) -> &Arc<UpdateQueue> {
        &self.queue
    }

    /// Updates that reached at least one session since startup
    pub fn applied_count(&self) -> u64 {
        self.dispatcher.applied_count()
    }
}

impl Drop for MixerBridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::backend::testing::FakeBackend;

    fn bridge_with(backend: Arc<FakeBackend>) -> MixerBridge {
        let mut config = AppConfig::default();
        config.sessions.snapshot_max_age_ms = 0;
        MixerBridge::new(config, backend)
    }

    #[test]
    fn test_candidates_are_sorted_and_distinct() {
        let backend = Arc::new(FakeBackend::new());
        backend.add_session("s1", 100, "spotify.exe");
        backend.add_session("s2", 100, "spotify.exe");
        backend.add_session("s3", 200, "game.exe");
        let bridge = bridge_with(backend);

        assert_eq!(
            bridge.list_candidate_applications(),
            vec!["game.exe".to_string(), "spotify.exe".to_string()]
        );
    }

    #[test]
    fn test_assign_and_clear_through_facade() {
        let backend = Arc::new(FakeBackend::new());
        backend.add_session("s1", 100, "spotify.exe");
        let bridge = bridge_with(backend);

        assert_eq!(bridge.channel_state(0), Some(ChannelState::Unassigned));
        let ids = bridge.assign_channel(0, "spotify.exe").unwrap();
        assert_eq!(ids.len(), 1);
        assert_eq!(bridge.channel_state(0), Some(ChannelState::Assigned));

        bridge.clear_channel(0);
        assert_eq!(bridge.channel_state(0), Some(ChannelState::Unassigned));
    }

    #[test]
    fn test_assign_unknown_application_fails() {
        let bridge = bridge_with(Arc::new(FakeBackend::new()));
        assert!(bridge.assign_channel(0, "nothing.exe").is_err());
    }

    #[test]
    fn test_send_frame_without_link_is_an_error() {
        let mut bridge = bridge_with(Arc::new(FakeBackend::new()));
        assert!(bridge.send_frame(&[1, 2, 3]).is_err());
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let mut bridge = bridge_with(Arc::new(FakeBackend::new()));
        bridge.shutdown();
        bridge.shutdown();
    }
}
