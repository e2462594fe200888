//! Dispatch worker draining the update queue
//!
//! Runs on its own thread so a slow OS volume call never delays decoding
//! of the next frame. Per-channel updates are applied in arrival order;
//! superseded updates were already coalesced away in the queue.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

use super::applier::{ApplyOutcome, VolumeApplier};
use super::queue::{PendingUpdate, UpdateQueue};
use super::registry::ChannelRegistry;
use crate::error::Result;

/// Poll granularity for the shutdown flag
const RECV_TIMEOUT: Duration = Duration::from_millis(100);

pub struct Dispatcher {
    queue: Arc<UpdateQueue>,
    registry: Arc<ChannelRegistry>,
    applier: Arc<VolumeApplier>,
    max_raw: u16,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
    applied_count: Arc<AtomicU64>,
}

impl Dispatcher {
    pub fn new(
        queue: Arc<UpdateQueue>,
        registry: Arc<ChannelRegistry>,
        applier: Arc<VolumeApplier>,
        max_raw: u16,
    ) -> Self {
        Self {
            queue,
            registry,
            applier,
            max_raw,
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
            applied_count: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Convert a raw reading to the normalized `[0.0, 1.0]` scale.
    ///
    /// `max_raw` must be nonzero (enforced by config validation).
    pub fn normalize(raw: u16, max_raw: u16) -> f32 {
        raw.min(max_raw) as f32 / max_raw as f32
    }

    /// Start the worker thread
    pub fn start(&mut self) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let queue = self.queue.clone();
        let registry = self.registry.clone();
        let applier = self.applier.clone();
        let running = self.running.clone();
        let applied_count = self.applied_count.clone();
        let max_raw = self.max_raw;

        let handle = thread::Builder::new()
            .name("volume-dispatch".to_string())
            .spawn(move || {
                while running.load(Ordering::Relaxed) {
                    if let Some(update) = queue.recv_timeout(RECV_TIMEOUT) {
                        Self::process(&registry, &applier, max_raw, &applied_count, update);
                    }
                }
                debug!("dispatch worker stopped");
            })?;

        self.thread_handle = Some(handle);
        Ok(())
    }

    /// Stop the worker, discarding outstanding work
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Updates that reached at least one session
    pub fn applied_count(&self) -> u64 {
        self.applied_count.load(Ordering::Relaxed)
    }

    /// Drain and process everything queued right now on the caller's
    /// thread; shutdown and test helper
    pub fn drain_now(&self) {
        while let Some(update) = self.queue.try_recv() {
            Self::process(
                &self.registry,
                &self.applier,
                self.max_raw,
                &self.applied_count,
                update,
            );
        }
    }

    fn process(
        registry: &ChannelRegistry,
        applier: &VolumeApplier,
        max_raw: u16,
        applied_count: &AtomicU64,
        update: PendingUpdate,
    ) {
        let PendingUpdate { channel, raw, .. } = update;

        registry.record_level(channel, raw);
        let Some(slot) = registry.slot(channel) else {
            return;
        };
        if !slot.is_active() {
            // unassigned and stale channels track position only
            return;
        }

        let normalized = Self::normalize(raw, max_raw);
        match applier.apply(&slot.sessions, normalized) {
            ApplyOutcome::Applied { sessions } => {
                registry.record_applied(channel, normalized);
                applied_count.fetch_add(1, Ordering::Relaxed);
                debug!(channel, normalized, sessions, "volume applied");
            }
            ApplyOutcome::PartialFailure { applied, missing } => {
                registry.record_applied(channel, normalized);
                applied_count.fetch_add(1, Ordering::Relaxed);
                warn!(channel, applied, missing, "volume applied partially");
            }
            ApplyOutcome::NotFound => {
                registry.mark_stale(channel);
                warn!(channel, "assigned sessions vanished, channel is stale");
            }
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.stop();
    }
}
