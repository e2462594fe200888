//! Latest-wins update queue between decode and dispatch
//!
//! One slot per channel: a bounded ring of size one is the coalescing
//! policy expressed as a data structure. A ready-token channel carries at
//! most one token per channel, so memory stays O(channel count) at any
//! input rate and a newly-arrived reading silently supersedes a pending
//! one for the same channel.

use crossbeam::queue::ArrayQueue;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use super::channel::ChannelId;

/// A queued fader reading awaiting dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingUpdate {
    pub channel: ChannelId,
    pub raw: u16,
    /// Monotonic stamp; newer updates for a channel supersede older ones
    pub seq: u64,
}

struct Slot {
    pending: ArrayQueue<PendingUpdate>,
    /// Whether a ready token for this slot is already outstanding
    queued: AtomicBool,
}

pub struct UpdateQueue {
    slots: Vec<Slot>,
    ready_tx: Sender<ChannelId>,
    ready_rx: Receiver<ChannelId>,
    next_seq: AtomicU64,
    coalesced: AtomicU64,
}

impl UpdateQueue {
    pub fn new(channel_count: usize) -> Self {
        let (ready_tx, ready_rx) = bounded(channel_count.max(1));
        Self {
            slots: (0..channel_count)
                .map(|_| Slot {
                    pending: ArrayQueue::new(1),
                    queued: AtomicBool::new(false),
                })
                .collect(),
            ready_tx,
            ready_rx,
            next_seq: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
        }
    }

    pub fn channel_count(&self) -> usize {
        self.slots.len()
    }

    /// Enqueue a reading; never blocks.
    ///
    /// A reading still pending for the same channel is replaced, not
    /// queued behind. Out-of-range channels are dropped (the decoder
    /// already bounds events to the channel count).
    pub fn enqueue(&self, channel: ChannelId, raw: u16) {
        let Some(slot) = self.slots.get(channel) else {
            return;
        };
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        if slot
            .pending
            .force_push(PendingUpdate { channel, raw, seq })
            .is_some()
        {
            self.coalesced.fetch_add(1, Ordering::Relaxed);
        }
        if !slot.queued.swap(true, Ordering::AcqRel) {
            // capacity equals channel count and at most one token per
            // channel is outstanding, so this send cannot fail
            let _ = self.ready_tx.try_send(channel);
        }
    }

    /// Blocking receive with timeout; `None` on timeout
    pub fn recv_timeout(&self, timeout: Duration) -> Option<PendingUpdate> {
        loop {
            let channel = match self.ready_rx.recv_timeout(timeout) {
                Ok(channel) => channel,
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return None;
                }
            };
            let slot = &self.slots[channel];
            slot.queued.store(false, Ordering::Release);
            if let Some(update) = slot.pending.pop() {
                return Some(update);
            }
            // token raced an already-drained slot; keep waiting
        }
    }

    /// Drain one update without blocking
    pub fn try_recv(&self) -> Option<PendingUpdate> {
        loop {
            let channel = self.ready_rx.try_recv().ok()?;
            let slot = &self.slots[channel];
            slot.queued.store(false, Ordering::Release);
            if let Some(update) = slot.pending.pop() {
                return Some(update);
            }
        }
    }

    /// Updates superseded before they were dispatched
    pub fn coalesced_count(&self) -> u64 {
        self.coalesced.load(Ordering::Relaxed)
    }
}
