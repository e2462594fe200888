//! Serial link to the fader panel
//!
//! Owns the port plus a reader thread that feeds the frame decoder.
//! Decoded events go two ways: into the update queue for dispatch, and
//! onto the feedback channel for the UI's bar animation. The link
//! reports a terminal `Closed` event when the stream dies; reconnection
//! policy belongs to the host.

use crossbeam_channel::Sender;
use serialport::SerialPort;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

use crate::config::SerialConfig;
use crate::error::{Result, TransportError};
use crate::protocol::frame::{encode_line, FrameDecoder};
use crate::router::{Dispatcher, UpdateQueue};

/// Terminal transport notifications delivered to the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The stream ended or the read path failed hard
    Closed { reason: String },
}

/// A decoded fader position, delivered on the feedback channel
///
/// Fired once per decoded field per frame, whether or not the channel is
/// assigned; the UI animates bars from these.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelUpdate {
    pub channel: usize,
    pub raw: u16,
    pub normalized: f32,
}

pub struct SerialLink {
    config: SerialConfig,
    port: Box<dyn SerialPort>,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl SerialLink {
    /// Open the configured port.
    ///
    /// A failure here is the one transport error that should surface to
    /// the user at startup.
    pub fn open(config: &SerialConfig) -> Result<Self> {
        let port = serialport::new(&config.port, config.baud)
            .timeout(config.timeout())
            .open()
            .map_err(|e| TransportError::OpenFailed {
                port: config.port.clone(),
                reason: e.to_string(),
            })?;

        info!(port = %config.port, baud = config.baud, "serial port open");
        Ok(Self {
            config: config.clone(),
            port,
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        })
    }

    /// Start the reader thread feeding decoded events into the queue and
    /// the feedback channel
    pub fn start(
        &mut self,
        queue: Arc<UpdateQueue>,
        feedback: Sender<LevelUpdate>,
        events: Sender<TransportEvent>,
        max_raw: u16,
    ) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(TransportError::AlreadyRunning.into());
        }

        let mut reader = self.port.try_clone().map_err(|e| TransportError::OpenFailed {
            port: self.config.port.clone(),
            reason: e.to_string(),
        })?;
        let running = self.running.clone();
        let channel_count = queue.channel_count();
        let port_name = self.config.port.clone();

        let handle = thread::Builder::new()
            .name("serial-reader".to_string())
            .spawn(move || {
                let mut decoder = FrameDecoder::new(channel_count);
                let reason = pump(&mut reader, &running, &mut decoder, &queue, &feedback, max_raw);
                running.store(false, Ordering::SeqCst);
                if let Some(reason) = reason {
                    warn!(port = %port_name, "serial stream closed: {}", reason);
                    let _ = events.send(TransportEvent::Closed { reason });
                }
            })?;

        self.thread_handle = Some(handle);
        Ok(())
    }

    /// Write one frame line to the device (diagnostic playback)
    pub fn write_line(&mut self, levels: &[u16]) -> Result<()> {
        let line = encode_line(levels);
        self.port
            .write_all(line.as_bytes())
            .and_then(|_| self.port.flush())
            .map_err(|e| TransportError::WriteFailed(e.to_string()))?;
        Ok(())
    }

    /// Whether the reader thread is alive
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn port_name(&self) -> &str {
        &self.config.port
    }

    /// Stop the reader and join it; the port handle closes on drop
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SerialLink {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Read loop body; returns the closure reason, or `None` when stopped
/// deliberately
fn pump<R: Read>(
    reader: &mut R,
    running: &AtomicBool,
    decoder: &mut FrameDecoder,
    queue: &UpdateQueue,
    feedback: &Sender<LevelUpdate>,
    max_raw: u16,
) -> Option<String> {
    let mut buf = [0u8; 256];
    loop {
        if !running.load(Ordering::Relaxed) {
            return None;
        }
        match reader.read(&mut buf) {
            Ok(0) => return Some("stream closed".to_string()),
            Ok(n) => {
                for event in decoder.feed(&buf[..n]) {
                    let update = LevelUpdate {
                        channel: event.channel,
                        raw: event.raw,
                        normalized: Dispatcher::normalize(event.raw, max_raw),
                    };
                    // UI frames are disposable; drop on a full channel
                    if feedback.try_send(update).is_err() {
                        debug!("feedback channel full or closed, frame dropped");
                    }
                    queue.enqueue(event.channel, event.raw);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Some(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use std::io::Cursor;

    fn run_pump(input: &[u8]) -> (Arc<UpdateQueue>, Vec<LevelUpdate>, Option<String>) {
        let queue = Arc::new(UpdateQueue::new(5));
        let (feedback_tx, feedback_rx) = bounded(64);
        let running = AtomicBool::new(true);
        let mut decoder = FrameDecoder::new(5);
        let mut reader = Cursor::new(input.to_vec());

        let reason = pump(&mut reader, &running, &mut decoder, &queue, &feedback_tx, 1024);
        drop(feedback_tx);
        (queue, feedback_rx.iter().collect(), reason)
    }

    #[test]
    fn test_pump_feeds_queue_and_feedback() {
        let (queue, feedback, reason) = run_pump(b"10|20|\n30|40|\n");

        // end of the cursor looks like a closed stream
        assert_eq!(reason.as_deref(), Some("stream closed"));

        // feedback sees every decoded field
        assert_eq!(feedback.len(), 4);
        assert_eq!(feedback[0].channel, 0);
        assert_eq!(feedback[0].raw, 10);
        assert!((feedback[3].normalized - 40.0 / 1024.0).abs() < 1e-6);

        // the queue coalesced each channel to its latest reading
        let mut raws = [None, None];
        while let Some(update) = queue.try_recv() {
            raws[update.channel] = Some(update.raw);
        }
        assert_eq!(raws, [Some(30), Some(40)]);
    }

    #[test]
    fn test_pump_stops_when_flag_cleared() {
        let queue = Arc::new(UpdateQueue::new(5));
        let (feedback_tx, _feedback_rx) = bounded(64);
        let running = AtomicBool::new(false);
        let mut decoder = FrameDecoder::new(5);
        let mut reader = Cursor::new(b"1|2|\n".to_vec());

        let reason = pump(&mut reader, &running, &mut decoder, &queue, &feedback_tx, 1024);
        assert!(reason.is_none());
        assert!(queue.try_recv().is_none());
    }

    #[test]
    fn test_pump_survives_full_feedback_channel() {
        let queue = Arc::new(UpdateQueue::new(5));
        let (feedback_tx, feedback_rx) = bounded(1);
        let running = AtomicBool::new(true);
        let mut decoder = FrameDecoder::new(5);
        let mut reader = Cursor::new(b"1|2|3|4|5|\n".to_vec());

        let reason = pump(&mut reader, &running, &mut decoder, &queue, &feedback_tx, 1024);
        assert_eq!(reason.as_deref(), Some("stream closed"));

        // one frame kept, the rest dropped, dispatch path unaffected
        assert_eq!(feedback_rx.len(), 1);
        let mut dispatched = 0;
        while queue.try_recv().is_some() {
            dispatched += 1;
        }
        assert_eq!(dispatched, 5);
    }
}
