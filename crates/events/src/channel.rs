//! Bounded per-job event channel.
//!
//! One channel per job run, producer side owned by the processing loop,
//! consumer side handed to exactly one stream subscriber. Backpressure is
//! deliberate: a full channel suspends the producer until the consumer
//! drains, throttling detection work to the read rate — the second relief
//! path besides the pacer's catch-up skip.

use std::time::Duration;

use tokio::sync::mpsc;

use crate::event::StreamEvent;

/// Reference capacity: enough to absorb a stalled consumer for ~20 s of
/// ticks at the default sampling rate.
pub const DEFAULT_CAPACITY: usize = 100;

/// Create a bounded event channel.
pub fn channel(capacity: usize) -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender { tx }, EventReceiver { rx })
}

/// The error returned when the consumer side is gone.
///
/// After a restart the superseded loop holds a sender whose channel was
/// discarded; its sends fail with this and the loop exits.
#[derive(Debug, thiserror::Error)]
#[error("event channel closed")]
pub struct ChannelClosed;

/// Producer half.
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::Sender<StreamEvent>,
}

impl EventSender {
    /// Enqueue an event, waiting while the channel is full.
    pub async fn send(&self, event: StreamEvent) -> Result<(), ChannelClosed> {
        self.tx.send(event).await.map_err(|_| ChannelClosed)
    }
}

/// Outcome of one consumer wait.
#[derive(Debug)]
pub enum RecvOutcome {
    /// A real event arrived.
    Event(StreamEvent),
    /// Nothing arrived within the idle window; emit a heartbeat.
    Idle,
    /// Producer gone and the queue drained.
    Closed,
}

/// Consumer half. Not cloneable: one subscriber per run.
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::Receiver<StreamEvent>,
}

impl EventReceiver {
    /// Wait for the next event, giving up after `idle` so the caller can
    /// emit a synthetic heartbeat without consuming anything.
    pub async fn recv_idle(&mut self, idle: Duration) -> RecvOutcome {
        match tokio::time::timeout(idle, self.rx.recv()).await {
            Ok(Some(event)) => RecvOutcome::Event(event),
            Ok(None) => RecvOutcome::Closed,
            Err(_) => RecvOutcome::Idle,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
