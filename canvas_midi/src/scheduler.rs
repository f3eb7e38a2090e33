//! Pending note-offs, owned by one thread.
//!
//! Every note the sequencer starts must stop again a fixed time later.  The
//! scheduler keeps those stops in a deadline-ordered list instead of
//! scattering detached timers, so the whole list can be dropped
//! ([`NoteOffHandle::cancel_all`]) or flushed at teardown.  It only holds a
//! weak reference to the sink: once the sink is gone, due note-offs are
//! skipped rather than sent to a dead device.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Weak;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::sink::{AudioSink, SharedSink};

enum Command {
    Schedule { pitch: u8, at: Instant },
    CancelAll,
    Shutdown,
}

/// Cheap, cloneable way to talk to a running scheduler.
#[derive(Clone)]
pub struct NoteOffHandle {
    tx: Sender<Command>,
}

impl NoteOffHandle {
    /// Send `note_off(pitch)` after `delay`.
    pub fn schedule(&self, pitch: u8, delay: Duration) {
        let _ = self.tx.send(Command::Schedule { pitch, at: Instant::now() + delay });
    }

    /// Forget every pending note-off without sending it.
    pub fn cancel_all(&self) {
        let _ = self.tx.send(Command::CancelAll);
    }
}

/// Owns the scheduler thread.  Dropping it sends every pending note-off
/// immediately and joins the thread.
pub struct NoteOffScheduler {
    handle: NoteOffHandle,
    thread: Option<JoinHandle<()>>,
}

impl NoteOffScheduler {
    pub fn spawn(sink: &SharedSink) -> Self {
        let (tx, rx) = mpsc::channel::<Command>();
        let weak = std::sync::Arc::downgrade(sink);
        let thread = thread::Builder::new()
            .name("note-off".into())
            .spawn(move || scheduler_thread(weak, rx))
            .ok();
        if thread.is_none() {
            tracing::warn!("could not start note-off thread; notes will not be released");
        }
        NoteOffScheduler { handle: NoteOffHandle { tx }, thread }
    }

    pub fn handle(&self) -> NoteOffHandle {
        self.handle.clone()
    }

    pub fn schedule(&self, pitch: u8, delay: Duration) {
        self.handle.schedule(pitch, delay);
    }

    pub fn cancel_all(&self) {
        self.handle.cancel_all();
    }
}

impl Drop for NoteOffScheduler {
    fn drop(&mut self) {
        let _ = self.handle.tx.send(Command::Shutdown);
        if let Some(t) = self.thread.take() {
            let _ = t.join();
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// scheduler_thread
// ════════════════════════════════════════════════════════════════════════════

type Pending = BinaryHeap<Reverse<(Instant, u64, u8)>>;

fn scheduler_thread(sink: Weak<Mutex<Box<dyn AudioSink>>>, rx: mpsc::Receiver<Command>) {
    let mut pending: Pending = BinaryHeap::new();
    let mut seq = 0u64;

    loop {
        let now = Instant::now();
        while let Some(&Reverse((at, _, pitch))) = pending.peek() {
            if at > now {
                break;
            }
            pending.pop();
            release(&sink, pitch);
        }

        let next = match pending.peek() {
            Some(&Reverse((at, _, _))) => match rx.recv_timeout(at.saturating_duration_since(now)) {
                Ok(cmd) => cmd,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => Command::Shutdown,
            },
            None => rx.recv().unwrap_or(Command::Shutdown),
        };

        match next {
            Command::Schedule { pitch, at } => {
                pending.push(Reverse((at, seq, pitch)));
                seq += 1;
            }
            Command::CancelAll => {
                debug!(dropped = pending.len(), "pending note-offs cancelled");
                pending.clear();
            }
            Command::Shutdown => {
                debug!(flushed = pending.len(), "note-off scheduler stopping");
                while let Some(Reverse((_, _, pitch))) = pending.pop() {
                    release(&sink, pitch);
                }
                return;
            }
        }
    }
}

fn release(sink: &Weak<Mutex<Box<dyn AudioSink>>>, pitch: u8) {
    match sink.upgrade() {
        Some(sink) => sink.lock().note_off(pitch),
        None => trace!(pitch, "sink gone; note-off skipped"),
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
