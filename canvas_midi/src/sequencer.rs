//! Column-by-column playback of a coverage snapshot.
//!
//! A [`Sequencer`] is Idle until [`Sequencer::play`] hands a snapshot of the
//! painted cells to a fresh playback thread; it is Idle again once that
//! thread has walked every column or been cancelled.  Each column sounds
//! every covered cell at once, then waits one beat (`60 / bpm` seconds).
//! Waits are measured against the start time, so a slow sink does not make
//! later columns drift.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use canvas_grid::{CoverageSet, Grid, Scale};

use crate::scheduler::{NoteOffHandle, NoteOffScheduler};
use crate::sink::{SharedSink, DEFAULT_VELOCITY};

/// How long every note sounds.
pub const NOTE_LENGTH: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum SequencerError {
    #[error("already playing")]
    AlreadyPlaying,
    #[error("tempo out of range: {0} beats per minute")]
    InvalidTempo(f64),
    #[error("could not start playback thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Time between two columns at `bpm`.
pub fn column_interval(bpm: f64) -> Result<Duration, SequencerError> {
    if !bpm.is_finite() || bpm <= 0.0 {
        return Err(SequencerError::InvalidTempo(bpm));
    }
    Duration::try_from_secs_f64(60.0 / bpm).map_err(|_| SequencerError::InvalidTempo(bpm))
}

// ════════════════════════════════════════════════════════════════════════════
// plan: the timeline a playback follows
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlannedNote {
    pub column: usize,
    pub row:    usize,
    pub pitch:  u8,
    /// Offset of the note-on from the start of playback.
    pub on:     Duration,
    pub off:    Duration,
}

/// Every note a playback of `coverage` would sound, in the order it would
/// sound them: by column, then top row first.
pub fn plan(
    grid:     &Grid,
    coverage: &CoverageSet,
    scale:    &Scale,
    bpm:      f64,
) -> Result<Vec<PlannedNote>, SequencerError> {
    let interval = column_interval(bpm)?;
    playback_length(grid, bpm)?;
    let mut notes = Vec::with_capacity(coverage.len());
    for column in 0..grid.columns() {
        let on = column_offset(interval, column).ok_or(SequencerError::InvalidTempo(bpm))?;
        for cell in coverage.column(grid, column) {
            let row = grid.row_of(cell);
            notes.push(PlannedNote {
                column,
                row,
                pitch: grid.pitch_for_row(row, scale),
                on,
                off: on.saturating_add(NOTE_LENGTH),
            });
        }
    }
    Ok(notes)
}

/// Total length of a playback: one interval per column.
pub fn playback_length(grid: &Grid, bpm: f64) -> Result<Duration, SequencerError> {
    column_offset(column_interval(bpm)?, grid.columns()).ok_or(SequencerError::InvalidTempo(bpm))
}

fn column_offset(interval: Duration, column: usize) -> Option<Duration> {
    interval.checked_mul(u32::try_from(column).ok()?)
}

// ════════════════════════════════════════════════════════════════════════════
// PlaybackEvent / CancelToken
// ════════════════════════════════════════════════════════════════════════════

/// Progress reports from the playback thread.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlaybackEvent {
    Started { columns: usize, notes: usize },
    Column  { column: usize, pitches: Vec<u8> },
    Finished,
    Cancelled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayOutcome {
    Finished,
    Cancelled,
}

/// One-shot cancellation flag that sleeping threads can wait on.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancelToken {
    pub fn new() -> Self {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        let (flag, cv) = &*self.inner;
        *flag.lock() = true;
        cv.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.0.lock()
    }

    /// Sleep until `deadline` or cancellation.  Returns `true` if cancelled.
    pub fn wait_until(&self, deadline: Instant) -> bool {
        let (flag, cv) = &*self.inner;
        let mut cancelled = flag.lock();
        while !*cancelled {
            if cv.wait_until(&mut cancelled, deadline).timed_out() {
                break;
            }
        }
        *cancelled
    }
}

// ════════════════════════════════════════════════════════════════════════════
// PlayHandle
// ════════════════════════════════════════════════════════════════════════════

/// A running playback.  Dropping the handle lets playback run to the end.
pub struct PlayHandle {
    token:  CancelToken,
    thread: Option<JoinHandle<PlayOutcome>>,
}

impl PlayHandle {
    /// Stop before the next column.  Notes already sounding are still
    /// released on time.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Wait for the playback thread.
    pub fn join(mut self) -> PlayOutcome {
        match self.thread.take() {
            Some(t) => t.join().unwrap_or(PlayOutcome::Cancelled),
            None => PlayOutcome::Cancelled,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Sequencer
// ════════════════════════════════════════════════════════════════════════════

pub struct Sequencer {
    grid:        Grid,
    velocity:    u8,
    note_length: Duration,
    // Dropped before `sink` so pending note-offs still reach it.
    scheduler:   NoteOffScheduler,
    sink:        SharedSink,
    playing:     Arc<AtomicBool>,
    events:      Option<Sender<PlaybackEvent>>,
}

impl Sequencer {
    pub fn new(grid: Grid, sink: SharedSink) -> Self {
        let scheduler = NoteOffScheduler::spawn(&sink);
        Sequencer {
            grid,
            velocity:    DEFAULT_VELOCITY,
            note_length: NOTE_LENGTH,
            scheduler,
            sink,
            playing:     Arc::new(AtomicBool::new(false)),
            events:      None,
        }
    }

    pub fn with_velocity(mut self, velocity: u8) -> Self {
        self.velocity = velocity.min(127);
        self
    }

    pub fn with_note_length(mut self, note_length: Duration) -> Self {
        self.note_length = note_length;
        self
    }

    /// Report progress on `tx`.
    pub fn with_events(mut self, tx: Sender<PlaybackEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn sink(&self) -> &SharedSink {
        &self.sink
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    pub fn program_change(&self, program: u8) {
        self.sink.lock().program_change(program & 0x7F);
    }

    /// Sound one note for the usual length, outside any playback.
    pub fn preview(&self, pitch: u8) {
        self.sink.lock().note_on(pitch, self.velocity);
        self.scheduler.schedule(pitch, self.note_length);
    }

    /// Start playing `coverage` in `scale`.  The set and the scale are
    /// copied; later edits do not affect this playback.
    pub fn play(&self, coverage: &CoverageSet, scale: Scale, bpm: f64) -> Result<PlayHandle, SequencerError> {
        let interval = column_interval(bpm)?;
        let length = playback_length(&self.grid, bpm)?;
        if Instant::now().checked_add(length).is_none() {
            return Err(SequencerError::InvalidTempo(bpm));
        }
        if self
            .playing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SequencerError::AlreadyPlaying);
        }

        let grid = self.grid;
        let columns: Vec<Vec<u8>> = (0..grid.columns())
            .map(|c| coverage.column(&grid, c).map(|cell| grid.pitch_for_cell(cell, &scale)).collect())
            .collect();

        let run = Playback {
            columns,
            interval,
            velocity:    self.velocity,
            note_length: self.note_length,
            sink:        Arc::clone(&self.sink),
            offs:        self.scheduler.handle(),
            token:       CancelToken::new(),
            events:      self.events.clone(),
            playing:     Arc::clone(&self.playing),
        };
        let token = run.token.clone();

        info!(cells = coverage.len(), bpm, "playback starting");
        match thread::Builder::new().name("sequencer".into()).spawn(move || run.run()) {
            Ok(t) => Ok(PlayHandle { token, thread: Some(t) }),
            Err(e) => {
                self.playing.store(false, Ordering::SeqCst);
                Err(SequencerError::Spawn(e))
            }
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Playback: the thread body
// ════════════════════════════════════════════════════════════════════════════

struct Playback {
    columns:     Vec<Vec<u8>>,
    interval:    Duration,
    velocity:    u8,
    note_length: Duration,
    sink:        SharedSink,
    offs:        NoteOffHandle,
    token:       CancelToken,
    events:      Option<Sender<PlaybackEvent>>,
    playing:     Arc<AtomicBool>,
}

/// Returns the sequencer to Idle even if the thread unwinds.
struct IdleOnDrop(Arc<AtomicBool>);

impl Drop for IdleOnDrop {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Playback {
    fn run(self) -> PlayOutcome {
        let _idle = IdleOnDrop(Arc::clone(&self.playing));
        let notes = self.columns.iter().map(Vec::len).sum();
        self.emit(PlaybackEvent::Started { columns: self.columns.len(), notes });

        let start = Instant::now();
        let mut outcome = PlayOutcome::Finished;
        for (column, pitches) in self.columns.iter().enumerate() {
            if self.token.is_cancelled() {
                outcome = PlayOutcome::Cancelled;
                break;
            }
            if !pitches.is_empty() {
                let mut sink = self.sink.lock();
                for &pitch in pitches {
                    sink.note_on(pitch, self.velocity);
                }
                drop(sink);
                for &pitch in pitches {
                    self.offs.schedule(pitch, self.note_length);
                }
                debug!(column, ?pitches, "column");
            } else {
                trace!(column, "empty column");
            }
            self.emit(PlaybackEvent::Column { column, pitches: pitches.clone() });

            let Some(deadline) = column_offset(self.interval, column + 1).and_then(|d| start.checked_add(d)) else {
                warn!(column, "column deadline out of range");
                break;
            };
            if self.token.wait_until(deadline) {
                outcome = PlayOutcome::Cancelled;
                break;
            }
        }

        self.playing.store(false, Ordering::SeqCst);
        match outcome {
            PlayOutcome::Finished => {
                info!("playback finished");
                self.emit(PlaybackEvent::Finished);
            }
            PlayOutcome::Cancelled => {
                info!("playback cancelled");
                self.emit(PlaybackEvent::Cancelled);
            }
        }
        outcome
    }

    fn emit(&self, event: PlaybackEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{shared, RecordingSink, SinkMessage};
    use canvas_grid::{Cell, Mood, DEFAULT_SCALE};
    use std::sync::mpsc;

    fn cells(grid: &Grid, at: &[(usize, usize)]) -> CoverageSet {
        at.iter().map(|&(row, col)| grid.cell(row, col).unwrap()).collect()
    }

    fn on_times(rec: &RecordingSink) -> Vec<(Duration, u8)> {
        rec.events()
            .into_iter()
            .filter_map(|e| match e.message {
                SinkMessage::NoteOn { pitch, .. } => Some((e.at, pitch)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn interval_is_one_beat() {
        assert_eq!(column_interval(120.0).unwrap(), Duration::from_millis(500));
        assert_eq!(column_interval(60.0).unwrap(), Duration::from_secs(1));
        assert!(matches!(column_interval(0.0), Err(SequencerError::InvalidTempo(_))));
        assert!(matches!(column_interval(-5.0), Err(SequencerError::InvalidTempo(_))));
        assert!(matches!(column_interval(f64::NAN), Err(SequencerError::InvalidTempo(_))));
    }

    #[test]
    fn tiny_tempo_is_rejected() {
        let g = Grid::STANDARD;
        assert!(matches!(column_interval(1e-300), Err(SequencerError::InvalidTempo(_))));
        assert!(matches!(playback_length(&g, 1e-300), Err(SequencerError::InvalidTempo(_))));
        // One interval fits in a Duration but 32 of them do not.
        let bpm = 60.0 / (u64::MAX as f64 / 4.0);
        assert!(column_interval(bpm).is_ok());
        assert!(matches!(playback_length(&g, bpm), Err(SequencerError::InvalidTempo(_))));
        assert!(matches!(plan(&g, &CoverageSet::new(), &Mood::Happy.scale(), bpm), Err(SequencerError::InvalidTempo(_))));
    }

    #[test]
    fn plan_orders_by_column_then_row() {
        let g = Grid::STANDARD;
        let cov = cells(&g, &[(0, 3), (23, 1), (5, 1)]);
        let notes = plan(&g, &cov, &DEFAULT_SCALE, 120.0).unwrap();
        let order: Vec<(usize, usize)> = notes.iter().map(|n| (n.column, n.row)).collect();
        assert_eq!(order, vec![(1, 5), (1, 23), (3, 0)]);

        let bottom = notes[1];
        assert_eq!(bottom.pitch, 42);
        assert_eq!(bottom.on, Duration::from_millis(500));
        assert_eq!(bottom.off, Duration::from_millis(1500));
        assert_eq!(notes[2].pitch, 82);
        assert_eq!(notes[2].on, Duration::from_millis(1500));
    }

    #[test]
    fn playback_length_covers_every_column() {
        assert_eq!(playback_length(&Grid::STANDARD, 120.0).unwrap(), Duration::from_secs(16));
    }

    #[test]
    fn plays_one_note_per_covered_cell_in_column_order() {
        let g = Grid::new(4, 3);
        let rec = RecordingSink::new();
        let seq = Sequencer::new(g, shared(rec.clone())).with_note_length(Duration::from_millis(5));
        let cov = cells(&g, &[(0, 2), (2, 0), (1, 0)]);
        let scale = Mood::Happy.scale();

        let outcome = seq.play(&cov, scale, 6000.0).unwrap().join();
        assert_eq!(outcome, PlayOutcome::Finished);
        assert!(!seq.is_playing());

        let expected: Vec<u8> = [(1, 0), (2, 0), (0, 2)]
            .iter()
            .map(|&(r, c)| g.pitch_for_cell(g.cell(r, c).unwrap(), &scale))
            .collect();
        assert_eq!(rec.notes_on(), expected);
    }

    #[test]
    fn columns_are_one_interval_apart() {
        let g = Grid::new(3, 2);
        let rec = RecordingSink::new();
        let seq = Sequencer::new(g, shared(rec.clone())).with_note_length(Duration::from_millis(5));
        let cov = cells(&g, &[(0, 0), (0, 2)]);

        seq.play(&cov, DEFAULT_SCALE, 600.0).unwrap().join();
        let times = on_times(&rec);
        assert_eq!(times.len(), 2);
        let gap = times[1].0 - times[0].0;
        assert!(gap >= Duration::from_millis(190), "gap {gap:?}");
        assert!(gap < Duration::from_millis(400), "gap {gap:?}");
    }

    #[test]
    fn note_off_follows_one_second_later() {
        let g = Grid::new(2, 2);
        let rec = RecordingSink::new();
        let seq = Sequencer::new(g, shared(rec.clone()));
        let cov = cells(&g, &[(1, 0)]);

        seq.play(&cov, DEFAULT_SCALE, 6000.0).unwrap().join();
        thread::sleep(Duration::from_millis(1200));

        let ev = rec.events();
        let on = ev.iter().find(|e| matches!(e.message, SinkMessage::NoteOn { .. })).unwrap();
        let off = ev.iter().find(|e| matches!(e.message, SinkMessage::NoteOff { .. })).unwrap();
        let held = off.at - on.at;
        assert!(held >= Duration::from_millis(990), "held {held:?}");
        assert!(held < Duration::from_millis(1150), "held {held:?}");
    }

    #[test]
    fn second_play_is_rejected_until_idle() {
        let g = Grid::new(8, 2);
        let seq = Sequencer::new(g, shared(RecordingSink::new()));
        let cov = cells(&g, &[(0, 0)]);

        let first = seq.play(&cov, DEFAULT_SCALE, 60.0).unwrap();
        assert!(seq.is_playing());
        assert!(matches!(seq.play(&cov, DEFAULT_SCALE, 60.0), Err(SequencerError::AlreadyPlaying)));

        first.cancel();
        assert_eq!(first.join(), PlayOutcome::Cancelled);
        assert!(!seq.is_playing());
        seq.play(&cov, DEFAULT_SCALE, 6000.0).unwrap().join();
    }

    #[test]
    fn play_rejects_a_tempo_too_slow_to_time() {
        let g = Grid::new(8, 2);
        let seq = Sequencer::new(g, shared(RecordingSink::new()));
        let cov = cells(&g, &[(0, 0)]);
        assert!(matches!(seq.play(&cov, DEFAULT_SCALE, 1e-300), Err(SequencerError::InvalidTempo(_))));
        assert!(!seq.is_playing());
    }

    #[test]
    fn cancel_stops_before_the_next_column() {
        let g = Grid::new(4, 1);
        let rec = RecordingSink::new();
        let (tx, rx) = mpsc::channel();
        let seq = Sequencer::new(g, shared(rec.clone())).with_events(tx);
        let cov: CoverageSet = (0..4).map(Cell::from_index).collect();

        let started = Instant::now();
        let handle = seq.play(&cov, DEFAULT_SCALE, 60.0).unwrap();
        thread::sleep(Duration::from_millis(50));
        handle.cancel();
        assert_eq!(handle.join(), PlayOutcome::Cancelled);
        assert!(started.elapsed() < Duration::from_millis(900));
        assert_eq!(rec.notes_on().len(), 1);

        let events: Vec<PlaybackEvent> = rx.try_iter().collect();
        assert_eq!(events.first(), Some(&PlaybackEvent::Started { columns: 4, notes: 4 }));
        assert_eq!(events.last(), Some(&PlaybackEvent::Cancelled));
    }

    #[test]
    fn playback_uses_the_snapshot() {
        let g = Grid::new(2, 1);
        let rec = RecordingSink::new();
        let seq = Sequencer::new(g, shared(rec.clone())).with_note_length(Duration::from_millis(5));
        let mut cov = cells(&g, &[(0, 0), (0, 1)]);

        let handle = seq.play(&cov, DEFAULT_SCALE, 600.0).unwrap();
        cov.clear();
        handle.join();
        assert_eq!(rec.notes_on().len(), 2);
    }

    #[test]
    fn finished_event_after_every_column() {
        let g = Grid::new(3, 1);
        let (tx, rx) = mpsc::channel();
        let seq = Sequencer::new(g, shared(RecordingSink::new()))
            .with_note_length(Duration::from_millis(5))
            .with_events(tx);
        let cov = cells(&g, &[(0, 1)]);

        seq.play(&cov, DEFAULT_SCALE, 6000.0).unwrap().join();
        let events: Vec<PlaybackEvent> = rx.try_iter().collect();
        let pitch = g.pitch_for_row(0, &DEFAULT_SCALE);
        assert_eq!(
            events,
            vec![
                PlaybackEvent::Started { columns: 3, notes: 1 },
                PlaybackEvent::Column { column: 0, pitches: vec![] },
                PlaybackEvent::Column { column: 1, pitches: vec![pitch] },
                PlaybackEvent::Column { column: 2, pitches: vec![] },
                PlaybackEvent::Finished,
            ]
        );
    }

    #[test]
    fn preview_releases_the_note() {
        let rec = RecordingSink::new();
        let seq = Sequencer::new(Grid::STANDARD, shared(rec.clone()))
            .with_velocity(100)
            .with_note_length(Duration::from_millis(10));
        seq.preview(60);
        thread::sleep(Duration::from_millis(100));
        assert_eq!(
            rec.messages(),
            vec![SinkMessage::NoteOn { pitch: 60, velocity: 100 }, SinkMessage::NoteOff { pitch: 60 }]
        );
    }
}
