//! The playback thread.
//!
//! [`Player`] owns a [`Sequencer`] on its own thread and is driven by
//! [`PlayerCommand`]s.  Progress comes back as [`PlayerEvent`]s, drained
//! without blocking by the app loop.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use canvas_grid::{CoverageSet, Grid, Scale};
use canvas_midi::{PlayHandle, PlaybackEvent, Sequencer, SharedSink};

const POLL: Duration = Duration::from_millis(10);

// ════════════════════════════════════════════════════════════════════════════
// PlayerCommand / PlayerEvent
// ════════════════════════════════════════════════════════════════════════════

pub enum PlayerCommand {
    /// Play a snapshot of the painted cells.
    Play { coverage: CoverageSet, scale: Scale, bpm: f64 },
    /// Cancel the running playback, if any.
    Stop,
    /// Sound one pitch briefly.
    Preview(u8),
    /// Change instrument (MIDI program 0–127).
    SetInstrument(u8),
    /// Terminate the thread.
    Quit,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlayerEvent {
    Playback(PlaybackEvent),
    /// A `Play` the sequencer refused, with the reason.
    Rejected(String),
}

// ════════════════════════════════════════════════════════════════════════════
// Player
// ════════════════════════════════════════════════════════════════════════════

/// Handle to the playback thread.  Dropping it stops playback and releases
/// every sounding note.
pub struct Player {
    cmd_tx:   Sender<PlayerCommand>,
    event_rx: Receiver<PlayerEvent>,
    thread:   Option<JoinHandle<()>>,
}

impl Player {
    pub fn spawn(grid: Grid, sink: SharedSink, velocity: u8, program: u8) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel::<PlayerCommand>();
        let (event_tx, event_rx) = mpsc::channel::<PlayerEvent>();

        let thread = thread::Builder::new()
            .name("player".into())
            .spawn(move || {
                let (seq_tx, seq_rx) = mpsc::channel();
                let sequencer = Sequencer::new(grid, sink).with_velocity(velocity).with_events(seq_tx);
                sequencer.program_change(program);
                player_thread(sequencer, seq_rx, cmd_rx, event_tx);
            })
            .map_err(|e| warn!("could not start player thread: {e}; playback disabled"))
            .ok();

        Player { cmd_tx, event_rx, thread }
    }

    pub fn play(&self, coverage: CoverageSet, scale: Scale, bpm: f64) {
        let _ = self.cmd_tx.send(PlayerCommand::Play { coverage, scale, bpm });
    }
    pub fn stop(&self) { let _ = self.cmd_tx.send(PlayerCommand::Stop); }
    pub fn preview(&self, pitch: u8) { let _ = self.cmd_tx.send(PlayerCommand::Preview(pitch)); }

    pub fn set_instrument(&self, program: u8) {
        let _ = self.cmd_tx.send(PlayerCommand::SetInstrument(program));
    }

    /// Drain any pending events (non-blocking).
    pub fn drain_events(&self) -> Vec<PlayerEvent> {
        self.event_rx.try_iter().collect()
    }

    /// Stop the thread and wait for it.
    pub fn quit(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let _ = self.cmd_tx.send(PlayerCommand::Quit);
        if let Some(t) = self.thread.take() {
            let _ = t.join();
        }
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ════════════════════════════════════════════════════════════════════════════
// player_thread: the actual loop
// ════════════════════════════════════════════════════════════════════════════

fn player_thread(
    sequencer: Sequencer,
    seq_rx:    Receiver<PlaybackEvent>,
    cmd_rx:    Receiver<PlayerCommand>,
    event_tx:  Sender<PlayerEvent>,
) {
    let mut current: Option<PlayHandle> = None;

    loop {
        match cmd_rx.recv_timeout(POLL) {
            Ok(PlayerCommand::Play { coverage, scale, bpm }) => {
                reap(&mut current);
                match sequencer.play(&coverage, scale, bpm) {
                    Ok(handle) => current = Some(handle),
                    Err(e) => {
                        debug!("play refused: {e}");
                        let _ = event_tx.send(PlayerEvent::Rejected(e.to_string()));
                    }
                }
            }
            Ok(PlayerCommand::Stop) => stop(&mut current),
            Ok(PlayerCommand::Preview(pitch)) => sequencer.preview(pitch),
            Ok(PlayerCommand::SetInstrument(program)) => sequencer.program_change(program),
            Ok(PlayerCommand::Quit) | Err(RecvTimeoutError::Disconnected) => {
                stop(&mut current);
                forward(&seq_rx, &event_tx);
                return;
            }
            Err(RecvTimeoutError::Timeout) => {}
        }

        forward(&seq_rx, &event_tx);
        reap(&mut current);
    }
}

fn forward(seq_rx: &Receiver<PlaybackEvent>, event_tx: &Sender<PlayerEvent>) {
    for event in seq_rx.try_iter() {
        let _ = event_tx.send(PlayerEvent::Playback(event));
    }
}

fn reap(current: &mut Option<PlayHandle>) {
    if current.as_ref().is_some_and(PlayHandle::is_finished) {
        if let Some(handle) = current.take() {
            handle.join();
        }
    }
}

fn stop(current: &mut Option<PlayHandle>) {
    if let Some(handle) = current.take() {
        handle.cancel();
        handle.join();
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use canvas_grid::{Cell, DEFAULT_SCALE};
    use canvas_midi::{shared, RecordingSink, SinkMessage};
    use std::time::Instant;

    fn wait_for(player: &Player, want: impl Fn(&PlayerEvent) -> bool) -> Vec<PlayerEvent> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut seen = Vec::new();
        while Instant::now() < deadline {
            for e in player.drain_events() {
                let hit = want(&e);
                seen.push(e);
                if hit {
                    return seen;
                }
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("event never arrived; saw {seen:?}");
    }

    #[test]
    fn sends_program_change_on_start() {
        let rec = RecordingSink::new();
        let player = Player::spawn(Grid::new(2, 2), shared(rec.clone()), 80, 11);
        player.quit();
        assert_eq!(rec.messages().first(), Some(&SinkMessage::Program(11)));
    }

    #[test]
    fn play_reports_progress_until_finished() {
        let rec = RecordingSink::new();
        let grid = Grid::new(3, 1);
        let player = Player::spawn(grid, shared(rec.clone()), 80, 0);
        let cov: CoverageSet = [Cell::from_index(0), Cell::from_index(2)].into_iter().collect();

        player.play(cov, DEFAULT_SCALE, 3000.0);
        let seen = wait_for(&player, |e| *e == PlayerEvent::Playback(PlaybackEvent::Finished));
        let columns = seen
            .iter()
            .filter(|e| matches!(e, PlayerEvent::Playback(PlaybackEvent::Column { .. })))
            .count();
        assert_eq!(columns, 3);
        assert_eq!(rec.notes_on().len(), 2);
    }

    #[test]
    fn stop_cancels_and_second_play_is_rejected() {
        let grid = Grid::new(4, 1);
        let player = Player::spawn(grid, shared(RecordingSink::new()), 80, 0);
        let cov: CoverageSet = (0..4).map(Cell::from_index).collect();

        player.play(cov.clone(), DEFAULT_SCALE, 60.0);
        player.play(cov, DEFAULT_SCALE, 60.0);
        wait_for(&player, |e| matches!(e, PlayerEvent::Rejected(_)));

        player.stop();
        wait_for(&player, |e| *e == PlayerEvent::Playback(PlaybackEvent::Cancelled));
    }

    #[test]
    fn quit_releases_previewed_notes() {
        let rec = RecordingSink::new();
        let player = Player::spawn(Grid::new(2, 2), shared(rec.clone()), 90, 0);
        player.preview(64);
        player.quit();
        assert_eq!(
            rec.messages(),
            vec![
                SinkMessage::Program(0),
                SinkMessage::NoteOn { pitch: 64, velocity: 90 },
                SinkMessage::NoteOff { pitch: 64 },
            ]
        );
    }
}
