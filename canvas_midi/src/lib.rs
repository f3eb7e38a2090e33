//! # canvas_midi
//!
//! Turns painted cells into sound.  A [`Sequencer`] walks a coverage
//! snapshot column by column and drives an [`AudioSink`]; the same
//! timeline ([`plan`]) can be written out as a Standard MIDI File.
//!
//! ```rust
//! use canvas_grid::{CoverageSet, Grid, Mood};
//! use canvas_midi::{plan, plan_to_smf, SmfOptions};
//!
//! let grid = Grid::STANDARD;
//! let painted: CoverageSet = grid.cell(23, 0).into_iter().collect();
//! let notes = plan(&grid, &painted, &Mood::Happy.scale(), 100.0).unwrap();
//! assert_eq!(notes[0].pitch, 42);
//!
//! let bytes = plan_to_smf(&notes, 100.0, &SmfOptions::default());
//! assert_eq!(&bytes[0..4], b"MThd");
//! ```

pub mod scheduler;
pub mod sequencer;
pub mod sink;
pub mod smf;

pub use scheduler::{NoteOffHandle, NoteOffScheduler};
pub use sequencer::{
    column_interval, plan, playback_length, CancelToken, PlannedNote, PlayHandle, PlayOutcome,
    PlaybackEvent, Sequencer, SequencerError, NOTE_LENGTH,
};
pub use sink::{
    open_midi_output, shared, shared_boxed, AudioSink, MidirSink, NullSink, RecordingSink,
    SharedSink, SinkEvent, SinkMessage, DEFAULT_VELOCITY,
};
pub use smf::{plan_to_smf, tempo_micros, write_file, SmfOptions};
