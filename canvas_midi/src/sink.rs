//! Where notes go.
//!
//! [`AudioSink`] is the whole contract with the synthesizer: note on, note
//! off, and optionally a program change.  Three backends live here:
//!
//! * [`MidirSink`]: a real MIDI output port via `midir`;
//! * [`NullSink`]: muted, used when no port can be opened;
//! * [`RecordingSink`]: keeps a timestamped log, for tests and dry runs.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{info, warn};

/// Velocity used for every note unless configured otherwise.
pub const DEFAULT_VELOCITY: u8 = 80;

// ════════════════════════════════════════════════════════════════════════════
// AudioSink
// ════════════════════════════════════════════════════════════════════════════

pub trait AudioSink: Send {
    fn note_on(&mut self, pitch: u8, velocity: u8);
    fn note_off(&mut self, pitch: u8);
    fn program_change(&mut self, _program: u8) {}
}

/// A sink shared between the sequencer thread and the note-off scheduler.
pub type SharedSink = Arc<Mutex<Box<dyn AudioSink>>>;

pub fn shared(sink: impl AudioSink + 'static) -> SharedSink {
    shared_boxed(Box::new(sink))
}

pub fn shared_boxed(sink: Box<dyn AudioSink>) -> SharedSink {
    Arc::new(Mutex::new(sink))
}

// ── midir backend ─────────────────────────────────────────────────────────

pub struct MidirSink {
    conn:    midir::MidiOutputConnection,
    channel: u8,
}

impl AudioSink for MidirSink {
    fn note_on(&mut self, pitch: u8, velocity: u8) {
        self.send(&[0x90 | self.channel, pitch & 0x7F, velocity & 0x7F]);
    }
    fn note_off(&mut self, pitch: u8) {
        self.send(&[0x80 | self.channel, pitch & 0x7F, 0]);
    }
    fn program_change(&mut self, program: u8) {
        self.send(&[0xC0 | self.channel, program & 0x7F]);
    }
}

impl MidirSink {
    fn send(&mut self, msg: &[u8]) {
        if let Err(e) = self.conn.send(msg) {
            warn!("MIDI send failed: {e}");
        }
    }
}

// ── null backend ──────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct NullSink;

impl AudioSink for NullSink {
    fn note_on(&mut self, _pitch: u8, _velocity: u8) {}
    fn note_off(&mut self, _pitch: u8) {}
}

// ── recording backend ─────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SinkMessage {
    NoteOn { pitch: u8, velocity: u8 },
    NoteOff { pitch: u8 },
    Program(u8),
}

#[derive(Clone, Copy, Debug)]
pub struct SinkEvent {
    /// Time since the sink was created.
    pub at:      Duration,
    pub message: SinkMessage,
}

/// Records every message with its arrival time.  Clones share one log.
#[derive(Clone, Debug)]
pub struct RecordingSink {
    started: Instant,
    log:     Arc<Mutex<Vec<SinkEvent>>>,
}

impl Default for RecordingSink {
    fn default() -> Self {
        RecordingSink { started: Instant::now(), log: Arc::default() }
    }
}

impl RecordingSink {
    pub fn new() -> Self {
        RecordingSink::default()
    }

    pub fn events(&self) -> Vec<SinkEvent> {
        self.log.lock().clone()
    }

    pub fn messages(&self) -> Vec<SinkMessage> {
        self.log.lock().iter().map(|e| e.message).collect()
    }

    /// Pitches of every note-on, in arrival order.
    pub fn notes_on(&self) -> Vec<u8> {
        self.log
            .lock()
            .iter()
            .filter_map(|e| match e.message {
                SinkMessage::NoteOn { pitch, .. } => Some(pitch),
                _ => None,
            })
            .collect()
    }

    fn push(&self, message: SinkMessage) {
        self.log.lock().push(SinkEvent { at: self.started.elapsed(), message });
    }
}

impl AudioSink for RecordingSink {
    fn note_on(&mut self, pitch: u8, velocity: u8) {
        self.push(SinkMessage::NoteOn { pitch, velocity });
    }
    fn note_off(&mut self, pitch: u8) {
        self.push(SinkMessage::NoteOff { pitch });
    }
    fn program_change(&mut self, program: u8) {
        self.push(SinkMessage::Program(program));
    }
}

// ════════════════════════════════════════════════════════════════════════════
// open_midi_output: enumerate ports and pick one
// ════════════════════════════════════════════════════════════════════════════

/// Open a MIDI output port on `channel`.
///
/// With `port_hint`, the first port whose name contains it (case-insensitive)
/// wins; otherwise a software synthesiser is preferred, then the first port.
/// Any failure degrades to [`NullSink`]: drawing keeps working without
/// sound.
pub fn open_midi_output(port_hint: Option<&str>, channel: u8) -> Box<dyn AudioSink> {
    let midi_out = match midir::MidiOutput::new("sound_canvas") {
        Ok(m) => m,
        Err(e) => {
            warn!("MIDI init error: {e}; playing muted");
            return Box::new(NullSink);
        }
    };

    let ports = midi_out.ports();
    if ports.is_empty() {
        warn!("no MIDI output ports found; playing muted");
        warn!("start a synthesiser such as `fluidsynth` or `timidity -iA` to hear the canvas");
        return Box::new(NullSink);
    }

    let names: Vec<String> = ports
        .iter()
        .map(|p| midi_out.port_name(p).unwrap_or_else(|_| "Unknown".to_string()))
        .collect();

    let wanted = |name: &str| {
        let n = name.to_lowercase();
        match port_hint {
            Some(hint) => n.contains(&hint.to_lowercase()),
            None => ["fluid", "timidity", "microsoft", "gm", "synth"]
                .iter()
                .any(|s| n.contains(s)),
        }
    };
    let idx = names.iter().position(|n| wanted(n.as_str())).unwrap_or_else(|| {
        if let Some(hint) = port_hint {
            warn!("no MIDI port matches \"{hint}\"; using \"{}\"", names[0]);
        }
        0
    });

    info!(port = %names[idx], channel, "opening MIDI output");
    match midi_out.connect(&ports[idx], "sound-canvas-play") {
        Ok(conn) => Box::new(MidirSink { conn, channel: channel & 0x0F }),
        Err(e) => {
            warn!("failed to connect to MIDI port: {e}; playing muted");
            Box::new(NullSink)
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
