//! Standard MIDI File export of a playback plan.
//!
//! A canvas becomes a Type-0 file: one track carrying the tempo, a track
//! name, a program change and the note on/off pairs of [`plan`](crate::plan)
//! placed at their tick times.

use std::io::Write;
use std::path::Path;

use crate::sequencer::PlannedNote;
use crate::sink::DEFAULT_VELOCITY;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SmfOptions {
    pub ticks_per_quarter: u16,
    pub program:           u8,
    pub channel:           u8,
    pub velocity:          u8,
    /// Written as the track name meta event.
    pub name:              String,
}

impl Default for SmfOptions {
    fn default() -> Self {
        SmfOptions {
            ticks_per_quarter: 480,
            program:           0,
            channel:           0,
            velocity:          DEFAULT_VELOCITY,
            name:              "SoundCanvas".to_string(),
        }
    }
}

/// Serialise `notes` (played at `bpm`) to the bytes of a Type-0 MIDI file.
pub fn plan_to_smf(notes: &[PlannedNote], bpm: f64, opts: &SmfOptions) -> Vec<u8> {
    let track = track_chunk(notes, bpm, opts);

    let mut out = Vec::with_capacity(22 + track.len());
    // MThd  length=6  format=0  ntrks=1  division
    out.extend_from_slice(b"MThd");
    out.extend_from_slice(&6u32.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());
    out.extend_from_slice(&1u16.to_be_bytes());
    out.extend_from_slice(&opts.ticks_per_quarter.to_be_bytes());

    out.extend_from_slice(b"MTrk");
    out.extend_from_slice(&(track.len() as u32).to_be_bytes());
    out.extend_from_slice(&track);
    out
}

pub fn write_file(path: &Path, notes: &[PlannedNote], bpm: f64, opts: &SmfOptions) -> std::io::Result<()> {
    let bytes = plan_to_smf(notes, bpm, opts);
    let mut f = std::fs::File::create(path)?;
    f.write_all(&bytes)
}

/// Microseconds per quarter note, as the tempo meta event stores it.
pub fn tempo_micros(bpm: f64) -> u32 {
    if !bpm.is_finite() || bpm <= 0.0 {
        return 500_000;
    }
    (60_000_000.0 / bpm).round().clamp(1.0, 0xFF_FFFF as f64) as u32
}

fn seconds_to_ticks(seconds: f64, bpm: f64, tpq: u16) -> u32 {
    (seconds * bpm / 60.0 * f64::from(tpq)).round().max(0.0) as u32
}

fn track_chunk(notes: &[PlannedNote], bpm: f64, opts: &SmfOptions) -> Vec<u8> {
    let mut t = Vec::new();
    let ch = opts.channel & 0x0F;

    let micros = tempo_micros(bpm);
    t.extend_from_slice(&[0x00, 0xFF, 0x51, 0x03]);
    t.extend_from_slice(&micros.to_be_bytes()[1..]);

    let name = opts.name.as_bytes();
    t.extend_from_slice(&[0x00, 0xFF, 0x03]);
    write_vlq(&mut t, name.len() as u32);
    t.extend_from_slice(name);

    t.extend_from_slice(&[0x00, 0xC0 | ch, opts.program & 0x7F]);

    // (tick, note-offs first, status, pitch, velocity)
    let mut events: Vec<(u32, u8, u8, u8, u8)> = Vec::with_capacity(notes.len() * 2);
    for n in notes {
        let pitch = n.pitch & 0x7F;
        let on = seconds_to_ticks(n.on.as_secs_f64(), bpm, opts.ticks_per_quarter);
        let off = seconds_to_ticks(n.off.as_secs_f64(), bpm, opts.ticks_per_quarter).max(on);
        events.push((on, 1, 0x90 | ch, pitch, opts.velocity & 0x7F));
        events.push((off, 0, 0x80 | ch, pitch, 0));
    }
    events.sort_by_key(|&(tick, order, ..)| (tick, order));

    let mut now = 0u32;
    for (tick, _, status, pitch, velocity) in events {
        write_vlq(&mut t, tick - now);
        t.extend_from_slice(&[status, pitch, velocity]);
        now = tick;
    }

    t.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);
    t
}

/// Write a MIDI variable-length quantity.
fn write_vlq(buf: &mut Vec<u8>, mut value: u32) {
    let mut bytes = [0u8; 5];
    let mut i = 4;
    bytes[i] = (value & 0x7F) as u8;
    value >>= 7;
    while value > 0 {
        i -= 1;
        bytes[i] = ((value & 0x7F) | 0x80) as u8;
        value >>= 7;
    }
    buf.extend_from_slice(&bytes[i..]);
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
