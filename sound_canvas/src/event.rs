//! Canvas input: the events the app understands and where they come from.
//!
//! The public interface is [`CanvasEvent`] delivered over an `mpsc` channel.
//! The app does not care whether events were typed at the console or
//! replayed from a script.

use std::io::{self, BufRead, BufReader, Stdin, Write};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use thiserror::Error;
use tracing::debug;

use canvas_grid::Point;
use canvas_history::Rgba;

// ════════════════════════════════════════════════════════════════════════════
// CanvasEvent
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug, PartialEq)]
pub enum CanvasEvent {
    /// Finger down: start a new stroke at `point`.
    StrokeBegin { point: Point },
    StrokeMove  { point: Point },
    /// Finger up: commit the open stroke.
    StrokeEnd,

    Undo,
    Redo,
    /// Wipe every stroke and painted cell.
    Clear,

    Play,
    Stop,

    /// Mood by name; unknown names play in the default scale.
    SetMood(String),
    SetTempo(f64),
    SetBrush { color: Rgba, width: f64 },
    ToggleGrid,

    Save   { name: String },
    Load   { name: String },
    Delete { name: String },
    List,

    Quit,
}

impl CanvasEvent {
    /// True for events after which the painted cells may look different.
    pub fn edits_canvas(&self) -> bool {
        matches!(
            self,
            CanvasEvent::StrokeEnd
                | CanvasEvent::Undo
                | CanvasEvent::Redo
                | CanvasEvent::Clear
                | CanvasEvent::ToggleGrid
                | CanvasEvent::Load { .. }
        )
    }
}

// ════════════════════════════════════════════════════════════════════════════
// EventSource
// ════════════════════════════════════════════════════════════════════════════

/// Anything that can deliver [`CanvasEvent`]s over a channel.
pub trait EventSource: Send + 'static {
    fn run(self: Box<Self>, tx: Sender<CanvasEvent>);
}

/// Spawn an event source on its own thread and return the receiving end.
pub fn spawn_event_source<S: EventSource>(source: S) -> Receiver<CanvasEvent> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || Box::new(source).run(tx));
    rx
}

/// A fixed list of events, sent in order.
pub struct ScriptSource(pub Vec<CanvasEvent>);

impl EventSource for ScriptSource {
    fn run(self: Box<Self>, tx: Sender<CanvasEvent>) {
        for event in self.0 {
            if tx.send(event).is_err() {
                return;
            }
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Console commands
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown command \"{0}\" (try `help`)")]
    Unknown(String),
    #[error("`{command}` needs {what}")]
    MissingArgument { command: &'static str, what: &'static str },
    #[error("\"{0}\" is not a point; write x,y")]
    BadPoint(String),
    #[error("\"{0}\" is not a number")]
    BadNumber(String),
}

pub const HELP: &str = "\
  stroke x,y x,y …        paint a stroke through canvas points
  undo | redo | clear
  play | stop
  mood <name>             Happy Sad Peaceful Excited Energetic Mysterious Epic
  bpm <n>                 tempo, 60–400
  brush <r;g;b;a> <width> stroke colour and width
  grid                    show/hide the cell map
  save|load|delete <name>
  list                    saved canvases
  quit";

/// Parse one console line.  Blank lines and `#` comments give no events;
/// `help` is answered by the caller.
pub fn parse_command(line: &str) -> Result<Vec<CanvasEvent>, CommandError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(Vec::new());
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((w, r)) => (w, r.trim()),
        None => (line, ""),
    };

    let one = |e: CanvasEvent| -> Result<Vec<CanvasEvent>, CommandError> { Ok(vec![e]) };
    match word.to_ascii_lowercase().as_str() {
        "stroke" => parse_stroke(rest),
        "undo" => one(CanvasEvent::Undo),
        "redo" => one(CanvasEvent::Redo),
        "clear" => one(CanvasEvent::Clear),
        "play" => one(CanvasEvent::Play),
        "stop" => one(CanvasEvent::Stop),
        "grid" => one(CanvasEvent::ToggleGrid),
        "list" | "ls" => one(CanvasEvent::List),
        "quit" | "exit" | "q" => one(CanvasEvent::Quit),
        "mood" => one(CanvasEvent::SetMood(required(rest, "mood", "a mood name")?.to_string())),
        "bpm" | "tempo" => {
            let n = required(rest, "bpm", "a tempo")?;
            one(CanvasEvent::SetTempo(number(n)?))
        }
        "brush" => {
            let mut parts = rest.split_whitespace();
            let color = parts
                .next()
                .ok_or(CommandError::MissingArgument { command: "brush", what: "a colour r;g;b;a" })?;
            let width = parts
                .next()
                .ok_or(CommandError::MissingArgument { command: "brush", what: "a width" })?;
            one(CanvasEvent::SetBrush { color: Rgba::parse(color), width: number(width)? })
        }
        "save" => one(CanvasEvent::Save { name: required(rest, "save", "a name")?.to_string() }),
        "load" => one(CanvasEvent::Load { name: required(rest, "load", "a name")?.to_string() }),
        "delete" | "rm" => {
            one(CanvasEvent::Delete { name: required(rest, "delete", "a name")?.to_string() })
        }
        _ => Err(CommandError::Unknown(word.to_string())),
    }
}

fn parse_stroke(rest: &str) -> Result<Vec<CanvasEvent>, CommandError> {
    let mut points = rest.split_whitespace().map(point);
    let first = points
        .next()
        .ok_or(CommandError::MissingArgument { command: "stroke", what: "at least one point" })??;
    let mut events = vec![CanvasEvent::StrokeBegin { point: first }];
    for p in points {
        events.push(CanvasEvent::StrokeMove { point: p? });
    }
    events.push(CanvasEvent::StrokeEnd);
    Ok(events)
}

fn required<'a>(rest: &'a str, command: &'static str, what: &'static str) -> Result<&'a str, CommandError> {
    if rest.is_empty() {
        Err(CommandError::MissingArgument { command, what })
    } else {
        Ok(rest)
    }
}

fn number(text: &str) -> Result<f64, CommandError> {
    text.parse::<f64>().map_err(|_| CommandError::BadNumber(text.to_string()))
}

fn point(text: &str) -> Result<Point, CommandError> {
    let bad = || CommandError::BadPoint(text.to_string());
    let (x, y) = text.split_once(',').ok_or_else(bad)?;
    let x = x.trim().parse::<f64>().map_err(|_| bad())?;
    let y = y.trim().parse::<f64>().map_err(|_| bad())?;
    Ok(Point::new(x, y))
}

// ════════════════════════════════════════════════════════════════════════════
// ConsoleSource
// ════════════════════════════════════════════════════════════════════════════

/// Reads commands line by line.  End of input is a `Quit`.
pub struct ConsoleSource<R> {
    input:  R,
    prompt: bool,
}

impl ConsoleSource<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        ConsoleSource { input: BufReader::new(io::stdin()), prompt: true }
    }
}

impl<R: BufRead + Send + 'static> ConsoleSource<R> {
    /// Read from `input` without printing prompts.
    pub fn new(input: R) -> Self {
        ConsoleSource { input, prompt: false }
    }
}

impl<R: BufRead + Send + 'static> EventSource for ConsoleSource<R> {
    fn run(mut self: Box<Self>, tx: Sender<CanvasEvent>) {
        let mut line = String::new();
        loop {
            if self.prompt {
                print!("> ");
                io::stdout().flush().ok();
            }
            line.clear();
            match self.input.read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            if line.trim().eq_ignore_ascii_case("help") {
                println!("{HELP}");
                continue;
            }
            match parse_command(&line) {
                Ok(events) => {
                    for event in events {
                        let quit = event == CanvasEvent::Quit;
                        if tx.send(event).is_err() || quit {
                            return;
                        }
                    }
                }
                Err(e) => {
                    debug!(line = line.trim(), "unparsed command");
                    eprintln!("  ? {e}");
                }
            }
        }
        let _ = tx.send(CanvasEvent::Quit);
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
