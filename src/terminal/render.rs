//! Rendering sinks the surface mirrors its display changes into.

use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::ColorTag;

/// Receives every visible change made to the surface.
///
/// Each call must be flushed to the underlying device before it returns.
pub trait TerminalSink: Send {
    /// Display text in the color for `tag`.
    fn write(&mut self, text: &str, tag: ColorTag);
    /// Show a character typed by the user.
    fn echo(&mut self, ch: char);
    /// Remove the last echoed character.
    fn erase(&mut self);
    /// Wipe the display and home the cursor.
    fn clear(&mut self);
}

/// ANSI foreground colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum AnsiColor {
    Default,
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
    BrightRed,
    BrightGreen,
    BrightYellow,
    BrightBlue,
    BrightMagenta,
    BrightCyan,
    BrightWhite,
}

impl AnsiColor {
    /// SGR foreground parameter.
    pub fn sgr(self) -> u8 {
        match self {
            AnsiColor::Default => 39,
            AnsiColor::Black => 30,
            AnsiColor::Red => 31,
            AnsiColor::Green => 32,
            AnsiColor::Yellow => 33,
            AnsiColor::Blue => 34,
            AnsiColor::Magenta => 35,
            AnsiColor::Cyan => 36,
            AnsiColor::White => 37,
            AnsiColor::BrightRed => 91,
            AnsiColor::BrightGreen => 92,
            AnsiColor::BrightYellow => 93,
            AnsiColor::BrightBlue => 94,
            AnsiColor::BrightMagenta => 95,
            AnsiColor::BrightCyan => 96,
            AnsiColor::BrightWhite => 97,
        }
    }
}

impl std::str::FromStr for AnsiColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.to_ascii_lowercase().replace('-', "_")))
            .map_err(|_| format!("unknown color '{}'", s))
    }
}

/// Colors used per tag. The error color is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    /// Color of regular guest output and echoed input.
    pub normal: AnsiColor,
    /// Color of error-channel output.
    pub error: AnsiColor,
}

impl Palette {
    /// Palette with the given normal color.
    pub fn new(normal: AnsiColor) -> Self {
        Self {
            normal,
            error: AnsiColor::BrightRed,
        }
    }

    /// Color for a tag.
    pub fn color(&self, tag: ColorTag) -> AnsiColor {
        match tag {
            ColorTag::Normal => self.normal,
            ColorTag::Error => self.error,
        }
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::new(AnsiColor::Green)
    }
}

/// Sink writing ANSI escape sequences to any `Write`.
pub struct AnsiSink<W> {
    out: W,
    palette: Palette,
    echo: bool,
}

impl<W: Write + Send> AnsiSink<W> {
    /// Create a sink. With `echo` off, typed characters are left to the device's own echo.
    pub fn new(out: W, palette: Palette, echo: bool) -> Self {
        Self { out, palette, echo }
    }

    /// Consume the sink, returning the writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, bytes: &[u8]) {
        if let Err(err) = self.out.write_all(bytes).and_then(|_| self.out.flush()) {
            tracing::warn!(error = %err, "terminal sink write failed");
        }
    }
}

impl<W: Write + Send> TerminalSink for AnsiSink<W> {
    fn write(&mut self, text: &str, tag: ColorTag) {
        let colored = format!("\x1b[{}m{}\x1b[0m", self.palette.color(tag).sgr(), text);
        self.emit(colored.as_bytes());
    }

    fn echo(&mut self, ch: char) {
        if self.echo {
            let mut buf = [0u8; 4];
            self.emit(ch.encode_utf8(&mut buf).as_bytes());
        }
    }

    fn erase(&mut self) {
        if self.echo {
            self.emit(b"\x08 \x08");
        }
    }

    fn clear(&mut self) {
        self.emit(b"\x1b[2J\x1b[H");
    }
}

/// One recorded sink call.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum SinkEvent {
    Write { text: String, tag: ColorTag },
    Echo(char),
    Erase,
    Clear,
}

/// In-memory sink; clones share the same event log.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<SinkEvent>>>,
}

impl MemorySink {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every call so far.
    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().clone()
    }

    /// Replay the log into the text a terminal would show.
    pub fn rendered(&self) -> String {
        let mut screen = String::new();
        for event in self.events.lock().iter() {
            match event {
                SinkEvent::Write { text, .. } => screen.push_str(text),
                SinkEvent::Echo(ch) => screen.push(*ch),
                SinkEvent::Erase => {
                    screen.pop();
                }
                SinkEvent::Clear => screen.clear(),
            }
        }
        screen
    }
}

impl TerminalSink for MemorySink {
    fn write(&mut self, text: &str, tag: ColorTag) {
        self.events.lock().push(SinkEvent::Write {
            text: text.to_string(),
            tag,
        });
    }

    fn echo(&mut self, ch: char) {
        self.events.lock().push(SinkEvent::Echo(ch));
    }

    fn erase(&mut self) {
        self.events.lock().push(SinkEvent::Erase);
    }

    fn clear(&mut self) {
        self.events.lock().push(SinkEvent::Clear);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ansi_sink_colors_by_tag() {
        let mut sink = AnsiSink::new(Vec::new(), Palette::default(), true);
        sink.write("ok", ColorTag::Normal);
        sink.write("bad", ColorTag::Error);
        sink.echo('x');
        sink.erase();
        sink.clear();
        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(
            out,
            "\x1b[32mok\x1b[0m\x1b[91mbad\x1b[0mx\x08 \x08\x1b[2J\x1b[H"
        );
    }

    #[test]
    fn ansi_sink_leaves_echo_to_the_device() {
        let mut sink = AnsiSink::new(Vec::new(), Palette::new(AnsiColor::Cyan), false);
        sink.echo('x');
        sink.erase();
        sink.write("hi", ColorTag::Normal);
        assert_eq!(String::from_utf8(sink.into_inner()).unwrap(), "\x1b[36mhi\x1b[0m");
    }

    #[test]
    fn parses_color_names() {
        assert_eq!("bright-red".parse::<AnsiColor>(), Ok(AnsiColor::BrightRed));
        assert_eq!("Green".parse::<AnsiColor>(), Ok(AnsiColor::Green));
        assert!("mauve".parse::<AnsiColor>().is_err());
    }

    #[test]
    fn memory_sink_replays_events() {
        let sink = MemorySink::new();
        let mut writer = sink.clone();
        writer.write("a", ColorTag::Normal);
        writer.echo('b');
        writer.erase();
        writer.echo('c');
        assert_eq!(sink.rendered(), "ac");
        writer.clear();
        assert_eq!(sink.rendered(), "");
        assert_eq!(sink.events().len(), 5);
    }
}
