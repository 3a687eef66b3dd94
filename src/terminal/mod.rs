//! Terminal I/O surface.
//!
//! Holds the display buffer and cursor, captures lines of input through an
//! explicit state machine, and mirrors every change into a [`TerminalSink`].

/// Byte-level key decoding.
pub mod keys;
/// Line capture state machine.
pub mod line;
/// ANSI and in-memory sinks.
pub mod render;
/// Display buffer and line requests.
pub mod surface;

pub use keys::{KeyDecoder, decode_keys};
pub use line::{Key, LineEditor, LineEffect, LineError, LineState};
pub use render::{AnsiColor, AnsiSink, MemorySink, Palette, SinkEvent, TerminalSink};
pub use surface::{InputRequest, TerminalHandle, TerminalSurface};

use serde::{Deserialize, Serialize};

/// Which channel a piece of output belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorTag {
    /// Regular guest output.
    Normal,
    /// Fatal error reports.
    Error,
}

/// Contiguous run of displayed text sharing one tag.
///
/// The display buffer coalesces same-tag writes into its last chunk. Copies
/// handed out by [`TerminalHandle::chunks`] never change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputChunk {
    /// Text.
    pub text: String,
    /// Channel.
    pub tag: ColorTag,
}

/// Zero-based cursor position, in characters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    /// Line.
    pub row: usize,
    /// Column within the line.
    pub column: usize,
}

impl Cursor {
    fn advance(&mut self, text: &str) {
        for ch in text.chars() {
            if ch == '\n' {
                self.row += 1;
                self.column = 0;
            } else {
                self.column += 1;
            }
        }
    }
}
