use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use super::line::{Key, LineEditor, LineEffect, LineError, LineState};
use super::render::TerminalSink;
use super::{ColorTag, Cursor, OutputChunk};

/// Display buffer, cursor and line capture for one terminal.
pub struct TerminalSurface {
    chunks: Vec<OutputChunk>,
    cursor: Cursor,
    editor: LineEditor,
    pending: Option<oneshot::Sender<String>>,
    sink: Box<dyn TerminalSink>,
}

impl TerminalSurface {
    /// Create an empty surface rendering into `sink`.
    pub fn new(sink: Box<dyn TerminalSink>) -> Self {
        Self {
            chunks: Vec::new(),
            cursor: Cursor::default(),
            editor: LineEditor::new(),
            pending: None,
            sink,
        }
    }

    /// Append text to the display.
    pub fn write(&mut self, text: &str, tag: ColorTag) {
        if text.is_empty() {
            return;
        }
        self.append(text, tag);
        self.sink.write(text, tag);
    }

    /// Reset the buffer and cursor. Input capture is left alone.
    pub fn clear(&mut self) {
        self.chunks.clear();
        self.cursor = Cursor::default();
        self.sink.clear();
    }

    /// Begin capturing a line.
    ///
    /// The prompt is not written here; callers show it before requesting.
    pub fn request_line(&mut self, prompt: &str) -> Result<InputRequest, LineError> {
        self.editor.begin()?;
        let (tx, rx) = oneshot::channel();
        self.pending = Some(tx);
        Ok(InputRequest {
            prompt: prompt.to_string(),
            rx,
        })
    }

    /// Feed a keystroke to the active capture.
    pub fn handle_key(&mut self, key: Key) -> LineEffect {
        let effect = self.editor.apply(key);
        match &effect {
            LineEffect::None => {}
            LineEffect::Echo(ch) => {
                let mut buf = [0u8; 4];
                self.append(ch.encode_utf8(&mut buf), ColorTag::Normal);
                self.sink.echo(*ch);
            }
            LineEffect::Erase => {
                self.remove_last();
                self.sink.erase();
            }
            LineEffect::Commit(line) => {
                self.append("\n", ColorTag::Normal);
                self.sink.echo('\n');
                if let Some(tx) = self.pending.take() {
                    if tx.send(line.clone()).is_err() {
                        tracing::warn!("committed line had no waiting reader");
                    }
                }
            }
        }
        effect
    }

    /// Reject the outstanding request, if any. Returns whether one was pending.
    pub fn abort_input(&mut self) -> bool {
        self.editor.abort();
        self.pending.take().is_some()
    }

    /// Concatenated display text.
    pub fn contents(&self) -> String {
        self.chunks.iter().map(|chunk| chunk.text.as_str()).collect()
    }

    /// Coalesced view of the display buffer.
    ///
    /// Adjacent writes with the same tag share one chunk, and backspace erases
    /// from the last one, so the view changes as the display does. Take a copy
    /// through [`TerminalHandle::chunks`] to keep a fixed record.
    pub fn chunks(&self) -> &[OutputChunk] {
        &self.chunks
    }

    /// Current cursor.
    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Line capture state.
    pub fn line_state(&self) -> LineState {
        self.editor.state()
    }

    fn append(&mut self, text: &str, tag: ColorTag) {
        match self.chunks.last_mut() {
            Some(last) if last.tag == tag => last.text.push_str(text),
            _ => self.chunks.push(OutputChunk {
                text: text.to_string(),
                tag,
            }),
        }
        self.cursor.advance(text);
    }

    fn remove_last(&mut self) {
        if let Some(last) = self.chunks.last_mut() {
            last.text.pop();
            if last.text.is_empty() {
                self.chunks.pop();
            }
        }
        self.cursor.column = self.cursor.column.saturating_sub(1);
    }
}

/// Outstanding line request; resolves once with the committed line.
#[derive(Debug)]
pub struct InputRequest {
    prompt: String,
    rx: oneshot::Receiver<String>,
}

impl InputRequest {
    /// Prompt the request was created with.
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Wait for the line. Fails with [`LineError::Aborted`] if the surface drops the request.
    pub async fn line(self) -> Result<String, LineError> {
        self.rx.await.map_err(|_| LineError::Aborted)
    }
}

/// Shared handle to a [`TerminalSurface`].
#[derive(Clone)]
pub struct TerminalHandle {
    inner: Arc<Mutex<TerminalSurface>>,
}

impl TerminalHandle {
    /// Wrap a fresh surface around `sink`.
    pub fn new(sink: impl TerminalSink + 'static) -> Self {
        Self::from_surface(TerminalSurface::new(Box::new(sink)))
    }

    /// Share an existing surface.
    pub fn from_surface(surface: TerminalSurface) -> Self {
        Self {
            inner: Arc::new(Mutex::new(surface)),
        }
    }

    /// See [`TerminalSurface::write`].
    pub fn write(&self, text: &str, tag: ColorTag) {
        self.inner.lock().write(text, tag);
    }

    /// Write on the error channel, starting a new line first if the cursor is mid-line.
    pub fn write_error(&self, message: &str) {
        let mut surface = self.inner.lock();
        if surface.cursor().column > 0 {
            surface.write("\n", ColorTag::Error);
        }
        surface.write(message, ColorTag::Error);
        surface.write("\n", ColorTag::Error);
    }

    /// See [`TerminalSurface::clear`].
    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    /// See [`TerminalSurface::request_line`].
    pub fn request_line(&self, prompt: &str) -> Result<InputRequest, LineError> {
        self.inner.lock().request_line(prompt)
    }

    /// See [`TerminalSurface::handle_key`].
    pub fn handle_key(&self, key: Key) -> LineEffect {
        self.inner.lock().handle_key(key)
    }

    /// See [`TerminalSurface::abort_input`].
    pub fn abort_input(&self) -> bool {
        self.inner.lock().abort_input()
    }

    /// See [`TerminalSurface::contents`].
    pub fn contents(&self) -> String {
        self.inner.lock().contents()
    }

    /// Snapshot of the coalesced display chunks. Later writes do not affect it.
    pub fn chunks(&self) -> Vec<OutputChunk> {
        self.inner.lock().chunks().to_vec()
    }

    /// See [`TerminalSurface::cursor`].
    pub fn cursor(&self) -> Cursor {
        self.inner.lock().cursor()
    }

    /// See [`TerminalSurface::line_state`].
    pub fn line_state(&self) -> LineState {
        self.inner.lock().line_state()
    }
}
