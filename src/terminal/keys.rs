//! Raw stdin bytes to [`Key`]s.

use super::line::Key;

const ESC: u8 = 0x1b;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Escape {
    #[default]
    None,
    // Saw ESC.
    Start,
    // Inside `ESC [ ...` until a final byte.
    Csi,
    // `ESC O x`.
    Ss3,
}

/// Incremental decoder; sequences split across reads are reassembled.
#[derive(Debug, Default)]
pub struct KeyDecoder {
    utf8: Vec<u8>,
    escape: Escape,
    after_cr: bool,
}

impl KeyDecoder {
    /// Create a decoder with no buffered bytes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a chunk of bytes.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Key> {
        let mut keys = Vec::new();
        for &byte in bytes {
            if self.truncated_by(byte) {
                keys.push(Key::Other);
            }
            if let Some(key) = self.byte(byte) {
                keys.push(key);
            }
        }
        keys
    }

    /// Flush state at end of input. A dangling ESC or partial character becomes `Other`.
    pub fn finish(&mut self) -> Vec<Key> {
        let mut keys = Vec::new();
        if self.escape != Escape::None {
            keys.push(Key::Other);
        }
        if !self.utf8.is_empty() {
            keys.push(Key::Other);
        }
        *self = Self::default();
        keys
    }

    fn byte(&mut self, byte: u8) -> Option<Key> {
        match self.escape {
            Escape::Start => {
                self.escape = match byte {
                    b'[' => Escape::Csi,
                    b'O' => Escape::Ss3,
                    _ => Escape::None,
                };
                return (self.escape == Escape::None).then_some(Key::Other);
            }
            Escape::Csi => {
                if (0x40..=0x7e).contains(&byte) {
                    self.escape = Escape::None;
                    return Some(Key::Other);
                }
                return None;
            }
            Escape::Ss3 => {
                self.escape = Escape::None;
                return Some(Key::Other);
            }
            Escape::None => {}
        }

        if !self.utf8.is_empty() || byte >= 0x80 {
            self.after_cr = false;
            return self.continue_utf8(byte);
        }

        let after_cr = std::mem::replace(&mut self.after_cr, false);
        match byte {
            b'\r' => {
                self.after_cr = true;
                Some(Key::Enter)
            }
            b'\n' if after_cr => None,
            b'\n' => Some(Key::Enter),
            0x7f | 0x08 => Some(Key::Backspace),
            ESC => {
                self.escape = Escape::Start;
                None
            }
            0x00..=0x1f => Some(Key::Other),
            _ => Some(Key::Char(byte as char)),
        }
    }

    // A pending multibyte prefix ends at any non-continuation byte, which is
    // then decoded on its own.
    fn truncated_by(&mut self, byte: u8) -> bool {
        if self.utf8.is_empty() || (0x80..=0xbf).contains(&byte) {
            return false;
        }
        self.utf8.clear();
        true
    }

    fn continue_utf8(&mut self, byte: u8) -> Option<Key> {
        self.utf8.push(byte);
        match std::str::from_utf8(&self.utf8) {
            Ok(text) => {
                let key = text.chars().next().map(Key::Char);
                self.utf8.clear();
                key
            }
            // Incomplete sequence: wait for more bytes.
            Err(err) if err.error_len().is_none() && self.utf8.len() < 4 => None,
            Err(_) => {
                self.utf8.clear();
                Some(Key::Other)
            }
        }
    }
}

/// Decode a complete byte buffer in one go.
pub fn decode_keys(bytes: &[u8]) -> Vec<Key> {
    let mut decoder = KeyDecoder::new();
    let mut keys = decoder.feed(bytes);
    keys.extend(decoder.finish());
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_printable_and_editing_keys() {
        assert_eq!(
            decode_keys(b"ab\x7fc\r"),
            vec![
                Key::Char('a'),
                Key::Char('b'),
                Key::Backspace,
                Key::Char('c'),
                Key::Enter
            ]
        );
        assert_eq!(decode_keys(b"\x08"), vec![Key::Backspace]);
    }

    #[test]
    fn crlf_is_a_single_enter() {
        assert_eq!(decode_keys(b"x\r\n\n"), vec![Key::Char('x'), Key::Enter, Key::Enter]);
    }

    #[test]
    fn escape_sequences_are_other() {
        assert_eq!(
            decode_keys(b"\x1b[A\x1b[1;5Cq\x1bOPz"),
            vec![Key::Other, Key::Other, Key::Char('q'), Key::Other, Key::Char('z')]
        );
        assert_eq!(decode_keys(b"\x1b"), vec![Key::Other]);
        assert_eq!(decode_keys(b"\x01"), vec![Key::Other]);
    }

    #[test]
    fn multibyte_characters_survive_split_reads() {
        let bytes = "é✓".as_bytes();
        let mut decoder = KeyDecoder::new();
        let mut keys = decoder.feed(&bytes[..1]);
        assert!(keys.is_empty());
        keys.extend(decoder.feed(&bytes[1..3]));
        keys.extend(decoder.feed(&bytes[3..]));
        assert_eq!(keys, vec![Key::Char('é'), Key::Char('✓')]);
    }

    #[test]
    fn invalid_utf8_is_other() {
        assert_eq!(decode_keys(&[0xff, b'a']), vec![Key::Other, Key::Char('a')]);
    }

    #[test]
    fn truncated_sequence_keeps_the_next_key() {
        assert_eq!(decode_keys(&[0xc3, b'\r']), vec![Key::Other, Key::Enter]);
        assert_eq!(
            decode_keys(&[0xe2, 0x9c, 0xc3, 0xa9]),
            vec![Key::Other, Key::Char('é')]
        );

        let mut decoder = KeyDecoder::new();
        assert!(decoder.feed(&[0xe2, 0x9c]).is_empty());
        assert_eq!(decoder.feed(b"a"), vec![Key::Other, Key::Char('a')]);
        assert!(decoder.finish().is_empty());
    }
}
